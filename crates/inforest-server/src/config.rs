use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

pub const ENV_BIND_ADDR: &str = "INFOREST_BIND_ADDR";
pub const ENV_AUTH_SECRET: &str = "INFOREST_AUTH_SECRET";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Deadline applied to every inbound request.
    pub request_timeout_ms: u64,
    /// Key material for bearer tokens. The server refuses to start without it.
    pub auth_secret: Option<String>,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            request_timeout_ms: 10_000,
            auth_secret: None,
            log_filter: "info".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from `INFOREST_*` variables as returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ServerResult<()> {
        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            self.bind_addr = addr
                .parse()
                .map_err(|e| ServerError::Config(format!("{ENV_BIND_ADDR}={addr}: {e}")))?;
        }
        if let Some(secret) = lookup(ENV_AUTH_SECRET) {
            self.auth_secret = Some(secret);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// The configured token secret, or a configuration error.
    pub fn require_secret(&self) -> ServerResult<&str> {
        match self.auth_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(ServerError::Config(format!(
                "auth_secret is not set (config file or {ENV_AUTH_SECRET})"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:50051".parse::<SocketAddr>().unwrap());
        assert_eq!(c.request_timeout(), Duration::from_secs(10));
        assert!(c.auth_secret.is_none());
        assert_eq!(c.log_filter, "info");
        assert!(c.require_secret().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ServerConfig::from_toml_str("request_timeout_ms = 250\nauth_secret = \"s3cret\"\n").unwrap();
        assert_eq!(c.request_timeout_ms, 250);
        assert_eq!(c.require_secret().unwrap(), "s3cret");
        assert_eq!(c.bind_addr.port(), 50051);
    }

    #[test]
    fn env_overrides_file() {
        let env: HashMap<&str, &str> = [(ENV_BIND_ADDR, "0.0.0.0:7000"), (ENV_AUTH_SECRET, "from-env")].into();
        let mut c = ServerConfig::from_toml_str("auth_secret = \"from-file\"").unwrap();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.bind_addr.port(), 7000);
        assert_eq!(c.auth_secret.as_deref(), Some("from-env"));
    }

    #[test]
    fn bad_bind_addr_is_config_error() {
        let mut c = ServerConfig::default();
        let err = c.apply_env(|k| (k == ENV_BIND_ADDR).then(|| "nowhere".to_string())).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inforest.toml");
        std::fs::write(&path, "log_filter = \"debug\"\n").unwrap();
        let c = ServerConfig::load(&path).unwrap();
        assert_eq!(c.log_filter, "debug");

        let missing = ServerConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ServerError::Config(_)));
    }
}
