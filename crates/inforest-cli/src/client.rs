//! HTTP client for the `/v1/forest/*` RPCs.

use anyhow::{bail, Context};
use inforest_types::wire::ErrorResponse;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub struct ForestClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ForestClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn endpoint(&self, method: &str) -> String {
        format!("{}/v1/forest/{method}", self.base_url)
    }

    /// POST `req` to `method` and decode the response body.
    pub async fn call<Req, Resp>(&self, method: &str, req: &Req) -> anyhow::Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let mut request = self.http.post(self.endpoint(method)).json(req);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        tracing::debug!(method, "calling inforest server");
        let response = request
            .send()
            .await
            .with_context(|| format!("cannot reach {}", self.base_url))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Resp>()
                .await
                .with_context(|| format!("malformed {method} response"));
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(err) => bail!("{}", describe(&err)),
            Err(_) => bail!("{method} failed with HTTP {status}: {text}"),
        }
    }
}

/// Human-readable summary of an error body.
pub fn describe(err: &ErrorResponse) -> String {
    let mut out = format!("[{}] {}", err.code, err.message);
    if err.quarantine {
        out.push_str("\nstores diverged; manual reconciliation required");
    } else if err.partial {
        out.push_str("\noperation partially applied");
    }
    out
}
