use std::sync::Arc;

use inforest_coordinator::Coordinator;
use inforest_hierarchy::{HierarchyStore, InMemoryHierarchyStore};
use inforest_memo::{InMemoryMemoStore, MemoStore};
use tokio::net::TcpListener;

use crate::auth::SignedTokenAuth;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{AppState, SharedState};
use crate::router::build_router;

/// inforest RPC server.
pub struct InforestServer {
    config: ServerConfig,
    state: SharedState,
}

impl InforestServer {
    /// Wire the server to the given stores. Fails if no auth secret is
    /// configured.
    pub fn new(
        config: ServerConfig,
        hierarchy: Arc<dyn HierarchyStore>,
        memos: Arc<dyn MemoStore>,
    ) -> ServerResult<Self> {
        let auth = SignedTokenAuth::new(config.require_secret()?);
        let state = Arc::new(AppState {
            coordinator: Coordinator::new(hierarchy, memos),
            auth: Arc::new(auth),
            request_timeout: config.request_timeout(),
        });
        Ok(Self { config, state })
    }

    /// Server backed by fresh in-memory stores.
    pub fn in_memory(config: ServerConfig) -> ServerResult<Self> {
        Self::new(
            config,
            Arc::new(InMemoryHierarchyStore::new()),
            Arc::new(InMemoryMemoStore::new()),
        )
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(Arc::clone(&self.state))
    }

    /// Serve requests until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            bind_addr = %self.config.bind_addr,
            request_timeout_ms = self.config.request_timeout_ms,
            "inforest server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        tracing::info!("inforest server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
