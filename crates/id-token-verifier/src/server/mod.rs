//! HTTP server for the verify endpoint.
//!
//! Routes:
//! - `POST {verify_path}`: authoritative verification (when enabled)
//! - `GET /health`: liveness
//! - `GET /ready`: readiness with key cache statistics

pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::verifier::Verifier;

/// Verify endpoint server.
pub struct VerifyServer {
    verifier: Arc<Verifier>,
    config: Config,
}

impl VerifyServer {
    /// Create a server that verifies with `verifier`.
    #[must_use]
    pub const fn new(verifier: Arc<Verifier>, config: Config) -> Self {
        Self { verifier, config }
    }

    /// Create a server with a JWKS-backed verifier built from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let verifier = Verifier::new(&config)?;
        Ok(Self::new(Arc::new(verifier), config))
    }

    /// The router this server serves.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        transport::create_router(Arc::clone(&self.verifier), &self.config)
    }

    /// Run the server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run_http(self, port: u16) -> anyhow::Result<()> {
        tracing::info!(
            port,
            verify_enabled = self.config.enable_server_verify,
            "Starting verify server"
        );

        let router = self.router();
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

impl std::fmt::Debug for VerifyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyServer")
            .field("verify_path", &self.config.verify_path)
            .field("enabled", &self.config.enable_server_verify)
            .finish_non_exhaustive()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
