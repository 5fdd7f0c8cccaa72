//! HTTP transport.
//!
//! The verify endpoint always answers 200 with a JSON verdict; callers branch on
//! `ok`, never on the status code. Bodies that are not JSON, or carry no
//! credential, are answered with `missing_credential`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::models::{
    RejectReason, Rejection, SignedToken, VerificationResult, VerifyRequest, VerifyResponse,
};
use crate::verifier::Verifier;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub verifier: Arc<Verifier>,
    /// Mounted verify path, if any.
    pub verify_path: Option<String>,
}

/// Create the HTTP router.
///
/// The verify route is mounted only when `config.enable_server_verify` is set.
pub fn create_router(verifier: Arc<Verifier>, config: &Config) -> Router {
    let verify_path = match (config.enable_server_verify, config.verify_path.starts_with('/')) {
        (true, true) => Some(config.verify_path.clone()),
        (true, false) => {
            tracing::error!(path = %config.verify_path, "Verify path must start with '/', not mounting");
            None
        }
        (false, _) => None,
    };

    let state = Arc::new(HttpState { verifier, verify_path: verify_path.clone() });

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check));

    if let Some(path) = &verify_path {
        tracing::info!(path = %path, "Mounting verify endpoint");
        router = router.route(path, post(handle_verify));
    }

    router.layer(CorsLayer::permissive()).layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "id-token-verifier",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let keys = state.verifier.keys();
    Json(serde_json::json!({
        "status": "ready",
        "service": "id-token-verifier",
        "version": env!("CARGO_PKG_VERSION"),
        "cached_keys": keys.cached_key_count().await,
        "jwks_fetches": keys.fetch_count(),
        "verify_path": state.verify_path
    }))
}

/// Handle POST requests to the verify path.
async fn handle_verify(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Json<VerifyResponse> {
    let credential = match body {
        Ok(Json(request)) => request.credential,
        Err(e) => {
            tracing::debug!(error = %e, "Unreadable verify request body");
            None
        }
    };

    let result: VerificationResult = match credential {
        Some(raw) if !raw.trim().is_empty() => {
            state.verifier.verify_configured(&SignedToken::from(raw)).await
        }
        _ => Rejection::new(RejectReason::MissingCredential).into(),
    };

    Json(VerifyResponse::from(&result))
}
