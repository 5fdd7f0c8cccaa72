//! JSON Web Key Set HTTP client.
//!
//! Provides the remote [`KeySource`] used in production:
//! - Connection pooling via reqwest
//! - Retry middleware with exponential backoff for transient failures
//! - Per-key parsing, so one unsupported key does not poison the whole set

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;

use crate::config::{Config, api};
use crate::error::{FetchError, FetchResult};
use crate::keyset::KeySource;

/// Fetches the provider's key set over HTTPS.
#[derive(Clone)]
pub struct JwksClient {
    /// HTTP client with middleware.
    client: ClientWithMiddleware,

    /// JWKS endpoint.
    jwks_url: String,
}

/// Wire shape of a key set before individual keys are validated.
#[derive(Deserialize)]
struct RawKeySet {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

impl JwksClient {
    /// Create a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::ACCEPT, "application/json".parse()?);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(concat!("id-token-verifier/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(api::MAX_KEEPALIVE)
            .pool_idle_timeout(api::KEEPALIVE_EXPIRY)
            .gzip(true)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(5))
            .build_with_max_retries(config.jwks_max_retries);

        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client, jwks_url: config.jwks_url.clone() })
    }

    /// The endpoint this client fetches from.
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Fetch and parse the key set.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-success status, a body that is not
    /// a key set, or a key set with no usable keys.
    pub async fn fetch_jwks(&self) -> FetchResult<JwkSet> {
        tracing::debug!(url = %self.jwks_url, "Fetching JWKS");

        let response = self.client.get(&self.jwks_url).send().await?;
        let response = self.handle_response(response).await?;
        let body = response.bytes().await?;

        let raw: RawKeySet = serde_json::from_slice(&body)?;
        let total = raw.keys.len();

        let keys: Vec<Jwk> = raw
            .keys
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<Jwk>(value) {
                Ok(jwk) => Some(jwk),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unparseable JWK");
                    None
                }
            })
            .collect();

        if keys.is_empty() {
            return Err(FetchError::EmptyKeySet);
        }

        tracing::debug!(usable = keys.len(), total, "Fetched JWKS");
        Ok(JwkSet { keys })
    }

    /// Handle key endpoint status codes.
    async fn handle_response(&self, response: reqwest::Response) -> FetchResult<reqwest::Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);

                Err(FetchError::rate_limited(retry_after))
            }
            404 => Err(FetchError::not_found(self.jwks_url.clone())),
            500..=599 => {
                let text = response.text().await.unwrap_or_default();
                Err(FetchError::server(status.as_u16(), text))
            }
            _ => {
                let text = response.text().await.unwrap_or_default();
                Err(FetchError::UnexpectedStatus { status: status.as_u16(), message: text })
            }
        }
    }
}

#[async_trait]
impl KeySource for JwksClient {
    async fn fetch(&self) -> FetchResult<JwkSet> {
        self.fetch_jwks().await
    }
}

impl std::fmt::Debug for JwksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksClient").field("jwks_url", &self.jwks_url).finish()
    }
}
