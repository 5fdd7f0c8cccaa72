//! Credential acquisition client.
//!
//! The browser-side half of the sign-in flow, expressed as a library:
//! - Receives tokens from the identity widget callback and publishes them as events
//! - Decodes claims for optimistic display, without trusting them
//! - Submits tokens to the verify endpoint and relays its verdict
//!
//! Events are delivered over a broadcast channel. Publishing with no subscriber
//! is fine; a slow subscriber misses events rather than blocking the publisher.

use futures::stream::{Stream, StreamExt};
use tokio::sync::{RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use url::Url;

use crate::config::Config;
use crate::error::{DecodeError, FetchError, FetchResult};
use crate::models::{
    RejectReason, Rejection, SignedToken, UnverifiedClaims, VerificationResult, VerifyRequest,
    VerifyResponse,
};

/// Capacity of the event channel.
const EVENT_CAPACITY: usize = 16;

/// Decode a token's payload without verifying it.
///
/// Advisory only: the result is suitable for display and must never be used
/// as proof of identity.
///
/// # Errors
///
/// Returns error if the token is not three segments, the payload is not
/// base64url, or the payload is not a JSON object.
pub fn decode_unverified(token: &SignedToken) -> Result<UnverifiedClaims, DecodeError> {
    UnverifiedClaims::from_token(token)
}

/// Something the identity widget reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialEvent {
    /// The user signed in and the widget produced a token.
    Credential(SignedToken),
    /// The widget loaded and can render.
    Ready,
}

/// Latest credential seen by the client.
#[derive(Debug, Default)]
struct Latest {
    credential: Option<SignedToken>,
    claims: Option<UnverifiedClaims>,
}

/// Client-side credential handling and server verification.
pub struct CredentialClient {
    http: reqwest::Client,
    verify_url: Url,
    events: broadcast::Sender<CredentialEvent>,
    latest: RwLock<Latest>,
}

impl CredentialClient {
    /// Create a client that submits to `{base_url}{config.verify_path}`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, config: &Config) -> anyhow::Result<Self> {
        let verify_url = Url::parse(base_url)?.join(&config.verify_path)?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("id-token-verifier/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self { http, verify_url, events, latest: RwLock::new(Latest::default()) })
    }

    /// Endpoint tokens are submitted to.
    #[must_use]
    pub const fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Widget callback: remember the token, decode it for display and publish it.
    ///
    /// Returns the advisory claims, or `None` if the payload could not be decoded.
    /// The token is remembered and published either way; the server decides.
    pub async fn on_credential(&self, raw: impl Into<SignedToken>) -> Option<UnverifiedClaims> {
        let token = raw.into();

        let claims = match decode_unverified(&token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "Could not decode credential payload");
                None
            }
        };

        {
            let mut latest = self.latest.write().await;
            latest.credential = Some(token.clone());
            latest.claims = claims.clone();
        }

        let receivers = self.events.send(CredentialEvent::Credential(token)).unwrap_or(0);
        tracing::debug!(receivers, "Credential received");

        claims
    }

    /// Widget callback: the widget is ready to render.
    pub fn notify_ready(&self) {
        let receivers = self.events.send(CredentialEvent::Ready).unwrap_or(0);
        tracing::debug!(receivers, "Identity widget ready");
    }

    /// Subscribe to credential events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CredentialEvent> {
        self.events.subscribe()
    }

    /// Credential events as a stream. Lagged events are skipped.
    #[must_use]
    pub fn events(&self) -> impl Stream<Item = CredentialEvent> + Send + 'static {
        BroadcastStream::new(self.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::debug!(error = %e, "Credential subscriber lagged");
                    None
                }
            }
        })
    }

    /// Most recent credential, if any.
    pub async fn credential(&self) -> Option<SignedToken> {
        self.latest.read().await.credential.clone()
    }

    /// Advisory claims of the most recent credential.
    pub async fn claims(&self) -> Option<UnverifiedClaims> {
        self.latest.read().await.claims.clone()
    }

    /// Submit the most recent credential for verification.
    pub async fn verify_current(&self) -> VerificationResult {
        match self.credential().await {
            Some(token) => self.submit_for_verification(&token).await,
            None => Rejection::new(RejectReason::MissingCredential).into(),
        }
    }

    /// POST the token to the verify endpoint and relay the verdict.
    ///
    /// Always resolves. Transport failures, non-success statuses and bodies that
    /// are not a verify response become `network_error` rejections.
    pub async fn submit_for_verification(&self, token: &SignedToken) -> VerificationResult {
        match self.post_credential(token).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(url = %self.verify_url, error = %e, "Verify request failed");
                Rejection::with_message(RejectReason::NetworkError, e.to_string()).into()
            }
        }
    }

    async fn post_credential(&self, token: &SignedToken) -> FetchResult<VerificationResult> {
        let request = VerifyRequest { credential: Some(token.as_str().to_string()) };

        let response = self.http.post(self.verify_url.clone()).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::UnexpectedStatus { status: status.as_u16(), message });
        }

        let body = response.bytes().await?;
        let parsed: VerifyResponse = serde_json::from_slice(&body)?;
        Ok(parsed.into_result())
    }
}

impl std::fmt::Debug for CredentialClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialClient")
            .field("verify_url", &self.verify_url.as_str())
            .field("subscribers", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn client() -> CredentialClient {
        CredentialClient::new("http://127.0.0.1:9", &Config::for_testing("http://unused")).unwrap()
    }

    fn token(payload: &str) -> SignedToken {
        SignedToken::new(format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"k1"}"#),
            URL_SAFE_NO_PAD.encode(payload),
            URL_SAFE_NO_PAD.encode("forged")
        ))
    }

    #[test]
    fn test_verify_url_joins_path() {
        let c = CredentialClient::new("https://app.example.com/some/page", &Config::new("id"))
            .unwrap();
        assert_eq!(c.verify_url().as_str(), "https://app.example.com/api/auth/google/verify");
    }

    #[test]
    fn test_decode_unverified_ignores_signature() {
        let claims = decode_unverified(&token(r#"{"sub":"42","name":"Ada"}"#)).unwrap();
        assert_eq!(claims.subject(), Some("42"));
        assert_eq!(claims.name(), Some("Ada"));
    }

    #[tokio::test]
    async fn test_on_credential_publishes_and_remembers() {
        let c = client();
        let mut rx = c.subscribe();

        let claims = c.on_credential(token(r#"{"sub":"42"}"#)).await;
        assert_eq!(claims.unwrap().subject(), Some("42"));

        assert!(matches!(rx.recv().await.unwrap(), CredentialEvent::Credential(_)));
        assert_eq!(c.credential().await, Some(token(r#"{"sub":"42"}"#)));
        assert_eq!(c.claims().await.unwrap().subject(), Some("42"));
    }

    #[tokio::test]
    async fn test_undecodable_credential_still_published() {
        let c = client();
        let mut rx = c.subscribe();

        assert!(c.on_credential("not-a-jwt").await.is_none());
        assert_eq!(rx.recv().await.unwrap(), CredentialEvent::Credential("not-a-jwt".into()));
        assert!(c.claims().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let c = client();
        c.notify_ready();
        assert!(c.on_credential(token("{}")).await.is_some());
    }

    #[tokio::test]
    async fn test_ready_event() {
        let c = client();
        let mut rx = c.subscribe();
        c.notify_ready();
        assert_eq!(rx.recv().await.unwrap(), CredentialEvent::Ready);
    }

    #[tokio::test]
    async fn test_event_stream() {
        let c = client();
        let events = c.events();
        futures::pin_mut!(events);

        c.notify_ready();
        c.on_credential(token("{}")).await;

        assert_eq!(events.next().await, Some(CredentialEvent::Ready));
        assert!(matches!(events.next().await, Some(CredentialEvent::Credential(_))));
    }

    #[tokio::test]
    async fn test_verify_current_without_credential() {
        let result = client().verify_current().await;
        assert_eq!(result.reason(), Some(RejectReason::MissingCredential));
    }
}
