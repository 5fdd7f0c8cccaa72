//! Error types for the ID token verification service.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.
//! None of these cross the verification boundary: [`VerifyError`] is folded into a
//! [`Rejection`](crate::models::Rejection) before it reaches a caller.

use std::sync::Arc;
use std::time::Duration;

use crate::models::{RejectReason, Rejection};

/// Errors from outbound HTTP calls: key set fetches and verify submissions.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Middleware error
    #[error("Middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),

    /// Rate limited by the key endpoint (429 response)
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Suggested wait time before retry
        retry_after: Duration,
    },

    /// Key endpoint not found (404 response)
    #[error("Key set not found: {resource}")]
    NotFound {
        /// Description of the missing resource
        resource: String,
    },

    /// Fetch did not complete in time
    #[error("Key set fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Response was not a JSON Web Key Set
    #[error("Failed to parse key set: {0}")]
    Parse(#[from] serde_json::Error),

    /// Key set parsed but held no usable keys
    #[error("Key set contains no usable keys")]
    EmptyKeySet,

    /// Server error (5xx response)
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// Unexpected HTTP status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body or message
        message: String,
    },
}

impl FetchError {
    /// Create a rate limited error with retry-after duration.
    #[must_use]
    pub fn rate_limited(seconds: u64) -> Self {
        Self::RateLimited { retry_after: Duration::from_secs(seconds) }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    /// Create a server error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server { status, message: message.into() }
    }

    /// Returns true if a later fetch may succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout(_) | Self::Server { .. })
    }
}

/// Errors from advisory (unverified) token decoding.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Compact serialization must have exactly three segments
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    /// A segment is not valid base64url
    #[error("invalid base64url in {segment} segment")]
    Base64 {
        /// Which segment failed ("header", "payload" or "signature")
        segment: &'static str,
    },

    /// A segment decoded but is not the expected JSON
    #[error("invalid JSON in {segment} segment: {message}")]
    Json {
        /// Which segment failed
        segment: &'static str,
        /// Parser message
        message: String,
    },
}

/// Errors from authoritative token verification.
#[derive(thiserror::Error, Debug)]
pub enum VerifyError {
    /// No token was supplied
    #[error("missing credential")]
    MissingCredential,

    /// Token is not a well-formed compact JWS
    #[error("malformed token: {0}")]
    Malformed(#[from] DecodeError),

    /// No key in the current key set matches the token
    #[error("no signing key for kid {kid:?}")]
    UnknownKey {
        /// Key id from the token header, if any
        kid: Option<String>,
    },

    /// The key set could not be obtained
    #[error("key set fetch failed: {0}")]
    KeyFetch(#[from] Arc<FetchError>),

    /// Signature does not verify under the resolved key
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// A claim failed validation
    #[error("{0}")]
    InvalidClaim(String),
}

impl VerifyError {
    /// Create an invalid signature error.
    #[must_use]
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::InvalidSignature(message.into())
    }

    /// Create an invalid claim error.
    #[must_use]
    pub fn invalid_claim(message: impl Into<String>) -> Self {
        Self::InvalidClaim(message.into())
    }

    /// Machine-readable reason for this failure.
    #[must_use]
    pub const fn reason(&self) -> RejectReason {
        match self {
            Self::MissingCredential => RejectReason::MissingCredential,
            Self::Malformed(_) => RejectReason::MalformedToken,
            Self::UnknownKey { .. } => RejectReason::UnknownKey,
            Self::KeyFetch(_) => RejectReason::KeyFetchFailed,
            Self::InvalidSignature(_) => RejectReason::InvalidSignature,
            Self::InvalidClaim(_) => RejectReason::InvalidToken,
        }
    }

    /// Convert to the rejection returned to callers.
    ///
    /// Claim failures carry their specific message; the rest describe the failure
    /// class without leaking key material or upstream response bodies.
    #[must_use]
    pub fn to_rejection(&self) -> Rejection {
        let message = match self {
            Self::MissingCredential => None,
            Self::Malformed(e) => Some(e.to_string()),
            Self::UnknownKey { kid: Some(kid) } => Some(format!("no signing key with kid '{kid}'")),
            Self::UnknownKey { kid: None } => Some("token has no kid".to_string()),
            Self::KeyFetch(e) if e.is_retryable() => {
                Some("signing keys temporarily unavailable".to_string())
            }
            Self::KeyFetch(_) => Some("signing keys unavailable".to_string()),
            Self::InvalidSignature(_) => Some("signature verification failed".to_string()),
            Self::InvalidClaim(message) => Some(message.clone()),
        };
        Rejection { reason: self.reason(), message }
    }
}

impl From<FetchError> for VerifyError {
    fn from(err: FetchError) -> Self {
        Self::KeyFetch(Arc::new(err))
    }
}

/// Result type alias for key-set fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type alias for verification internals.
pub type VerifyResult<T> = Result<T, VerifyError>;
