//! Verification outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Machine-readable reason a token was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No token supplied.
    MissingCredential,
    /// Token is not a well-formed compact JWS.
    MalformedToken,
    /// No key in the current key set matches the token's `kid`.
    UnknownKey,
    /// The remote key set could not be obtained.
    KeyFetchFailed,
    /// Signature does not verify.
    InvalidSignature,
    /// A claim (audience, issuer, time window, subject) failed validation.
    InvalidToken,
    /// Client-side transport failure talking to the verify endpoint.
    NetworkError,
}

impl RejectReason {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedToken => "malformed_token",
            Self::UnknownKey => "unknown_key",
            Self::KeyFetchFailed => "key_fetch_failed",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidToken => "invalid_token",
            Self::NetworkError => "network_error",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Provider-scoped user id (`sub`).
    pub subject: String,
    /// `email`, if present.
    pub email: Option<String>,
    /// Display name, if present.
    pub name: Option<String>,
    /// Profile picture URL, if present.
    pub picture: Option<String>,
    /// `iat` as UNIX seconds. Always set by the verifier; optional when relayed
    /// from an endpoint that omits it.
    pub issued_at: Option<i64>,
    /// `exp` as UNIX seconds. Same caveat as `issued_at`.
    pub expires_at: Option<i64>,
}

impl VerifiedIdentity {
    /// Expiry as a UTC timestamp.
    #[must_use]
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }
}

/// A failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Failure class.
    pub reason: RejectReason,
    /// Human-readable detail.
    pub message: Option<String>,
}

impl Rejection {
    /// Rejection without a message.
    #[must_use]
    pub const fn new(reason: RejectReason) -> Self {
        Self { reason, message: None }
    }

    /// Rejection with a message.
    #[must_use]
    pub fn with_message(reason: RejectReason, message: impl Into<String>) -> Self {
        Self { reason, message: Some(message.into()) }
    }
}

/// Outcome of one verification call.
///
/// Only the `Verified` variant, as produced by the verifier, constitutes an
/// authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    /// Token is authentic, current and correctly scoped.
    Verified(VerifiedIdentity),
    /// Token was not accepted.
    Rejected(Rejection),
}

impl VerificationResult {
    /// Shorthand for a rejection with an optional message.
    #[must_use]
    pub fn rejected(reason: RejectReason, message: Option<String>) -> Self {
        Self::Rejected(Rejection { reason, message })
    }

    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }

    #[must_use]
    pub const fn identity(&self) -> Option<&VerifiedIdentity> {
        match self {
            Self::Verified(identity) => Some(identity),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Verified(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    /// Reject reason, if rejected.
    #[must_use]
    pub const fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Verified(_) => None,
            Self::Rejected(rejection) => Some(rejection.reason),
        }
    }
}

impl From<Rejection> for VerificationResult {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

impl From<VerifiedIdentity> for VerificationResult {
    fn from(identity: VerifiedIdentity) -> Self {
        Self::Verified(identity)
    }
}
