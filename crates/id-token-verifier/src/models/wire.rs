//! JSON bodies exchanged with the verify endpoint.

use serde::{Deserialize, Serialize};

use super::result::{RejectReason, Rejection, VerificationResult, VerifiedIdentity};

/// `POST` body sent to the verify endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub credential: Option<String>,
}

/// Verify endpoint response. Success and failure share one shape keyed on `ok`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyResponse {
    fn empty(ok: bool) -> Self {
        Self {
            ok,
            sub: None,
            email: None,
            name: None,
            picture: None,
            iat: None,
            exp: None,
            reason: None,
            message: None,
        }
    }

    /// Rebuild a verification result from a response body.
    ///
    /// A success body needs only `sub`; `iat` and `exp` are relayed when present.
    /// A success body without `sub`, or a failure body without a reason, is
    /// treated as a transport-level fault.
    #[must_use]
    pub fn into_result(self) -> VerificationResult {
        if self.ok {
            match self.sub {
                Some(subject) => VerificationResult::Verified(VerifiedIdentity {
                    subject,
                    email: self.email,
                    name: self.name,
                    picture: self.picture,
                    issued_at: self.iat,
                    expires_at: self.exp,
                }),
                None => VerificationResult::rejected(
                    RejectReason::NetworkError,
                    Some("incomplete verify response".to_string()),
                ),
            }
        } else {
            match self.reason {
                Some(reason) => VerificationResult::rejected(reason, self.message),
                None => VerificationResult::rejected(
                    RejectReason::NetworkError,
                    Some("verify response without reason".to_string()),
                ),
            }
        }
    }
}

impl From<&VerificationResult> for VerifyResponse {
    fn from(result: &VerificationResult) -> Self {
        match result {
            VerificationResult::Verified(identity) => Self {
                sub: Some(identity.subject.clone()),
                email: identity.email.clone(),
                name: identity.name.clone(),
                picture: identity.picture.clone(),
                iat: identity.issued_at,
                exp: identity.expires_at,
                ..Self::empty(true)
            },
            VerificationResult::Rejected(Rejection { reason, message }) => Self {
                reason: Some(*reason),
                message: message.clone(),
                ..Self::empty(false)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tolerates_missing_credential() {
        let req: VerifyRequest = serde_json::from_str("{}").unwrap();
        assert!(req.credential.is_none());
    }

    #[test]
    fn test_rejection_body_shape() {
        let result = VerificationResult::rejected(RejectReason::MissingCredential, None);
        let body = serde_json::to_value(VerifyResponse::from(&result)).unwrap();
        assert_eq!(body, serde_json::json!({"ok": false, "reason": "missing_credential"}));
    }

    #[test]
    fn test_success_without_subject_is_network_error() {
        let response: VerifyResponse = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert_eq!(response.into_result().reason(), Some(RejectReason::NetworkError));
    }

    #[test]
    fn test_success_without_timestamps_is_verified() {
        let response: VerifyResponse = serde_json::from_str(
            r#"{"ok":true,"sub":"42","email":"a@b.c","name":"A","picture":"https://p"}"#,
        )
        .unwrap();
        let result = response.into_result();
        let identity = result.identity().unwrap();
        assert_eq!(identity.subject, "42");
        assert_eq!(identity.picture.as_deref(), Some("https://p"));
        assert!(identity.issued_at.is_none());
        assert!(identity.expires_at_utc().is_none());
    }

    #[test]
    fn test_failure_keeps_reason_and_message() {
        let response: VerifyResponse =
            serde_json::from_str(r#"{"ok":false,"reason":"invalid_token","message":"token expired"}"#)
                .unwrap();
        let result = response.into_result();
        let rejection = result.rejection().unwrap();
        assert_eq!(rejection.reason, RejectReason::InvalidToken);
        assert_eq!(rejection.message.as_deref(), Some("token expired"));
    }
}
