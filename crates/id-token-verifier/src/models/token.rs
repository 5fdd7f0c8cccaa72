//! Compact JWS tokens and their untrusted contents.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, URL_SAFE_NO_PAD};
use base64::engine::DecodePaddingMode;
use base64::{Engine, alphabet};
use jsonwebtoken::Header;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// base64url that accepts segments with or without trailing `=`.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// An opaque signed identity token (`header.payload.signature`).
///
/// Nothing about its contents is trusted until the verifier has checked it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedToken(String);

impl SignedToken {
    /// Wrap a raw compact token.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw compact string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for an empty or whitespace-only token.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Split into the three compact segments.
    pub fn segments(&self) -> Result<[&str; 3], DecodeError> {
        let parts: Vec<&str> = self.0.trim().split('.').collect();
        match parts.as_slice() {
            [header, payload, signature] => Ok([*header, *payload, *signature]),
            _ => Err(DecodeError::SegmentCount(parts.len())),
        }
    }

    /// Fully decode the token structure: header, payload and signature bytes.
    ///
    /// This checks shape only. The signature is decoded, never verified.
    pub fn parse(&self) -> Result<ParsedToken, DecodeError> {
        let [header_b64, payload_b64, signature_b64] = self.segments()?;

        let header_bytes = decode_segment(header_b64, "header")?;
        let header: Header = serde_json::from_slice(&header_bytes)
            .map_err(|e| DecodeError::Json { segment: "header", message: e.to_string() })?;

        let claims = UnverifiedClaims::from_segment(payload_b64)?;
        let signature = decode_segment(signature_b64, "signature")?;

        Ok(ParsedToken {
            header,
            claims,
            signing_input: format!("{header_b64}.{payload_b64}"),
            signature: URL_SAFE_NO_PAD.encode(signature),
        })
    }
}

impl From<String> for SignedToken {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for SignedToken {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl std::fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedToken").field("len", &self.0.len()).finish()
    }
}

/// A structurally valid token, split and decoded but not verified.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    /// JOSE header.
    pub header: Header,
    /// Payload claims (untrusted).
    pub claims: UnverifiedClaims,
    /// `header.payload` exactly as it appeared in the token.
    pub signing_input: String,
    /// Signature re-encoded as unpadded base64url.
    pub signature: String,
}

/// Decoded-but-unchecked token payload.
///
/// Suitable for optimistic display only. There is deliberately no conversion from
/// this type into a [`VerifiedIdentity`](crate::models::VerifiedIdentity).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UnverifiedClaims(Map<String, Value>);

impl UnverifiedClaims {
    /// Decode the payload segment of a compact token.
    pub fn from_token(token: &SignedToken) -> Result<Self, DecodeError> {
        let [_, payload, _] = token.segments()?;
        Self::from_segment(payload)
    }

    fn from_segment(segment: &str) -> Result<Self, DecodeError> {
        let bytes = decode_segment(segment, "payload")?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(DecodeError::Json {
                segment: "payload",
                message: "payload is not a JSON object".to_string(),
            }),
            Err(e) => Err(DecodeError::Json { segment: "payload", message: e.to_string() }),
        }
    }

    /// Raw claim lookup.
    #[must_use]
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    /// All claims.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    /// `email` claim.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.str_claim("email")
    }

    /// `name` claim.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.str_claim("name")
    }

    /// `picture` claim.
    #[must_use]
    pub fn picture(&self) -> Option<&str> {
        self.str_claim("picture")
    }

    /// `exp` claim as UNIX seconds.
    #[must_use]
    pub fn expires_at(&self) -> Option<i64> {
        self.0.get("exp").and_then(Value::as_i64)
    }

    fn str_claim(&self, claim: &str) -> Option<&str> {
        self.0.get(claim).and_then(Value::as_str)
    }
}

fn decode_segment(segment: &str, name: &'static str) -> Result<Vec<u8>, DecodeError> {
    URL_SAFE_LENIENT.decode(segment).map_err(|_| DecodeError::Base64 { segment: name })
}
