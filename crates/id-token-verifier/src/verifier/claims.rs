//! Registered-claim checks for ID tokens.

use serde::{Deserialize, Deserializer};

use crate::error::{VerifyError, VerifyResult};
use crate::models::{UnverifiedClaims, VerifiedIdentity};

/// The claims the verifier reads. Everything else in the payload is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct IdTokenClaims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default, deserialize_with = "numeric_date")]
    exp: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    iat: Option<i64>,
    #[serde(default, deserialize_with = "numeric_date")]
    nbf: Option<i64>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// `aud` is either a single string or an array of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    fn contains(&self, expected: &str) -> bool {
        match self {
            Self::One(aud) => aud == expected,
            Self::Many(auds) => auds.iter().any(|aud| aud == expected),
        }
    }
}

/// NumericDate may be sent as an integer or a float.
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(value.and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))))
}

impl IdTokenClaims {
    pub(crate) fn from_unverified(claims: &UnverifiedClaims) -> VerifyResult<Self> {
        serde_json::from_value(serde_json::Value::Object(claims.as_map().clone()))
            .map_err(|e| VerifyError::invalid_claim(format!("invalid claim types: {e}")))
    }

    /// Check audience, issuer, time window and subject, in that order.
    pub(crate) fn validate(
        self,
        expected_audience: &str,
        expected_issuer: &str,
        now: i64,
        leeway: i64,
    ) -> VerifyResult<VerifiedIdentity> {
        match &self.aud {
            None => return Err(VerifyError::invalid_claim("missing aud claim")),
            Some(aud) if !aud.contains(expected_audience) => {
                return Err(VerifyError::invalid_claim(
                    "audience mismatch: token was not issued for this client",
                ));
            }
            Some(_) => {}
        }

        match self.iss.as_deref() {
            None => return Err(VerifyError::invalid_claim("missing iss claim")),
            Some(iss) if iss != expected_issuer => {
                return Err(VerifyError::invalid_claim(format!(
                    "issuer mismatch: expected {expected_issuer}, got {iss}"
                )));
            }
            Some(_) => {}
        }

        let Some(exp) = self.exp else {
            return Err(VerifyError::invalid_claim("missing exp claim"));
        };
        if now > exp.saturating_add(leeway) {
            return Err(VerifyError::invalid_claim(format!("token expired at {exp}")));
        }

        let Some(iat) = self.iat else {
            return Err(VerifyError::invalid_claim("missing iat claim"));
        };
        if now < iat.saturating_sub(leeway) {
            return Err(VerifyError::invalid_claim(format!("token issued in the future ({iat})")));
        }

        if let Some(nbf) = self.nbf {
            if now < nbf.saturating_sub(leeway) {
                return Err(VerifyError::invalid_claim(format!("token not valid before {nbf}")));
            }
        }

        let subject = match self.sub {
            Some(sub) if !sub.trim().is_empty() => sub,
            _ => return Err(VerifyError::invalid_claim("missing sub claim")),
        };

        Ok(VerifiedIdentity {
            subject,
            email: self.email,
            name: self.name,
            picture: self.picture,
            issued_at: Some(iat),
            expires_at: Some(exp),
        })
    }
}
