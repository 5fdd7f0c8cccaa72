//! Authoritative ID token verification.
//!
//! A [`Verifier`] owns the signing key cache and turns a compact token into a
//! [`VerificationResult`]. Every failure is folded into a [`Rejection`](crate::models::Rejection) with a
//! machine-readable reason; nothing here panics or returns an `Err` to the caller.
//!
//! Checks run in a fixed order: structure, key lookup, signature, then claims.
//! Claims are only read once the signature holds.

mod claims;

use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};

use crate::config::Config;
use crate::error::{VerifyError, VerifyResult};
use crate::jwks::JwksClient;
use crate::keyset::{KeySetCache, KeySource};
use crate::models::{ParsedToken, RejectReason, SignedToken, VerificationResult, VerifiedIdentity};

use claims::IdTokenClaims;

/// Verifies provider-issued ID tokens against the provider's published keys.
#[derive(Debug)]
pub struct Verifier {
    keys: Arc<KeySetCache>,
    audience: String,
    issuer: String,
    leeway: i64,
}

impl Verifier {
    /// Create a verifier that fetches keys from `config.jwks_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let source = JwksClient::new(config)?;
        Ok(Self::with_source(Arc::new(source), config))
    }

    /// Create a verifier over an arbitrary key source.
    #[must_use]
    pub fn with_source(source: Arc<dyn KeySource>, config: &Config) -> Self {
        Self::with_cache(Arc::new(KeySetCache::new(source, config)), config)
    }

    /// Create a verifier sharing an existing key cache.
    #[must_use]
    pub fn with_cache(keys: Arc<KeySetCache>, config: &Config) -> Self {
        Self {
            keys,
            audience: config.client_id.clone(),
            issuer: config.issuer.clone(),
            leeway: config.leeway_secs(),
        }
    }

    /// The key cache backing this verifier.
    #[must_use]
    pub const fn keys(&self) -> &Arc<KeySetCache> {
        &self.keys
    }

    /// Verify against the configured client id and issuer.
    pub async fn verify_configured(&self, token: &SignedToken) -> VerificationResult {
        self.verify(token, &self.audience, &self.issuer).await
    }

    /// Verify a token for the given audience and issuer at the current time.
    pub async fn verify(
        &self,
        token: &SignedToken,
        expected_audience: &str,
        expected_issuer: &str,
    ) -> VerificationResult {
        self.verify_at(token, expected_audience, expected_issuer, Utc::now().timestamp()).await
    }

    /// Verify as of `now` (UNIX seconds).
    pub async fn verify_at(
        &self,
        token: &SignedToken,
        expected_audience: &str,
        expected_issuer: &str,
        now: i64,
    ) -> VerificationResult {
        match self.try_verify(token, expected_audience, expected_issuer, now).await {
            Ok(identity) => {
                tracing::info!(subject = %identity.subject, "ID token verified");
                VerificationResult::Verified(identity)
            }
            Err(e) => {
                let rejection = e.to_rejection();
                if rejection.reason == RejectReason::KeyFetchFailed {
                    tracing::warn!(reason = %rejection.reason, error = %e, "ID token not verified");
                } else {
                    tracing::info!(reason = %rejection.reason, error = %e, "ID token rejected");
                }
                VerificationResult::Rejected(rejection)
            }
        }
    }

    async fn try_verify(
        &self,
        token: &SignedToken,
        expected_audience: &str,
        expected_issuer: &str,
        now: i64,
    ) -> VerifyResult<VerifiedIdentity> {
        if token.is_blank() {
            return Err(VerifyError::MissingCredential);
        }

        let parsed = token.parse()?;
        let jwk = self.keys.resolve(parsed.header.kid.as_deref()).await?;
        verify_signature(&parsed, &jwk)?;

        IdTokenClaims::from_unverified(&parsed.claims)?.validate(
            expected_audience,
            expected_issuer,
            now,
            self.leeway,
        )
    }
}

/// Check the token signature under `jwk`.
///
/// Only asymmetric algorithms are accepted, and the key's type (and `alg`, if
/// it declares one) must agree with the token header.
fn verify_signature(parsed: &ParsedToken, jwk: &Jwk) -> VerifyResult<()> {
    let alg = parsed.header.alg;

    if !key_supports(jwk, alg) {
        return Err(VerifyError::invalid_signature(format!(
            "{alg:?} not usable with this key"
        )));
    }
    if let Some(key_alg) = &jwk.common.key_algorithm {
        if signing_algorithm(key_alg) != Some(alg) {
            return Err(VerifyError::invalid_signature(format!(
                "key is for {key_alg:?}, token uses {alg:?}"
            )));
        }
    }

    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| VerifyError::invalid_signature(format!("unusable key: {e}")))?;

    match jsonwebtoken::crypto::verify(
        &parsed.signature,
        parsed.signing_input.as_bytes(),
        &key,
        alg,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err(VerifyError::invalid_signature("signature mismatch")),
        Err(e) => Err(VerifyError::invalid_signature(e.to_string())),
    }
}

/// Signature algorithm a JWK `alg` names. Key-encryption algorithms map to `None`.
fn signing_algorithm(key_alg: &KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Key family check. Symmetric keys never verify provider tokens.
fn key_supports(jwk: &Jwk, alg: Algorithm) -> bool {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => matches!(
            alg,
            Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512
        ),
        AlgorithmParameters::EllipticCurve(_) => {
            matches!(alg, Algorithm::ES256 | Algorithm::ES384)
        }
        AlgorithmParameters::OctetKeyPair(_) => matches!(alg, Algorithm::EdDSA),
        AlgorithmParameters::OctetKey(_) => false,
    }
}
