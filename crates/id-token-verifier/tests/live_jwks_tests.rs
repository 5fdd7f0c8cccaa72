//! Tests against Google's published key set.
//!
//! Run with: `cargo test --features integration --test live_jwks_tests`
#![cfg(feature = "integration")]

use id_token_verifier::config::api;
use id_token_verifier::{Config, JwksClient, RejectReason, SignedToken, Verifier};

#[tokio::test]
async fn test_google_jwks_is_usable() {
    let client = JwksClient::new(&Config::new("live-test")).unwrap();
    assert_eq!(client.jwks_url(), api::GOOGLE_JWKS_URL);

    let jwks = client.fetch_jwks().await.unwrap();
    assert!(!jwks.keys.is_empty());
    assert!(jwks.keys.iter().all(|k| k.common.key_id.is_some()));
}

#[tokio::test]
async fn test_unknown_kid_against_google() {
    let verifier = Verifier::new(&Config::new("live-test")).unwrap();

    // eyJhbGciOiJSUzI1NiIsImtpZCI6Im5vLXN1Y2gta2lkIn0 = {"alg":"RS256","kid":"no-such-kid"}
    let token = SignedToken::from("eyJhbGciOiJSUzI1NiIsImtpZCI6Im5vLXN1Y2gta2lkIn0.e30.AAAA");
    let result = verifier.verify_configured(&token).await;

    assert_eq!(result.reason(), Some(RejectReason::UnknownKey));
    assert_eq!(verifier.keys().fetch_count(), 2);
}
