//! ID Token Verifier
//!
//! Verification service and client for OpenID Connect ID tokens issued by an
//! identity provider (Google Identity Services by default). A browser-side widget
//! hands the application a signed token; this crate decodes it for display,
//! submits it to a verify endpoint, and verifies it there against the provider's
//! published signing keys.
//!
//! # Features
//!
//! - **Authoritative verification**: signature, audience, issuer and time-window checks
//! - **Key caching**: JWKS fetched lazily, refreshed on unknown `kid`, rate limited and coalesced
//! - **Never-failing results**: every failure is a typed rejection, not an error
//! - **HTTP endpoint**: axum router with the verify route and health probes
//!
//! # Example
//!
//! ```no_run
//! use id_token_verifier::{Config, SignedToken, Verifier};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let verifier = Verifier::new(&config)?;
//!
//!     let token = SignedToken::from("eyJhbGciOiJSUzI1NiJ9.e30.c2ln");
//!     let result = verifier.verify_configured(&token).await;
//!     println!("verified: {}", result.is_verified());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod jwks;
pub mod keyset;
pub mod models;
pub mod server;
pub mod verifier;

pub use config::Config;
pub use credential::{CredentialClient, CredentialEvent, decode_unverified};
pub use error::{DecodeError, FetchError, VerifyError};
pub use jwks::JwksClient;
pub use keyset::{KeySet, KeySetCache, KeySource};
pub use models::{
    RejectReason, Rejection, SignedToken, UnverifiedClaims, VerificationResult, VerifiedIdentity,
};
pub use server::VerifyServer;
pub use verifier::Verifier;
