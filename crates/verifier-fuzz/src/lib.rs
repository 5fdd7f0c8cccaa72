//! Fuzzing library for id-token-verifier.
//!
//! This crate provides fuzzing targets for the untrusted inputs the verifier
//! accepts: compact tokens and verify endpoint bodies.
//!
//! # Usage
//!
//! ```bash
//! cd crates/verifier-fuzz
//! cargo +nightly fuzz run fuzz_token_parse -- -max_total_time=60
//! ```

pub use id_token_verifier::models;
