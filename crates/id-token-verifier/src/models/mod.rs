//! Data models for tokens, verification outcomes and the verify endpoint.

mod result;
mod token;
mod wire;

pub use result::{RejectReason, Rejection, VerificationResult, VerifiedIdentity};
pub use token::{ParsedToken, SignedToken, UnverifiedClaims};
pub use wire::{VerifyRequest, VerifyResponse};
