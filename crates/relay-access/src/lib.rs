//! Connection authentication for the relay gateway.
//!
//! Maps an opaque identity token onto a validated `Identity` or a
//! fail-closed `Unauthorized` outcome, gated by a static allow-list.
pub mod claims;
pub mod identity;
pub mod verifier;

pub use claims::{validate_id_token_claims, IdTokenClaims, TrustPolicy};
pub use identity::{AllowList, Identity};
pub use verifier::{
    GoogleIdTokenVerifier, IdTokenVerifierConfig, TokenVerifier, Unauthorized,
    UnauthorizedReason, DEFAULT_GOOGLE_TOKENINFO_URL, DEFAULT_GOOGLE_TRUSTED_ISSUERS,
};
