//! The gateway's own access tokens: minting from identity tokens and guarding protected calls.

pub mod engine;
pub mod guard;
pub mod secrets;
pub mod token;
pub mod verifier;

pub use engine::{AuthzEngine, AuthzResponse};
pub use guard::{AuthenticatedUser, AuthzGuard, access_guard, cross_account_guard};
pub use secrets::{SigningSecretSet, generate_secret};
pub use token::{AuthzTokenClaims, AuthzTokenCodec, AuthzTokenPayload, Role};
pub use verifier::{
    IdentityTokenVerifier, JwksVerifier, SharedSecretVerifier, VerifierRegistry, peek_audience,
};
