//! Provider-facing OAuth plumbing: adapters, the `state` codec and the id-token issuer.

pub mod id_token;
pub mod providers;
pub mod state;
pub mod types;

pub use id_token::{IdTokenClaims, IdTokenParams, create_id_token};
pub use providers::{ProviderAdapter, ProviderRegistry};
pub use state::{OAuthState, decode_state, encode_state, parse_authorize_request, validate_redirect_uri};
pub use types::{ClientCredentials, IdentityClaim, ProviderKind, ProviderTokenResponse};
