//! Axum HTTP server handlers and middleware for the provider, Cognito, authz and user-data endpoints.

pub mod context;
mod handler_authz;
mod handler_cognito;
mod handler_provider_oauth;
mod handler_user_data;
pub mod middleware_auth;
pub mod server;
mod utils_oauth;

pub use context::AppState;
pub use handler_cognito::{CognitoTokenForm, parse_token_form};
pub use middleware_auth::{Authenticated, bearer_token};
pub use server::build_router;
