//! Bearer access-token extractor for protected endpoints.

use axum::extract::{FromRef, FromRequestParts};
use http::HeaderMap;
use http::request::Parts;
use std::sync::Arc;

use crate::authz::{AuthenticatedUser, AuthzGuard};
use crate::errors::GatewayError;

/// Authenticated user extractor for protected endpoints
///
/// Runs the authorization guard on the `Authorization: Bearer` access token.
/// Any failure is rejected with the generic denial response.
///
/// ```ignore
/// async fn handler(Authenticated(auth): Authenticated) -> Json<ServerUser> {
///     Json(auth.user)
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Authenticated(pub AuthenticatedUser);

/// Token from an `Authorization: Bearer <token>` header. The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for Authenticated
where
    Arc<AuthzGuard>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let guard = Arc::<AuthzGuard>::from_ref(state);
        guard
            .guard_authz(bearer_token(&parts.headers))
            .await
            .map(Self)
    }
}
