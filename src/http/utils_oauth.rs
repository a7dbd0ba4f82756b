//! Redirect and self-issued token helpers shared by the browser-facing flows.

use axum::response::{IntoResponse, Response};
use http::{StatusCode, header};

use crate::config::{Config, SELF_ISSUED_AUDIENCE};
use crate::errors::GatewayError;
use crate::oauth::{IdTokenParams, IdentityClaim, ProviderKind, create_id_token};

/// A `302 Found` with only a `location` header.
pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Callback URL registered with a provider for the direct flow.
pub(crate) fn idpresponse_url(config: &Config, kind: ProviderKind) -> String {
    format!("{}/oauth/{}/idpresponse", config.external_base.as_ref(), kind)
}

/// Hand an identity token to the client app in the URL fragment.
pub(crate) fn id_token_redirect(redirect_uri: &str, id_token: &str) -> Response {
    found(&format!("{}#id_token={}", redirect_uri, id_token))
}

/// Mint an identity token for a provider that does not issue one.
///
/// The subject is namespaced by provider so ids from different providers
/// never collide in the user store.
pub(crate) fn self_issued_id_token(
    config: &Config,
    kind: ProviderKind,
    claim: &IdentityClaim,
) -> Result<String, GatewayError> {
    let secret = config
        .self_issued_token_secret
        .as_ref()
        .as_deref()
        .ok_or_else(|| {
            GatewayError::Unexpected(format!(
                "SELF_ISSUED_TOKEN_SECRET must be set for {} sign-in",
                kind
            ))
        })?;

    let namespaced = IdentityClaim {
        sub: format!("{}|{}", kind, claim.sub),
        ..claim.clone()
    };

    create_id_token(&IdTokenParams {
        secret,
        issuer: config.external_base.as_ref(),
        audience: SELF_ISSUED_AUDIENCE,
        claims: &namespaced,
        ttl: *config.self_issued_token_ttl.as_ref(),
    })
}
