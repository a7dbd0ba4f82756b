//! Handles the direct provider flows under /oauth/{provider}
//!
//! `authorize` sends the browser to the provider consent screen, `idpresponse`
//! receives the provider callback and hands an identity token to the client
//! app in the redirect fragment.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Response,
};

use super::context::AppState;
use super::middleware_auth::bearer_token;
use super::utils_oauth::{found, id_token_redirect, idpresponse_url, self_issued_id_token};
use crate::errors::{DenialError, GatewayError};
use crate::oauth::types::{AuthorizeQuery, CallbackQuery};
use crate::oauth::{
    IdentityClaim, ProviderKind, decode_state, encode_state, parse_authorize_request,
    validate_redirect_uri,
};

/// Begin a provider sign-in
/// GET /oauth/{provider}/authorize?redirect_uri=... or ?state=...
pub async fn handle_provider_authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, GatewayError> {
    let kind: ProviderKind = provider.parse()?;
    let oauth_state = parse_authorize_request(&query)?;
    let encoded_state = encode_state(&oauth_state);
    let callback = idpresponse_url(&state.config, kind);

    if kind == ProviderKind::Twitter {
        let twitter = state.providers.twitter()?;
        validate_redirect_uri(&oauth_state.redirect_uri, &twitter.config.allowed_callback_urls)?;

        // OAuth 1.0a has no state parameter, so it rides on the callback URL.
        let callback = format!("{}?state={}", callback, urlencoding::encode(&encoded_state));
        let request_token = twitter
            .adapter
            .request_token(&twitter.config.credentials, &callback)
            .await?;
        let location = twitter.adapter.authenticate_url(&request_token)?;
        return Ok(found(location.as_str()));
    }

    let registered = state.providers.get(kind)?;
    validate_redirect_uri(&oauth_state.redirect_uri, &registered.config.allowed_callback_urls)?;

    let location = registered.adapter.authorization_url(
        &registered.config.credentials.client_id,
        &callback,
        &encoded_state,
    )?;
    tracing::debug!(provider = %kind, redirect_uri = %oauth_state.redirect_uri, "redirecting to provider");
    Ok(found(location.as_str()))
}

/// Provider callback
/// GET /oauth/{provider}/idpresponse?code=...&state=...
///
/// The state is decoded and its redirect target checked against the
/// allow-list before anything is exchanged with the provider.
pub async fn handle_provider_idpresponse(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, GatewayError> {
    let kind: ProviderKind = provider.parse()?;

    if let Some(error) = query.error.as_deref() {
        return Err(DenialError::ProviderRejected {
            provider: kind.to_string(),
            error: match query.error_description.as_deref() {
                Some(description) => format!("{}: {}", error, description),
                None => error.to_string(),
            },
        }
        .into());
    }
    if query.denied.is_some() {
        return Err(DenialError::ProviderRejected {
            provider: kind.to_string(),
            error: "user denied consent".to_string(),
        }
        .into());
    }

    let oauth_state = decode_state(
        query
            .state
            .as_deref()
            .ok_or_else(|| DenialError::MalformedRequest("state is required".to_string()))?,
    )?;

    let id_token = if kind == ProviderKind::Twitter {
        let twitter = state.providers.twitter()?;
        validate_redirect_uri(&oauth_state.redirect_uri, &twitter.config.allowed_callback_urls)?;

        let claim = twitter
            .adapter
            .map_to_identity_claim(
                &twitter.config.credentials,
                query.oauth_token.as_deref().unwrap_or_default(),
                query.oauth_verifier.as_deref().unwrap_or_default(),
            )
            .await?;
        self_issued_id_token(&state.config, kind, &claim)?
    } else {
        let registered = state.providers.get(kind)?;
        validate_redirect_uri(&oauth_state.redirect_uri, &registered.config.allowed_callback_urls)?;

        let code = query
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or_else(|| DenialError::MalformedRequest("code is required".to_string()))?;

        let token = registered
            .adapter
            .exchange_code_for_token(
                code,
                &registered.config.credentials,
                &idpresponse_url(&state.config, kind),
            )
            .await?;

        match token.id_token {
            Some(id_token) => id_token,
            None => {
                let claim = registered
                    .adapter
                    .map_to_identity_claim(&token.access_token)
                    .await?;
                self_issued_id_token(&state.config, kind, &claim)?
            }
        }
    };

    tracing::info!(provider = %kind, "provider sign-in completed");
    Ok(id_token_redirect(&oauth_state.redirect_uri, &id_token))
}

/// Normalized identity behind a provider access token
/// GET /oauth/{provider}/userinfo
pub async fn handle_provider_userinfo(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Result<Json<IdentityClaim>, GatewayError> {
    let kind: ProviderKind = provider.parse()?;
    if kind == ProviderKind::Twitter {
        // Twitter calls are signed with the user's token secret, which a
        // bearer token does not carry.
        return Err(DenialError::MalformedRequest(
            "twitter does not support bearer userinfo".to_string(),
        )
        .into());
    }

    let access_token = bearer_token(&headers).ok_or(DenialError::MissingToken)?;
    let registered = state.providers.get(kind)?;
    let claim = registered.adapter.map_to_identity_claim(access_token).await?;
    Ok(Json(claim))
}
