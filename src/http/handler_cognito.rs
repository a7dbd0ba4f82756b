//! Handles /cognito/github/* - GitHub presented to a Cognito user pool as an OIDC provider
//!
//! Cognito calls `authorize` from the browser, then `token` and `userinfo`
//! server-to-server. The client id and secret Cognito was configured with must
//! be the GitHub OAuth app credentials.

use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use base64::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use super::context::AppState;
use super::middleware_auth::bearer_token;
use super::utils_oauth::found;
use crate::errors::{DenialError, GatewayError};
use crate::oauth::types::AuthorizeQuery;
use crate::oauth::{
    IdTokenParams, IdentityClaim, ProviderKind, create_id_token, validate_redirect_uri,
};

/// Form Cognito posts to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CognitoTokenForm {
    pub grant_type: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub code: String,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CognitoTokenResponse {
    pub access_token: String,
    pub id_token: String,
    pub token_type: String,
    pub scope: String,
}

/// Parse a raw or base64-wrapped `application/x-www-form-urlencoded` body.
pub fn parse_token_form(body: &str) -> Result<CognitoTokenForm, DenialError> {
    let body = body.trim();
    // `_` is outside the standard base64 alphabet, so a wrapped body never matches.
    let form = if body.contains("grant_type=") {
        body.to_string()
    } else {
        BASE64_STANDARD
            .decode(body)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| {
                DenialError::MalformedRequest("token body is neither a form nor base64".to_string())
            })?
    };

    let mut fields: HashMap<String, String> = url::form_urlencoded::parse(form.as_bytes())
        .into_owned()
        .collect();
    let mut required = |name: &str| {
        fields
            .remove(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| DenialError::MalformedRequest(format!("{} is required", name)))
    };

    Ok(CognitoTokenForm {
        grant_type: required("grant_type")?,
        redirect_uri: required("redirect_uri")?,
        client_id: required("client_id")?,
        client_secret: required("client_secret")?,
        code: required("code")?,
        state: fields.remove("state").filter(|value| !value.is_empty()),
    })
}

/// GET /cognito/github/authorize
pub async fn handle_cognito_authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, GatewayError> {
    let github = state.providers.get(ProviderKind::Github)?;

    if query.response_type.as_deref() != Some("code") {
        return Err(DenialError::MalformedRequest(format!(
            "unsupported response_type {:?}",
            query.response_type
        ))
        .into());
    }
    let client_id = query.client_id.as_deref().unwrap_or_default();
    if client_id != github.config.credentials.client_id {
        return Err(DenialError::InvalidClient(client_id.to_string()).into());
    }
    let redirect_uri = query
        .redirect_uri
        .as_deref()
        .ok_or_else(|| DenialError::MalformedRequest("redirect_uri is required".to_string()))?;
    validate_redirect_uri(redirect_uri, &github.config.allowed_callback_urls)?;
    let cognito_state = query
        .state
        .as_deref()
        .ok_or_else(|| DenialError::MalformedRequest("state is required".to_string()))?;

    // Cognito's own state goes through untouched.
    let location = github
        .adapter
        .authorization_url(client_id, redirect_uri, cognito_state)?;
    Ok(found(location.as_str()))
}

/// POST /cognito/github/token
pub async fn handle_cognito_token(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<CognitoTokenResponse>, GatewayError> {
    let github = state.providers.get(ProviderKind::Github)?;
    let form = parse_token_form(&body)?;

    if form.grant_type != "authorization_code" {
        return Err(DenialError::MalformedRequest(format!(
            "unsupported grant_type {}",
            form.grant_type
        ))
        .into());
    }
    let credentials = &github.config.credentials;
    if form.client_id != credentials.client_id || form.client_secret != credentials.client_secret {
        return Err(DenialError::InvalidClient(form.client_id).into());
    }
    validate_redirect_uri(&form.redirect_uri, &github.config.allowed_callback_urls)?;

    let token = github
        .adapter
        .exchange_code_for_token(&form.code, credentials, &form.redirect_uri)
        .await?;
    let claim = github.adapter.map_to_identity_claim(&token.access_token).await?;

    let issuer = format!("{}/cognito/github", state.config.external_base.as_ref());
    let id_token = create_id_token(&IdTokenParams {
        secret: &form.client_secret,
        issuer: &issuer,
        audience: &form.client_id,
        claims: &claim,
        ttl: *state.config.id_token_ttl.as_ref(),
    })?;

    tracing::info!(github_id = %claim.sub, "cognito token issued");
    Ok(Json(CognitoTokenResponse {
        access_token: token.access_token,
        id_token,
        token_type: token.token_type,
        scope: token.scope.unwrap_or_default(),
    }))
}

/// GET or POST /cognito/github/userinfo
pub async fn handle_cognito_userinfo(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<IdentityClaim>, GatewayError> {
    let github = state.providers.get(ProviderKind::Github)?;
    let access_token = bearer_token(&headers).ok_or(DenialError::MissingToken)?;
    let claim = github.adapter.map_to_identity_claim(access_token).await?;
    Ok(Json(claim))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM: &str = "grant_type=authorization_code&redirect_uri=https%3A%2F%2Fpool.auth.us-east-1.amazoncognito.com%2Foauth2%2Fidpresponse&client_id=gh-client&client_secret=gh-secret&code=abc123";

    #[test]
    fn test_parse_raw_form() {
        let form = parse_token_form(FORM).unwrap();
        assert_eq!(form.grant_type, "authorization_code");
        assert_eq!(
            form.redirect_uri,
            "https://pool.auth.us-east-1.amazoncognito.com/oauth2/idpresponse"
        );
        assert_eq!(form.client_id, "gh-client");
        assert_eq!(form.client_secret, "gh-secret");
        assert_eq!(form.code, "abc123");
        assert_eq!(form.state, None);
    }

    #[test]
    fn test_parse_base64_wrapped_form() {
        let wrapped = BASE64_STANDARD.encode(format!("{}&state=xyz", FORM));
        let form = parse_token_form(&wrapped).unwrap();
        assert_eq!(form.code, "abc123");
        assert_eq!(form.state.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_parse_rejects_incomplete_form() {
        assert!(matches!(
            parse_token_form("grant_type=authorization_code&code=abc"),
            Err(DenialError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_token_form("!!not base64!!"),
            Err(DenialError::MalformedRequest(_))
        ));
    }
}
