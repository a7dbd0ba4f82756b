//! Handles GET /authz/token - exchanges an identity token for an access token

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};

use super::context::AppState;
use super::middleware_auth::bearer_token;
use crate::authz::AuthzResponse;
use crate::errors::DenialError;

/// `Authorization: Bearer <identity token>` in, `{succeeded, accessToken}` out.
///
/// Failures keep the `{succeeded: false, message}` shape with the public message only.
pub async fn handle_authz_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let result = match bearer_token(&headers) {
        Some(identity_token) => state.authz_engine.authorize(identity_token).await,
        None => Err(DenialError::MissingToken.into()),
    };

    match result {
        Ok(access_token) => Json(AuthzResponse::success(access_token)).into_response(),
        Err(error) => {
            error.log();
            let body = AuthzResponse {
                succeeded: false,
                access_token: None,
                message: Some(error.public_message().to_string()),
            };
            (error.status_code(), Json(body)).into_response()
        }
    }
}
