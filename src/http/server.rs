//! Main router configuration assembling the provider, Cognito, authz and user-data endpoints.

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    context::AppState,
    handler_authz::handle_authz_token,
    handler_cognito::{handle_cognito_authorize, handle_cognito_token, handle_cognito_userinfo},
    handler_provider_oauth::{
        handle_provider_authorize, handle_provider_idpresponse, handle_provider_userinfo,
    },
    handler_user_data::handle_user_data,
};

/// Build the application router
pub fn build_router(ctx: AppState) -> Router {
    let oauth_routes = Router::new()
        .route("/{provider}/authorize", get(handle_provider_authorize))
        .route("/{provider}/idpresponse", get(handle_provider_idpresponse))
        .route("/{provider}/userinfo", get(handle_provider_userinfo));

    let cognito_routes = Router::new()
        .route("/authorize", get(handle_cognito_authorize))
        .route("/token", post(handle_cognito_token))
        .route(
            "/userinfo",
            get(handle_cognito_userinfo).post(handle_cognito_userinfo),
        );

    let origins: Vec<HeaderValue> = ctx
        .config
        .cors_allowed_origins
        .as_ref()
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = ?e, "ignoring invalid cors origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    Router::new()
        .nest("/oauth", oauth_routes)
        .nest("/cognito/github", cognito_routes)
        .route("/authz/token", get(handle_authz_token))
        .route("/api/{action}", post(handle_user_data))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
