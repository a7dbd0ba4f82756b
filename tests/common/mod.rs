//! Fake identity providers and a wired application for integration tests.

#![allow(dead_code)]

use authgate::config::{Config, Env};
use authgate::http::AppState;
use authgate::oauth::ProviderKind;
use authgate::oauth::ProviderRegistry;
use authgate::oauth::providers::oidc::OidcEndpoints;
use authgate::oauth::providers::{GithubAdapter, OidcAdapter, TwitterAdapter};
use authgate::storage::{MemoryUserStore, UserStore};
use axum::{
    Form, Json, Router,
    extract::Query,
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const EXTERNAL_BASE: &str = "https://gateway.example.com";
pub const SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";
pub const SELF_ISSUED_SECRET: &str = "test-self-issued-secret-0123456789ab";
pub const CLIENT_APP: &str = "https://app.example.com/callback";
pub const COGNITO_IDPRESPONSE: &str =
    "https://pool.auth.us-east-1.amazoncognito.com/oauth2/idpresponse";

pub const GITHUB_CLIENT_ID: &str = "gh-client";
pub const GITHUB_CLIENT_SECRET: &str = "gh-secret";
pub const GITHUB_ACCESS_TOKEN: &str = "gho_fake_access_token";
pub const GITHUB_USER_ID: u64 = 4242;

pub const GOOGLE_ACCESS_TOKEN: &str = "ya29.fake_access_token";
pub const GOOGLE_ID_TOKEN: &str = "google.id.token";

pub const FACEBOOK_ACCESS_TOKEN: &str = "EAAfake_access_token";
pub const FACEBOOK_USER_ID: &str = "10158000000000001";
pub const AAF_ACCESS_TOKEN: &str = "aaf_fake_access_token";

pub const TWITTER_USER_ID: u64 = 783214;

pub const GOOD_CODE: &str = "good-code";

pub const IDENTITY_ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/pool-google";
pub const IDENTITY_AUDIENCE: &str = "google-pool-client";
pub const IDENTITY_KID: &str = "test-key-1";

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", address)
}

fn bearer_is(headers: &HeaderMap, token: &str) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(format!("Bearer {}", token).as_str())
}

pub fn fake_github() -> Router {
    Router::new()
        .route(
            "/login/oauth/access_token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                if form.get("code").map(String::as_str) == Some(GOOD_CODE) {
                    Json(json!({
                        "access_token": GITHUB_ACCESS_TOKEN,
                        "token_type": "bearer",
                        "scope": "read:user,user:email",
                    }))
                } else {
                    // GitHub reports a bad code with a 200.
                    Json(json!({
                        "error": "bad_verification_code",
                        "error_description": "The code passed is incorrect or expired.",
                    }))
                }
            }),
        )
        .route(
            "/user",
            get(|headers: HeaderMap| async move {
                if bearer_is(&headers, GITHUB_ACCESS_TOKEN) {
                    Ok(Json(json!({"id": GITHUB_USER_ID, "login": "octocat"})))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
        .route(
            "/user/emails",
            get(|headers: HeaderMap| async move {
                if bearer_is(&headers, GITHUB_ACCESS_TOKEN) {
                    Ok(Json(json!([
                        {"email": "octocat@users.noreply.github.com", "primary": true, "verified": true},
                        {"email": "old@example.com", "primary": false, "verified": true},
                        {"email": "octocat@example.com", "primary": true, "verified": true},
                    ])))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
}

pub fn fake_google() -> Router {
    Router::new()
        .route(
            "/token",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                match form.get("code").map(String::as_str) {
                    Some(GOOD_CODE) => Ok(Json(json!({
                        "access_token": GOOGLE_ACCESS_TOKEN,
                        "expires_in": 3599,
                        "token_type": "Bearer",
                        "id_token": GOOGLE_ID_TOKEN,
                        "scope": "https://www.googleapis.com/auth/userinfo.email openid",
                    }))),
                    Some("wide-scope") => Ok(Json(json!({
                        "access_token": GOOGLE_ACCESS_TOKEN,
                        "expires_in": 3599,
                        "token_type": "Bearer",
                        "id_token": GOOGLE_ID_TOKEN,
                        "scope": "openid https://www.googleapis.com/auth/userinfo.email https://www.googleapis.com/auth/drive",
                    }))),
                    _ => Err((
                        StatusCode::BAD_REQUEST,
                        Json(json!({"error": "invalid_grant"})),
                    )),
                }
            }),
        )
        .route(
            "/userinfo",
            get(|headers: HeaderMap| async move {
                if bearer_is(&headers, GOOGLE_ACCESS_TOKEN) {
                    Ok(Json(json!({
                        "sub": "110169484474386276334",
                        "email": "someone@gmail.com",
                        "email_verified": true,
                    })))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
}

/// Token endpoint of a provider that omits `scope`; any code but [`GOOD_CODE`] is rejected.
fn fake_token_endpoint(access_token: &'static str) -> axum::routing::MethodRouter {
    post(move |Form(form): Form<HashMap<String, String>>| async move {
        if form.get("code").map(String::as_str) == Some(GOOD_CODE) {
            Ok(Json(json!({
                "access_token": access_token,
                "expires_in": 5183944,
                "token_type": "bearer",
                "id_token": format!("{}.id.token", access_token),
            })))
        } else {
            Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"message": "Invalid verification code format."}})),
            ))
        }
    })
}

/// Facebook Graph: `/me` answers `{id, email}` with no verification flag.
pub fn fake_facebook() -> Router {
    Router::new()
        .route("/token", fake_token_endpoint(FACEBOOK_ACCESS_TOKEN))
        .route(
            "/me",
            get(|headers: HeaderMap| async move {
                if bearer_is(&headers, FACEBOOK_ACCESS_TOKEN) {
                    Ok(Json(json!({"id": FACEBOOK_USER_ID, "email": "someone@facebook.example"})))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
}

/// AAF: OIDC userinfo without `email_verified`.
pub fn fake_aaf() -> Router {
    Router::new()
        .route("/token", fake_token_endpoint(AAF_ACCESS_TOKEN))
        .route(
            "/userinfo",
            get(|headers: HeaderMap| async move {
                if bearer_is(&headers, AAF_ACCESS_TOKEN) {
                    Ok(Json(json!({
                        "sub": "aaf-targeted-id-1",
                        "email": "researcher@uni.edu.au",
                    })))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
}

/// Endpoints of a fake provider served at `base`.
pub fn oidc_endpoints(base: &str, userinfo_path: &str) -> OidcEndpoints {
    OidcEndpoints {
        authorize: format!("{}/authorize", base),
        token: format!("{}/token", base),
        userinfo: format!("{}{}", base, userinfo_path),
    }
}

fn oauth_header(headers: &HeaderMap) -> String {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn fake_twitter() -> Router {
    Router::new()
        .route(
            "/oauth/request_token",
            post(|headers: HeaderMap| async move {
                let authorization = oauth_header(&headers);
                if authorization.starts_with("OAuth ") && authorization.contains("oauth_callback=") {
                    Ok("oauth_token=req-token&oauth_token_secret=req-secret&oauth_callback_confirmed=true")
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
        .route(
            "/oauth/access_token",
            post(|headers: HeaderMap| async move {
                let authorization = oauth_header(&headers);
                if authorization.contains("oauth_token=\"req-token\"")
                    && authorization.contains("oauth_verifier=\"verifier-1\"")
                {
                    Ok(format!(
                        "oauth_token=user-token&oauth_token_secret=user-secret&user_id={}&screen_name=twitter",
                        TWITTER_USER_ID
                    ))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        )
        .route(
            "/1.1/account/verify_credentials.json",
            get(
                |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                    let authorization = oauth_header(&headers);
                    if !authorization.contains("oauth_token=\"user-token\"") {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    let email = (query.get("include_email").map(String::as_str) == Some("true"))
                        .then_some("someone@example.com");
                    Ok(Json(json!({
                        "id": TWITTER_USER_ID,
                        "screen_name": "twitter",
                        "email": email,
                    })))
                },
            ),
        )
}

/// JWKS endpoint serving the test key, counting fetches.
pub fn fake_jwks(fetches: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        "/.well-known/jwks.json",
        get(move || {
            let fetches = fetches.clone();
            async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                let jwks: Value =
                    serde_json::from_str(include_str!("../fixtures/identity_jwks.json")).unwrap();
                Json(jwks)
            }
        }),
    )
}

/// RS256 identity token signed with the fixture key.
pub fn rsa_identity_token(claims: Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(IDENTITY_KID.to_string());
    let key =
        EncodingKey::from_rsa_pem(include_bytes!("../fixtures/identity_rsa_private.pem")).unwrap();
    encode(&header, &claims, &key).unwrap()
}

/// Claims for the Google pool verifier, expiring in five minutes.
pub fn identity_claims(sub: &str, email: &str) -> Value {
    json!({
        "sub": sub,
        "email": email,
        "iss": IDENTITY_ISSUER,
        "aud": IDENTITY_AUDIENCE,
        "iat": Utc::now().timestamp(),
        "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
    })
}

/// Base URLs of the running fakes.
pub struct Fakes {
    pub github: String,
    pub google: String,
    pub twitter: String,
    pub jwks: String,
    pub jwks_fetches: Arc<AtomicUsize>,
}

impl Fakes {
    pub async fn start() -> Self {
        let jwks_fetches = Arc::new(AtomicUsize::new(0));
        Self {
            github: spawn(fake_github()).await,
            google: spawn(fake_google()).await,
            twitter: spawn(fake_twitter()).await,
            jwks: spawn(fake_jwks(jwks_fetches.clone())).await,
            jwks_fetches,
        }
    }

    pub fn google_endpoints(&self) -> OidcEndpoints {
        oidc_endpoints(&self.google, "/userinfo")
    }
}

pub fn test_config(fakes: &Fakes, overrides: &[(&str, &str)]) -> Config {
    let callbacks = format!("{},{}", CLIENT_APP, COGNITO_IDPRESPONSE);
    let verifiers = format!(
        "google|{}|{}|{}/.well-known/jwks.json",
        IDENTITY_ISSUER, IDENTITY_AUDIENCE, fakes.jwks
    );
    let mut values: HashMap<String, String> = [
        ("EXTERNAL_BASE", EXTERNAL_BASE),
        ("AUTHZ_SIGNING_SECRETS", SIGNING_SECRET),
        ("SELF_ISSUED_TOKEN_SECRET", SELF_ISSUED_SECRET),
        ("IDENTITY_VERIFIERS", verifiers.as_str()),
        ("GITHUB_CLIENT_ID", GITHUB_CLIENT_ID),
        ("GITHUB_CLIENT_SECRET", GITHUB_CLIENT_SECRET),
        ("GITHUB_ALLOWED_CALLBACK_URLS", callbacks.as_str()),
        ("GOOGLE_CLIENT_ID", "google-client"),
        ("GOOGLE_CLIENT_SECRET", "google-secret"),
        ("GOOGLE_ALLOWED_CALLBACK_URLS", CLIENT_APP),
        ("TWITTER_CLIENT_ID", "twitter-consumer-key"),
        ("TWITTER_CLIENT_SECRET", "twitter-consumer-secret"),
        ("TWITTER_ALLOWED_CALLBACK_URLS", CLIENT_APP),
        ("CORS_ALLOWED_ORIGINS", "https://app.example.com"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (name, value) in overrides {
        values.insert(name.to_string(), value.to_string());
    }

    let lookup = move |name: &str| values.get(name).cloned();
    Config::from_env(&Env::new(&lookup)).unwrap()
}

/// Registry with every configured provider pointed at the fakes.
pub fn fake_registry(config: &Config, http_client: &reqwest::Client, fakes: &Fakes) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    if let Some(github) = config.providers.get(ProviderKind::Github) {
        registry.register(
            Arc::new(GithubAdapter::with_endpoints(
                http_client.clone(),
                &fakes.github,
                &fakes.github,
            )),
            github.clone(),
        );
    }
    if let Some(google) = config.providers.get(ProviderKind::Google) {
        registry.register(
            Arc::new(OidcAdapter::google_with_endpoints(
                http_client.clone(),
                fakes.google_endpoints(),
            )),
            google.clone(),
        );
    }
    if let Some(twitter) = config.providers.get(ProviderKind::Twitter) {
        registry.register_twitter(
            TwitterAdapter::with_endpoints(http_client.clone(), &fakes.twitter),
            twitter.clone(),
        );
    }
    registry
}

/// Application wired against the fakes with an in-memory store.
pub async fn test_app(overrides: &[(&str, &str)]) -> (AppState, Arc<MemoryUserStore>, Fakes) {
    let store = Arc::new(MemoryUserStore::new());
    let (state, fakes) = test_app_with_store(overrides, store.clone()).await;
    (state, store, fakes)
}

pub async fn test_app_with_store(
    overrides: &[(&str, &str)],
    store: Arc<dyn UserStore>,
) -> (AppState, Fakes) {
    let fakes = Fakes::start().await;
    let config = test_config(&fakes, overrides);
    let http_client = reqwest::Client::new();
    let providers = fake_registry(&config, &http_client, &fakes);
    let state = AppState::new(config, http_client, store, providers);
    (state, fakes)
}
