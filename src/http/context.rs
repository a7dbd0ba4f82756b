//! Application state built once at startup and shared with every handler.

use axum::extract::FromRef;
use std::sync::Arc;

use crate::authz::{
    AuthzEngine, AuthzGuard, AuthzTokenCodec, JwksVerifier, SharedSecretVerifier, VerifierRegistry,
};
use crate::config::{Config, SELF_ISSUED_AUDIENCE};
use crate::oauth::ProviderRegistry;
use crate::storage::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<Config>,
    /// Users keyed by identity provider subject
    pub user_store: Arc<dyn UserStore>,
    /// Enabled identity provider adapters
    pub providers: Arc<ProviderRegistry>,
    pub authz_engine: Arc<AuthzEngine>,
    pub authz_guard: Arc<AuthzGuard>,
}

impl AppState {
    /// Wire verifiers, the access-token codec, engine and guard from configuration.
    pub fn new(
        config: Config,
        http_client: reqwest::Client,
        user_store: Arc<dyn UserStore>,
        providers: ProviderRegistry,
    ) -> Self {
        let mut verifiers = VerifierRegistry::new();
        for verifier in config.identity_verifiers.as_ref() {
            verifiers.register(Arc::new(JwksVerifier::new(
                &verifier.name,
                &verifier.issuer,
                &verifier.audience,
                &verifier.jwks_url,
                http_client.clone(),
            )));
        }
        if let Some(secret) = config.self_issued_token_secret.as_ref() {
            verifiers.register(Arc::new(SharedSecretVerifier::new(
                "self-issued",
                config.external_base.as_ref(),
                SELF_ISSUED_AUDIENCE,
                secret,
            )));
        }
        if verifiers.is_empty() {
            tracing::warn!("no identity verifiers configured, every authorization request will be denied");
        }

        let codec = AuthzTokenCodec::new(
            config.external_base.as_ref(),
            &config.authz_token_audience,
            *config.authz_token_expiration.as_ref(),
        );
        let authz_engine = AuthzEngine::new(
            verifiers,
            user_store.clone(),
            codec.clone(),
            config.authz_signing_secrets.clone(),
        );
        let authz_guard = AuthzGuard::new(
            codec,
            config.authz_signing_secrets.clone(),
            user_store.clone(),
        );

        Self {
            http_client,
            config: Arc::new(config),
            user_store,
            providers: Arc::new(providers),
            authz_engine: Arc::new(authz_engine),
            authz_guard: Arc::new(authz_guard),
        }
    }
}

impl FromRef<AppState> for Arc<AuthzGuard> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.authz_guard.clone()
    }
}
