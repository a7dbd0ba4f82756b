//! Identity provider adapters.
//!
//! Each adapter hides one provider's token-exchange and profile-fetch quirks
//! behind [`ProviderAdapter`]. Twitter's OAuth 1.0a dance does not fit the
//! authorization-code contract and is exposed through [`twitter::TwitterAdapter`].

pub mod github;
pub mod oauth1;
pub mod oidc;
pub mod twitter;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::config::{ProviderConfig, ProviderConfigs};
use crate::errors::{DenialError, GatewayError, UpstreamError};
use crate::oauth::types::{ClientCredentials, IdentityClaim, ProviderKind, ProviderTokenResponse};

pub use github::GithubAdapter;
pub use oidc::OidcAdapter;
pub use twitter::TwitterAdapter;

/// Longest upstream body kept in a private error message.
const MAX_LOGGED_BODY: usize = 512;

/// Authorization-code grant adapter for one identity provider.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Consent-screen URL the browser is redirected to.
    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<Url, GatewayError>;

    /// Exchange an authorization code at the provider token endpoint.
    async fn exchange_code_for_token(
        &self,
        code: &str,
        credentials: &ClientCredentials,
        redirect_uri: &str,
    ) -> Result<ProviderTokenResponse, GatewayError>;

    /// Fetch the account behind a provider access token.
    async fn map_to_identity_claim(&self, access_token: &str) -> Result<IdentityClaim, GatewayError>;
}

/// Read a 200 response body, mapping transport failures and other statuses.
pub(crate) async fn read_body(
    kind: ProviderKind,
    step: &'static str,
    result: reqwest::Result<reqwest::Response>,
) -> Result<String, UpstreamError> {
    let response = result.map_err(|e| UpstreamError::Transport {
        provider: kind.to_string(),
        step,
        reason: e.to_string(),
    })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| UpstreamError::Transport {
        provider: kind.to_string(),
        step,
        reason: e.to_string(),
    })?;

    if status != StatusCode::OK {
        return Err(UpstreamError::UnexpectedStatus {
            provider: kind.to_string(),
            step,
            status: status.as_u16(),
            body: truncate(&body),
        });
    }

    Ok(body)
}

/// Read a 200 response and deserialize it against the provider's schema.
pub(crate) async fn read_json<T: DeserializeOwned>(
    kind: ProviderKind,
    step: &'static str,
    result: reqwest::Result<reqwest::Response>,
) -> Result<T, UpstreamError> {
    let body = read_body(kind, step, result).await?;
    serde_json::from_str(&body).map_err(|e| UpstreamError::MalformedResponse {
        provider: kind.to_string(),
        step,
        reason: e.to_string(),
    })
}

/// Parse a configured endpoint, treating a bad URL as a programming error.
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, GatewayError> {
    Url::parse(endpoint)
        .map_err(|e| GatewayError::Unexpected(format!("invalid endpoint {}: {}", endpoint, e)))
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_LOGGED_BODY) {
        Some((index, _)) => format!("{}...", &body[..index]),
        None => body.to_string(),
    }
}

/// An enabled authorization-code provider and its deployment settings.
#[derive(Clone)]
pub struct RegisteredProvider {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub config: ProviderConfig,
}

/// Twitter adapter and its deployment settings.
#[derive(Clone)]
pub struct RegisteredTwitter {
    pub adapter: Arc<TwitterAdapter>,
    pub config: ProviderConfig,
}

/// Enabled providers for this deployment, built once at startup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, RegisteredProvider>,
    twitter: Option<RegisteredTwitter>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every configured provider against its production endpoints.
    pub fn from_config(http_client: &reqwest::Client, configs: &ProviderConfigs) -> Self {
        let mut registry = Self::new();
        for config in configs.as_ref() {
            match config.kind {
                ProviderKind::Google => registry.register(
                    Arc::new(OidcAdapter::google(http_client.clone())),
                    config.clone(),
                ),
                ProviderKind::Facebook => registry.register(
                    Arc::new(OidcAdapter::facebook(http_client.clone())),
                    config.clone(),
                ),
                ProviderKind::Aaf => registry.register(
                    Arc::new(OidcAdapter::aaf(http_client.clone())),
                    config.clone(),
                ),
                ProviderKind::Github => registry.register(
                    Arc::new(GithubAdapter::new(http_client.clone())),
                    config.clone(),
                ),
                ProviderKind::Twitter => registry.register_twitter(
                    TwitterAdapter::new(http_client.clone()),
                    config.clone(),
                ),
            }
            tracing::info!(provider = %config.kind, "identity provider enabled");
        }
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>, config: ProviderConfig) {
        self.providers
            .insert(adapter.kind(), RegisteredProvider { adapter, config });
    }

    pub fn register_twitter(&mut self, adapter: TwitterAdapter, config: ProviderConfig) {
        self.twitter = Some(RegisteredTwitter {
            adapter: Arc::new(adapter),
            config,
        });
    }

    pub fn get(&self, kind: ProviderKind) -> Result<&RegisteredProvider, DenialError> {
        self.providers
            .get(&kind)
            .ok_or_else(|| DenialError::ProviderNotEnabled(kind.to_string()))
    }

    pub fn twitter(&self) -> Result<&RegisteredTwitter, DenialError> {
        self.twitter
            .as_ref()
            .ok_or_else(|| DenialError::ProviderNotEnabled(ProviderKind::Twitter.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_long_bodies() {
        let body = "x".repeat(MAX_LOGGED_BODY + 10);
        let truncated = truncate(&body);
        assert_eq!(truncated.len(), MAX_LOGGED_BODY + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate("short"), "short");
    }

    #[test]
    fn test_registry_rejects_unconfigured_provider() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.get(ProviderKind::Google),
            Err(DenialError::ProviderNotEnabled(_))
        ));
        assert!(registry.twitter().is_err());
    }
}
