//! Environment-based configuration types for the gateway runtime settings.

use anyhow::Result;
use std::time::Duration;
use url::Url;

use crate::authz::SigningSecretSet;
use crate::authz::secrets::check_length;
use crate::errors::ConfigError;
use crate::oauth::types::{ClientCredentials, ProviderKind};

/// Audience of identity tokens the gateway issues itself for providers
/// without an OIDC id token.
pub const SELF_ISSUED_AUDIENCE: &str = "authgate-self-issued";

/// HTTP server port configuration
#[derive(Clone, Debug)]
pub struct HttpPort(u16);

/// Certificate bundles for HTTPS connections
#[derive(Clone, Debug)]
pub struct CertificateBundles(Vec<String>);

/// HTTP client timeout configuration
#[derive(Clone, Debug)]
pub struct HttpClientTimeout(Duration);

/// Lifetime of a minted token
#[derive(Clone, Copy, Debug)]
pub struct TokenLifetime(chrono::Duration);

/// Public base URL of the gateway, without trailing slash
#[derive(Clone, Debug)]
pub struct ExternalBase(String);

/// Secret for self-issued identity tokens
#[derive(Clone, Default)]
pub struct SelfIssuedTokenSecret(Option<String>);

/// One trusted identity-token issuer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityVerifierConfig {
    pub name: String,
    pub issuer: String,
    pub audience: String,
    pub jwks_url: String,
}

/// Trusted identity-token issuers
#[derive(Clone, Debug, Default)]
pub struct IdentityVerifiers(Vec<IdentityVerifierConfig>);

/// Comma-separated list setting
#[derive(Clone, Debug, Default)]
pub struct CommaList(Vec<String>);

/// Credentials and redirect allow-list for one identity provider
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub credentials: ClientCredentials,
    pub allowed_callback_urls: Vec<String>,
}

/// Enabled identity providers
#[derive(Clone, Debug, Default)]
pub struct ProviderConfigs(Vec<ProviderConfig>);

/// Main application configuration
#[derive(Clone)]
pub struct Config {
    pub version: String,
    pub http_port: HttpPort,
    pub external_base: ExternalBase,
    pub certificate_bundles: CertificateBundles,
    pub user_agent: String,
    pub http_client_timeout: HttpClientTimeout,
    pub storage_backend: String,
    pub database_url: Option<String>,
    pub authz_signing_secrets: SigningSecretSet,
    pub authz_token_expiration: TokenLifetime,
    pub authz_token_audience: String,
    pub id_token_ttl: TokenLifetime,
    pub self_issued_token_secret: SelfIssuedTokenSecret,
    pub self_issued_token_ttl: TokenLifetime,
    pub identity_verifiers: IdentityVerifiers,
    pub providers: ProviderConfigs,
    pub cors_allowed_origins: CommaList,
}

/// Source of configuration values, the process environment outside of tests.
pub struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl<'a> Env<'a> {
    pub fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self { lookup }
    }

    fn require(&self, name: &str) -> Result<String> {
        self.optional(name)
            .ok_or_else(|| ConfigError::EnvVarRequired(name.to_string()).into())
    }

    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|value| !value.is_empty())
    }

    fn with_default(&self, name: &str, default_value: &str) -> String {
        self.optional(name)
            .unwrap_or_else(|| default_value.to_string())
    }
}

impl Config {
    /// Create a new configuration from environment variables
    pub fn new() -> Result<Self> {
        let lookup = |name: &str| std::env::var(name).ok();
        Self::from_env(&Env::new(&lookup))
    }

    pub fn from_env(env: &Env<'_>) -> Result<Self> {
        let default_user_agent = format!("authgate/{}", version()?);

        let external_base: ExternalBase = env.require("EXTERNAL_BASE")?.try_into()?;
        let http_port: HttpPort = env.with_default("HTTP_PORT", "8080").try_into()?;
        let certificate_bundles: CertificateBundles =
            env.optional("CERTIFICATE_BUNDLES").try_into()?;
        let user_agent = env.with_default("USER_AGENT", &default_user_agent);
        let http_client_timeout: HttpClientTimeout =
            env.with_default("HTTP_CLIENT_TIMEOUT", "10s").try_into()?;
        let storage_backend = env.with_default("STORAGE_BACKEND", "memory");
        let database_url = env.optional("DATABASE_URL");

        let authz_signing_secrets: SigningSecretSet =
            env.require("AUTHZ_SIGNING_SECRETS")?.try_into()?;
        let authz_token_expiration: TokenLifetime =
            env.with_default("AUTHZ_TOKEN_EXPIRATION", "1d").try_into()?;
        let authz_token_audience = env.with_default("AUTHZ_TOKEN_AUDIENCE", "authgate-api");
        let id_token_ttl: TokenLifetime = env.with_default("ID_TOKEN_TTL", "20s").try_into()?;
        let self_issued_token_secret: SelfIssuedTokenSecret =
            env.optional("SELF_ISSUED_TOKEN_SECRET").try_into()?;
        let self_issued_token_ttl: TokenLifetime =
            env.with_default("SELF_ISSUED_TOKEN_TTL", "5m").try_into()?;
        let identity_verifiers: IdentityVerifiers =
            env.optional("IDENTITY_VERIFIERS").try_into()?;
        let providers = ProviderConfigs::from_env(env)?;
        let cors_allowed_origins: CommaList = env.optional("CORS_ALLOWED_ORIGINS").into();

        Ok(Self {
            version: version()?,
            http_port,
            external_base,
            certificate_bundles,
            user_agent,
            http_client_timeout,
            storage_backend,
            database_url,
            authz_signing_secrets,
            authz_token_expiration,
            authz_token_audience,
            id_token_ttl,
            self_issued_token_secret,
            self_issued_token_ttl,
            identity_verifiers,
            providers,
            cors_allowed_origins,
        })
    }
}

/// Get application version from build environment
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotSet.into())
}

impl TryFrom<String> for HttpPort {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Ok(Self(8080))
        } else {
            value
                .parse::<u16>()
                .map(Self)
                .map_err(|err| ConfigError::PortParsingFailed(err).into())
        }
    }
}

impl AsRef<u16> for HttpPort {
    fn as_ref(&self) -> &u16 {
        &self.0
    }
}

impl TryFrom<Option<String>> for CertificateBundles {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        Ok(Self(
            value
                .split(';')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect::<Vec<String>>(),
        ))
    }
}

impl AsRef<Vec<String>> for CertificateBundles {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(duration))
    }
}

impl AsRef<Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &Duration {
        &self.0
    }
}

impl TryFrom<String> for TokenLifetime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let duration = duration_str::parse(&value)
            .map_err(|e| ConfigError::DurationParsingFailed(value, e.to_string()))?;
        Ok(Self(chrono::Duration::from_std(duration)?))
    }
}

impl AsRef<chrono::Duration> for TokenLifetime {
    fn as_ref(&self) -> &chrono::Duration {
        &self.0
    }
}

impl TryFrom<String> for ExternalBase {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim_end_matches('/').to_string();
        Url::parse(&trimmed)
            .map_err(|e| ConfigError::InvalidUrl("EXTERNAL_BASE".to_string(), e.to_string()))?;
        Ok(Self(trimmed))
    }
}

impl AsRef<str> for ExternalBase {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<Option<String>> for SelfIssuedTokenSecret {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        if let Some(secret) = &value {
            check_length(secret)?;
        }
        Ok(Self(value))
    }
}

impl AsRef<Option<String>> for SelfIssuedTokenSecret {
    fn as_ref(&self) -> &Option<String> {
        &self.0
    }
}

impl std::fmt::Debug for SelfIssuedTokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(_) => f.write_str("SelfIssuedTokenSecret([redacted])"),
            None => f.write_str("SelfIssuedTokenSecret(None)"),
        }
    }
}

impl TryFrom<&str> for IdentityVerifierConfig {
    type Error = ConfigError;

    /// Parse `name|issuer|audience[|jwks_url]`.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let invalid = |reason: &str| ConfigError::VerifierParsingFailed(value.to_string(), reason.to_string());

        let parts: Vec<&str> = value.split('|').map(str::trim).collect();
        let (name, issuer, audience, jwks_url) = match parts.as_slice() {
            [name, issuer, audience] => (*name, *issuer, *audience, None),
            [name, issuer, audience, jwks_url] => (*name, *issuer, *audience, Some(*jwks_url)),
            _ => return Err(invalid("expected name|issuer|audience[|jwks_url]")),
        };
        if name.is_empty() || issuer.is_empty() || audience.is_empty() {
            return Err(invalid("name, issuer and audience must not be empty"));
        }

        let issuer = issuer.trim_end_matches('/');
        Url::parse(issuer).map_err(|e| invalid(&format!("issuer: {}", e)))?;

        let jwks_url = match jwks_url.filter(|url| !url.is_empty()) {
            Some(url) => {
                Url::parse(url).map_err(|e| invalid(&format!("jwks_url: {}", e)))?;
                url.to_string()
            }
            None => format!("{}/.well-known/jwks.json", issuer),
        };

        Ok(Self {
            name: name.to_string(),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            jwks_url,
        })
    }
}

impl TryFrom<Option<String>> for IdentityVerifiers {
    type Error = anyhow::Error;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        let value = value.unwrap_or_default();
        let verifiers = value
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(IdentityVerifierConfig::try_from)
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self(verifiers))
    }
}

impl AsRef<Vec<IdentityVerifierConfig>> for IdentityVerifiers {
    fn as_ref(&self) -> &Vec<IdentityVerifierConfig> {
        &self.0
    }
}

impl From<Option<String>> for CommaList {
    fn from(value: Option<String>) -> Self {
        Self(
            value
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl AsRef<Vec<String>> for CommaList {
    fn as_ref(&self) -> &Vec<String> {
        &self.0
    }
}

impl ProviderConfig {
    /// Read `{PREFIX}_CLIENT_ID`, `_CLIENT_SECRET` and `_ALLOWED_CALLBACK_URLS`.
    ///
    /// A provider is enabled when its client id is set.
    pub fn from_env(kind: ProviderKind, env: &Env<'_>) -> Result<Option<Self>> {
        let prefix = kind.env_prefix();
        let Some(client_id) = env.optional(&format!("{}_CLIENT_ID", prefix)) else {
            return Ok(None);
        };
        let client_secret = env
            .optional(&format!("{}_CLIENT_SECRET", prefix))
            .ok_or_else(|| {
                ConfigError::ProviderIncomplete(kind.to_string(), "client secret is not set".to_string())
            })?;
        let allowed_callback_urls: CommaList =
            env.optional(&format!("{}_ALLOWED_CALLBACK_URLS", prefix)).into();

        if allowed_callback_urls.as_ref().is_empty() {
            tracing::warn!(provider = %kind, "no allowed callback urls configured, every redirect will be denied");
        }

        Ok(Some(Self {
            kind,
            credentials: ClientCredentials {
                client_id,
                client_secret,
            },
            allowed_callback_urls: allowed_callback_urls.0,
        }))
    }
}

impl ProviderConfigs {
    pub fn from_env(env: &Env<'_>) -> Result<Self> {
        let mut configs = Vec::new();
        for kind in ProviderKind::ALL {
            if let Some(config) = ProviderConfig::from_env(kind, env)? {
                configs.push(config);
            }
        }
        Ok(Self(configs))
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&ProviderConfig> {
        self.0.iter().find(|config| config.kind == kind)
    }
}

impl AsRef<Vec<ProviderConfig>> for ProviderConfigs {
    fn as_ref(&self) -> &Vec<ProviderConfig> {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn config_from(values: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let lookup = move |name: &str| map.get(name).cloned();
        Config::from_env(&Env::new(&lookup))
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = config_from(&[
            ("EXTERNAL_BASE", "https://gateway.example.com/"),
            ("AUTHZ_SIGNING_SECRETS", SECRET),
        ])
        .unwrap();

        assert_eq!(config.external_base.as_ref(), "https://gateway.example.com");
        assert_eq!(*config.http_port.as_ref(), 8080);
        assert_eq!(*config.http_client_timeout.as_ref(), Duration::from_secs(10));
        assert_eq!(*config.authz_token_expiration.as_ref(), chrono::Duration::hours(24));
        assert_eq!(*config.id_token_ttl.as_ref(), chrono::Duration::seconds(20));
        assert_eq!(config.authz_token_audience, "authgate-api");
        assert_eq!(config.storage_backend, "memory");
        assert!(config.providers.as_ref().is_empty());
        assert!(config.self_issued_token_secret.as_ref().is_none());
        assert!(config.user_agent.starts_with("authgate/"));
    }

    #[test]
    fn test_required_and_unsafe_settings_fail() {
        assert!(config_from(&[("AUTHZ_SIGNING_SECRETS", SECRET)]).is_err());
        assert!(config_from(&[("EXTERNAL_BASE", "https://gateway.example.com")]).is_err());

        let weak = config_from(&[
            ("EXTERNAL_BASE", "https://gateway.example.com"),
            ("AUTHZ_SIGNING_SECRETS", "changeme"),
        ]);
        let error = weak.err().unwrap().to_string();
        assert!(error.starts_with("error-authgate-config-6"), "{}", error);

        let weak_self_issued = config_from(&[
            ("EXTERNAL_BASE", "https://gateway.example.com"),
            ("AUTHZ_SIGNING_SECRETS", SECRET),
            ("SELF_ISSUED_TOKEN_SECRET", "short"),
        ]);
        assert!(weak_self_issued.is_err());
    }

    #[test]
    fn test_provider_configs() {
        let config = config_from(&[
            ("EXTERNAL_BASE", "https://gateway.example.com"),
            ("AUTHZ_SIGNING_SECRETS", SECRET),
            ("GITHUB_CLIENT_ID", "gh-client"),
            ("GITHUB_CLIENT_SECRET", "gh-secret"),
            (
                "GITHUB_ALLOWED_CALLBACK_URLS",
                "https://app.example.com, http://localhost:3000/callback",
            ),
        ])
        .unwrap();

        let github = config.providers.get(ProviderKind::Github).unwrap();
        assert_eq!(github.credentials.client_id, "gh-client");
        assert_eq!(
            github.allowed_callback_urls,
            vec!["https://app.example.com", "http://localhost:3000/callback"]
        );
        assert!(config.providers.get(ProviderKind::Google).is_none());

        let incomplete = config_from(&[
            ("EXTERNAL_BASE", "https://gateway.example.com"),
            ("AUTHZ_SIGNING_SECRETS", SECRET),
            ("GOOGLE_CLIENT_ID", "google-client"),
        ]);
        assert!(incomplete.is_err());
    }

    #[test]
    fn test_identity_verifiers() {
        let verifiers: IdentityVerifiers = Some(
            "google|https://cognito-idp.us-east-1.amazonaws.com/pool-a/|client-a; github|https://issuer.example.com|client-b|https://keys.example.com/jwks.json"
                .to_string(),
        )
        .try_into()
        .unwrap();

        let list = verifiers.as_ref();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list[0].jwks_url,
            "https://cognito-idp.us-east-1.amazonaws.com/pool-a/.well-known/jwks.json"
        );
        assert_eq!(list[0].issuer, "https://cognito-idp.us-east-1.amazonaws.com/pool-a");
        assert_eq!(list[1].jwks_url, "https://keys.example.com/jwks.json");

        for invalid in ["google|https://issuer", "a|not a url|aud", "|https://x.example.com|aud"] {
            assert!(IdentityVerifiers::try_from(Some(invalid.to_string())).is_err());
        }
    }
}
