//! Standard OAuth2/OIDC authorization-code adapters: Google, Facebook and AAF.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use url::Url;

use super::{ProviderAdapter, parse_endpoint, read_json};
use crate::errors::{DenialError, GatewayError};
use crate::oauth::types::{ClientCredentials, IdentityClaim, ProviderKind, ProviderTokenResponse};

const GOOGLE_AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_ENDPOINT: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const FACEBOOK_AUTHORIZE_ENDPOINT: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const FACEBOOK_TOKEN_ENDPOINT: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
const FACEBOOK_USERINFO_ENDPOINT: &str = "https://graph.facebook.com/me?fields=id,email";

const AAF_AUTHORIZE_ENDPOINT: &str = "https://central.aaf.edu.au/oidc/authorize";
const AAF_TOKEN_ENDPOINT: &str = "https://central.aaf.edu.au/oidc/token";
const AAF_USERINFO_ENDPOINT: &str = "https://central.aaf.edu.au/oidc/userinfo";

/// Scopes Google must grant, compared case-insensitively and in any order.
pub const GOOGLE_GRANTED_SCOPES: &[&str] =
    &["openid", "https://www.googleapis.com/auth/userinfo.email"];

/// Endpoints of an OIDC-style provider.
#[derive(Debug, Clone)]
pub struct OidcEndpoints {
    pub authorize: String,
    pub token: String,
    pub userinfo: String,
}

/// How the granted `scope` of a token response is checked.
#[derive(Debug, Clone, Copy)]
pub enum ScopePolicy {
    /// `scope` must be present and equal this set.
    Exact(&'static [&'static str]),
    /// `scope` is optional and not inspected.
    Unchecked,
}

/// Shape of the provider's profile endpoint.
#[derive(Debug, Clone, Copy)]
pub enum UserinfoShape {
    /// OIDC userinfo: `{sub, email, email_verified?}`
    Oidc,
    /// Facebook Graph `/me`: `{id, email}`
    FacebookGraph,
}

/// Token endpoint schema shared by Google, Facebook and AAF.
#[derive(Debug, Deserialize)]
struct OidcTokenResponse {
    access_token: String,
    #[allow(dead_code)]
    expires_in: u64,
    token_type: String,
    id_token: String,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OidcUserinfo {
    sub: String,
    email: String,
    #[serde(default)]
    email_verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct FacebookProfile {
    id: String,
    email: String,
}

/// Authorization-code adapter for a standard OAuth2/OIDC provider.
pub struct OidcAdapter {
    kind: ProviderKind,
    http_client: reqwest::Client,
    endpoints: OidcEndpoints,
    requested_scope: &'static str,
    scope_policy: ScopePolicy,
    userinfo_shape: UserinfoShape,
}

impl OidcAdapter {
    pub fn with_endpoints(
        kind: ProviderKind,
        http_client: reqwest::Client,
        endpoints: OidcEndpoints,
        requested_scope: &'static str,
        scope_policy: ScopePolicy,
        userinfo_shape: UserinfoShape,
    ) -> Self {
        Self {
            kind,
            http_client,
            endpoints,
            requested_scope,
            scope_policy,
            userinfo_shape,
        }
    }

    pub fn google(http_client: reqwest::Client) -> Self {
        Self::google_with_endpoints(
            http_client,
            OidcEndpoints {
                authorize: GOOGLE_AUTHORIZE_ENDPOINT.to_string(),
                token: GOOGLE_TOKEN_ENDPOINT.to_string(),
                userinfo: GOOGLE_USERINFO_ENDPOINT.to_string(),
            },
        )
    }

    pub fn google_with_endpoints(http_client: reqwest::Client, endpoints: OidcEndpoints) -> Self {
        Self::with_endpoints(
            ProviderKind::Google,
            http_client,
            endpoints,
            "openid email",
            ScopePolicy::Exact(GOOGLE_GRANTED_SCOPES),
            UserinfoShape::Oidc,
        )
    }

    pub fn facebook(http_client: reqwest::Client) -> Self {
        Self::facebook_with_endpoints(
            http_client,
            OidcEndpoints {
                authorize: FACEBOOK_AUTHORIZE_ENDPOINT.to_string(),
                token: FACEBOOK_TOKEN_ENDPOINT.to_string(),
                userinfo: FACEBOOK_USERINFO_ENDPOINT.to_string(),
            },
        )
    }

    pub fn facebook_with_endpoints(http_client: reqwest::Client, endpoints: OidcEndpoints) -> Self {
        Self::with_endpoints(
            ProviderKind::Facebook,
            http_client,
            endpoints,
            "openid email",
            ScopePolicy::Unchecked,
            UserinfoShape::FacebookGraph,
        )
    }

    pub fn aaf(http_client: reqwest::Client) -> Self {
        Self::aaf_with_endpoints(
            http_client,
            OidcEndpoints {
                authorize: AAF_AUTHORIZE_ENDPOINT.to_string(),
                token: AAF_TOKEN_ENDPOINT.to_string(),
                userinfo: AAF_USERINFO_ENDPOINT.to_string(),
            },
        )
    }

    pub fn aaf_with_endpoints(http_client: reqwest::Client, endpoints: OidcEndpoints) -> Self {
        Self::with_endpoints(
            ProviderKind::Aaf,
            http_client,
            endpoints,
            "openid email profile",
            ScopePolicy::Unchecked,
            UserinfoShape::Oidc,
        )
    }

    fn check_scope(&self, scope: Option<&str>) -> Result<(), DenialError> {
        let ScopePolicy::Exact(expected) = self.scope_policy else {
            return Ok(());
        };

        let scope = scope.ok_or_else(|| DenialError::ScopeMismatch {
            provider: self.kind.to_string(),
            scope: "<missing>".to_string(),
        })?;

        let granted: BTreeSet<String> = scope
            .split_whitespace()
            .map(|value| value.to_ascii_lowercase())
            .collect();
        let expected: BTreeSet<String> = expected
            .iter()
            .map(|value| value.to_ascii_lowercase())
            .collect();

        if granted == expected {
            Ok(())
        } else {
            Err(DenialError::ScopeMismatch {
                provider: self.kind.to_string(),
                scope: scope.to_string(),
            })
        }
    }
}

#[async_trait]
impl ProviderAdapter for OidcAdapter {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<Url, GatewayError> {
        let mut url = parse_endpoint(&self.endpoints.authorize)?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", self.requested_scope)
            .append_pair("state", state);
        Ok(url)
    }

    async fn exchange_code_for_token(
        &self,
        code: &str,
        credentials: &ClientCredentials,
        redirect_uri: &str,
    ) -> Result<ProviderTokenResponse, GatewayError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ];

        let response: OidcTokenResponse = read_json(
            self.kind,
            "token",
            self.http_client
                .post(&self.endpoints.token)
                .header(reqwest::header::ACCEPT, "application/json")
                .form(&form)
                .send()
                .await,
        )
        .await?;

        self.check_scope(response.scope.as_deref())?;

        tracing::debug!(provider = %self.kind, "authorization code exchanged");

        Ok(ProviderTokenResponse {
            access_token: response.access_token,
            token_type: response.token_type,
            scope: response.scope,
            id_token: Some(response.id_token),
        })
    }

    async fn map_to_identity_claim(&self, access_token: &str) -> Result<IdentityClaim, GatewayError> {
        let request = self
            .http_client
            .get(&self.endpoints.userinfo)
            .header(reqwest::header::ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await;

        match self.userinfo_shape {
            UserinfoShape::Oidc => {
                let userinfo: OidcUserinfo = read_json(self.kind, "userinfo", request).await?;
                Ok(IdentityClaim {
                    sub: userinfo.sub,
                    email: userinfo.email,
                    email_verified: userinfo.email_verified.unwrap_or(false),
                })
            }
            UserinfoShape::FacebookGraph => {
                let profile: FacebookProfile = read_json(self.kind, "userinfo", request).await?;
                // Graph only exposes confirmed addresses.
                Ok(IdentityClaim {
                    sub: profile.id,
                    email: profile.email,
                    email_verified: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_scope_exact_and_case_insensitive() {
        let adapter = OidcAdapter::google(reqwest::Client::new());
        assert!(
            adapter
                .check_scope(Some("openid https://www.googleapis.com/auth/userinfo.email"))
                .is_ok()
        );
        assert!(
            adapter
                .check_scope(Some("https://www.googleapis.com/auth/userinfo.email OPENID"))
                .is_ok()
        );
    }

    #[test]
    fn test_google_scope_rejects_extra_missing_or_absent() {
        let adapter = OidcAdapter::google(reqwest::Client::new());
        for scope in [
            Some("openid"),
            Some("openid https://www.googleapis.com/auth/userinfo.email profile"),
            Some(""),
            None,
        ] {
            assert!(
                matches!(
                    adapter.check_scope(scope),
                    Err(DenialError::ScopeMismatch { .. })
                ),
                "{:?} should be rejected",
                scope
            );
        }
    }

    #[test]
    fn test_facebook_and_aaf_scope_optional() {
        let facebook = OidcAdapter::facebook(reqwest::Client::new());
        let aaf = OidcAdapter::aaf(reqwest::Client::new());
        assert!(facebook.check_scope(None).is_ok());
        assert!(aaf.check_scope(Some("openid anything")).is_ok());
    }

    #[test]
    fn test_authorization_url() {
        let adapter = OidcAdapter::google(reqwest::Client::new());
        let url = adapter
            .authorization_url(
                "client-1",
                "https://gateway.example.com/oauth/google/idpresponse",
                "c3RhdGU",
            )
            .unwrap();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "client-1".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("scope".to_string(), "openid email".to_string())));
        assert!(pairs.contains(&("state".to_string(), "c3RhdGU".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "https://gateway.example.com/oauth/google/idpresponse".to_string()
        )));
    }

    #[test]
    fn test_token_response_schema_requires_id_token() {
        let missing = r#"{"access_token":"a","expires_in":3600,"token_type":"Bearer"}"#;
        assert!(serde_json::from_str::<OidcTokenResponse>(missing).is_err());

        let mistyped =
            r#"{"access_token":"a","expires_in":"soon","token_type":"Bearer","id_token":"x"}"#;
        assert!(serde_json::from_str::<OidcTokenResponse>(mistyped).is_err());

        let complete = r#"{"access_token":"a","expires_in":3600,"token_type":"Bearer","id_token":"x","refresh_token":"r"}"#;
        let parsed = serde_json::from_str::<OidcTokenResponse>(complete).unwrap();
        assert!(parsed.scope.is_none());
    }
}
