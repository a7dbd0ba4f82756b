//! GitHub OAuth app adapter.
//!
//! GitHub is not an OIDC provider: the token response has no `id_token`, the
//! granted scope is comma-separated and `openid` is stripped, and the subject
//! and email have to be assembled from `/user` and `/user/emails`.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use url::Url;

use super::{ProviderAdapter, parse_endpoint, read_body, read_json};
use crate::errors::{DenialError, GatewayError, UpstreamError};
use crate::oauth::types::{ClientCredentials, IdentityClaim, ProviderKind, ProviderTokenResponse};

const GITHUB_OAUTH_BASE: &str = "https://github.com";
const GITHUB_API_BASE: &str = "https://api.github.com";

/// Scope requested on the consent screen.
pub const GITHUB_REQUESTED_SCOPE: &str = "read:user user:email";

/// Scopes GitHub must grant, in any order.
const GITHUB_GRANTED_SCOPES: [&str; 2] = ["read:user", "user:email"];

const NOREPLY_SUFFIX: &str = "noreply.github.com";

#[derive(Debug, Deserialize)]
struct GithubTokenResponse {
    access_token: String,
    token_type: String,
    scope: String,
}

#[derive(Debug, Deserialize)]
struct GithubTokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
}

/// One entry of `GET /user/emails`.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

pub struct GithubAdapter {
    http_client: reqwest::Client,
    oauth_base: String,
    api_base: String,
}

impl GithubAdapter {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_endpoints(http_client, GITHUB_OAUTH_BASE, GITHUB_API_BASE)
    }

    pub fn with_endpoints(http_client: reqwest::Client, oauth_base: &str, api_base: &str) -> Self {
        Self {
            http_client,
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GithubUser, UpstreamError> {
        read_json(
            ProviderKind::Github,
            "user",
            self.http_client
                .get(format!("{}/user", self.api_base))
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .bearer_auth(access_token)
                .send()
                .await,
        )
        .await
    }

    async fn fetch_emails(&self, access_token: &str) -> Result<Vec<GithubEmail>, UpstreamError> {
        read_json(
            ProviderKind::Github,
            "emails",
            self.http_client
                .get(format!("{}/user/emails", self.api_base))
                .header(reqwest::header::ACCEPT, "application/vnd.github+json")
                .bearer_auth(access_token)
                .send()
                .await,
        )
        .await
    }
}

/// Translate GitHub's comma-separated grant into an OIDC scope string.
///
/// The grant must be exactly `read:user` and `user:email`; `openid` is
/// injected since GitHub strips it.
pub fn normalize_scope(scope: &str) -> Result<String, DenialError> {
    let granted: BTreeSet<&str> = scope
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();
    let expected: BTreeSet<&str> = GITHUB_GRANTED_SCOPES.into_iter().collect();

    if granted != expected {
        return Err(DenialError::ScopeMismatch {
            provider: ProviderKind::Github.to_string(),
            scope: scope.to_string(),
        });
    }

    Ok(format!("openid {}", GITHUB_GRANTED_SCOPES.join(" ")))
}

/// Pick the primary, verified, non-noreply address. Fails closed.
pub fn select_email(emails: &[GithubEmail]) -> Result<&GithubEmail, DenialError> {
    emails
        .iter()
        .find(|entry| entry.primary && entry.verified && !entry.email.ends_with(NOREPLY_SUFFIX))
        .ok_or_else(|| DenialError::EmailNotUsable {
            provider: ProviderKind::Github.to_string(),
            reason: format!(
                "none of {} addresses is primary, verified and not a noreply address",
                emails.len()
            ),
        })
}

#[async_trait]
impl ProviderAdapter for GithubAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Github
    }

    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<Url, GatewayError> {
        let mut url = parse_endpoint(&format!("{}/login/oauth/authorize", self.oauth_base))?;
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("scope", GITHUB_REQUESTED_SCOPE)
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
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ];

        let body = read_body(
            ProviderKind::Github,
            "token",
            self.http_client
                .post(format!("{}/login/oauth/access_token", self.oauth_base))
                .header(reqwest::header::ACCEPT, "application/json")
                .form(&form)
                .send()
                .await,
        )
        .await?;

        // GitHub reports a bad code with a 200 and an error object.
        let response: GithubTokenResponse = match serde_json::from_str(&body) {
            Ok(response) => response,
            Err(parse_error) => {
                let reason = match serde_json::from_str::<GithubTokenError>(&body) {
                    Ok(error) => format!(
                        "{}: {}",
                        error.error,
                        error.error_description.unwrap_or_default()
                    ),
                    Err(_) => parse_error.to_string(),
                };
                return Err(UpstreamError::MalformedResponse {
                    provider: ProviderKind::Github.to_string(),
                    step: "token",
                    reason,
                }
                .into());
            }
        };

        let scope = normalize_scope(&response.scope)?;

        Ok(ProviderTokenResponse {
            access_token: response.access_token,
            token_type: response.token_type,
            scope: Some(scope),
            id_token: None,
        })
    }

    async fn map_to_identity_claim(&self, access_token: &str) -> Result<IdentityClaim, GatewayError> {
        let user = self.fetch_user(access_token).await?;
        let emails = self.fetch_emails(access_token).await?;
        let selected = select_email(&emails)?;

        tracing::debug!(github_id = user.id, "github identity resolved");

        Ok(IdentityClaim {
            sub: user.id.to_string(),
            email: selected.email.clone(),
            email_verified: selected.verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(address: &str, primary: bool, verified: bool) -> GithubEmail {
        GithubEmail {
            email: address.to_string(),
            primary,
            verified,
        }
    }

    #[test]
    fn test_normalize_scope() {
        assert_eq!(
            normalize_scope("read:user,user:email").unwrap(),
            "openid read:user user:email"
        );
        assert_eq!(
            normalize_scope("user:email, read:user").unwrap(),
            "openid read:user user:email"
        );
    }

    #[test]
    fn test_normalize_scope_rejects_other_grants() {
        for scope in [
            "",
            "read:user",
            "read:user,user:email,repo",
            "read:user user:email",
            "openid,read:user,user:email",
        ] {
            assert!(
                matches!(
                    normalize_scope(scope),
                    Err(DenialError::ScopeMismatch { .. })
                ),
                "{:?} should be rejected",
                scope
            );
        }
    }

    #[test]
    fn test_select_email_primary_verified() {
        let emails = vec![
            email("secondary@b.com", false, true),
            email("unverified@b.com", true, false),
            email("a@b.com", true, true),
        ];
        assert_eq!(select_email(&emails).unwrap().email, "a@b.com");
    }

    #[test]
    fn test_select_email_rejects_noreply_only() {
        let emails = vec![
            email("12345+octocat@users.noreply.github.com", true, true),
            email("other@b.com", false, true),
        ];
        assert!(matches!(
            select_email(&emails),
            Err(DenialError::EmailNotUsable { .. })
        ));
        assert!(select_email(&[]).is_err());
    }

    #[test]
    fn test_authorization_url_uses_configured_base() {
        let adapter = GithubAdapter::with_endpoints(
            reqwest::Client::new(),
            "http://127.0.0.1:9000/",
            "http://127.0.0.1:9001",
        );
        let url = adapter
            .authorization_url("client-1", "https://gateway.example.com/cb", "abc")
            .unwrap();
        assert_eq!(url.path(), "/login/oauth/authorize");
        assert_eq!(url.port(), Some(9000));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("scope".to_string(), GITHUB_REQUESTED_SCOPE.to_string())));
    }
}
