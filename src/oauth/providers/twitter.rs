//! Twitter (X) OAuth 1.0a three-legged flow.
//!
//! 1. `POST oauth/request_token` signed with the consumer secret.
//! 2. Browser goes to `oauth/authenticate?oauth_token=...`.
//! 3. `POST oauth/access_token` with the returned `oauth_verifier`.
//! 4. `GET account/verify_credentials` signed with consumer and token secrets.
//!
//! The request-token secret from step 1 is not kept between requests, so step 3
//! is signed with the consumer secret alone, which Twitter accepts.

use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

use super::oauth1::SignedRequest;
use super::{parse_endpoint, read_body, read_json};
use crate::errors::{DenialError, GatewayError, UpstreamError};
use crate::oauth::types::{ClientCredentials, IdentityClaim, ProviderKind};

const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Host used for synthesized addresses when the account exposes no email.
const TWITTER_EMAIL_HOST: &str = "twitter.com";

/// Temporary credentials from `oauth/request_token`.
#[derive(Debug, Clone)]
pub struct TwitterRequestToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
}

/// User credentials from `oauth/access_token`.
#[derive(Clone)]
pub struct TwitterAccessToken {
    pub oauth_token: String,
    pub oauth_token_secret: String,
    pub user_id: Option<String>,
    pub screen_name: Option<String>,
}

/// Subset of `account/verify_credentials`.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterAccount {
    pub id: u64,
    pub screen_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl TwitterAccount {
    /// Normalize, synthesizing an unverified noreply address when no email is shared.
    pub fn to_identity_claim(&self) -> IdentityClaim {
        match self.email.as_deref().filter(|email| !email.is_empty()) {
            Some(email) => IdentityClaim {
                sub: self.id.to_string(),
                email: email.to_string(),
                email_verified: true,
            },
            None => IdentityClaim {
                sub: self.id.to_string(),
                email: format!("{}@noreply.{}", self.id, TWITTER_EMAIL_HOST),
                email_verified: false,
            },
        }
    }
}

pub struct TwitterAdapter {
    http_client: reqwest::Client,
    api_base: String,
}

impl TwitterAdapter {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_endpoints(http_client, TWITTER_API_BASE)
    }

    pub fn with_endpoints(http_client: reqwest::Client, api_base: &str) -> Self {
        Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Step 1: obtain a request token bound to `callback_url`.
    pub async fn request_token(
        &self,
        consumer: &ClientCredentials,
        callback_url: &str,
    ) -> Result<TwitterRequestToken, GatewayError> {
        let url = format!("{}/oauth/request_token", self.api_base);
        let header = SignedRequest {
            method: "POST",
            url: &url,
            consumer_key: &consumer.client_id,
            consumer_secret: &consumer.client_secret,
            oauth_extra: vec![("oauth_callback", callback_url)],
            ..Default::default()
        }
        .authorization_header()?;

        let body = read_body(
            ProviderKind::Twitter,
            "request_token",
            self.http_client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, header)
                .send()
                .await,
        )
        .await?;

        let mut fields = parse_form(&body);
        if fields.get("oauth_callback_confirmed").map(String::as_str) != Some("true") {
            return Err(malformed("request_token", "oauth_callback_confirmed is not true").into());
        }

        Ok(TwitterRequestToken {
            oauth_token: take_field(&mut fields, "request_token", "oauth_token")?,
            oauth_token_secret: take_field(&mut fields, "request_token", "oauth_token_secret")?,
        })
    }

    /// Step 2: consent screen for a request token.
    pub fn authenticate_url(&self, request_token: &TwitterRequestToken) -> Result<Url, GatewayError> {
        let mut url = parse_endpoint(&format!("{}/oauth/authenticate", self.api_base))?;
        url.query_pairs_mut()
            .append_pair("oauth_token", &request_token.oauth_token);
        Ok(url)
    }

    /// Step 3: trade the callback's token and verifier for user credentials.
    pub async fn access_token(
        &self,
        consumer: &ClientCredentials,
        oauth_token: &str,
        oauth_verifier: &str,
    ) -> Result<TwitterAccessToken, GatewayError> {
        let url = format!("{}/oauth/access_token", self.api_base);
        let header = SignedRequest {
            method: "POST",
            url: &url,
            consumer_key: &consumer.client_id,
            consumer_secret: &consumer.client_secret,
            token: Some(oauth_token),
            oauth_extra: vec![("oauth_verifier", oauth_verifier)],
            ..Default::default()
        }
        .authorization_header()?;

        let body = read_body(
            ProviderKind::Twitter,
            "access_token",
            self.http_client
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, header)
                .send()
                .await,
        )
        .await?;

        let mut fields = parse_form(&body);
        Ok(TwitterAccessToken {
            oauth_token: take_field(&mut fields, "access_token", "oauth_token")?,
            oauth_token_secret: take_field(&mut fields, "access_token", "oauth_token_secret")?,
            user_id: fields.remove("user_id"),
            screen_name: fields.remove("screen_name"),
        })
    }

    /// Step 4: fetch the account behind the user credentials.
    pub async fn verify_credentials(
        &self,
        consumer: &ClientCredentials,
        access_token: &TwitterAccessToken,
    ) -> Result<TwitterAccount, GatewayError> {
        let url = format!("{}/1.1/account/verify_credentials.json", self.api_base);
        let query = [("include_email", "true"), ("skip_status", "true")];
        let header = SignedRequest {
            method: "GET",
            url: &url,
            consumer_key: &consumer.client_id,
            consumer_secret: &consumer.client_secret,
            token: Some(&access_token.oauth_token),
            token_secret: Some(&access_token.oauth_token_secret),
            request_params: query.to_vec(),
            ..Default::default()
        }
        .authorization_header()?;

        let account: TwitterAccount = read_json(
            ProviderKind::Twitter,
            "verify_credentials",
            self.http_client
                .get(&url)
                .query(&query)
                .header(reqwest::header::AUTHORIZATION, header)
                .send()
                .await,
        )
        .await?;

        tracing::debug!(twitter_id = account.id, screen_name = %account.screen_name, "twitter identity resolved");
        Ok(account)
    }

    /// Steps 3 and 4 for a callback carrying `oauth_token` and `oauth_verifier`.
    pub async fn map_to_identity_claim(
        &self,
        consumer: &ClientCredentials,
        oauth_token: &str,
        oauth_verifier: &str,
    ) -> Result<IdentityClaim, GatewayError> {
        if oauth_token.is_empty() || oauth_verifier.is_empty() {
            return Err(DenialError::MalformedRequest(
                "oauth_token and oauth_verifier are required".to_string(),
            )
            .into());
        }
        let access_token = self.access_token(consumer, oauth_token, oauth_verifier).await?;
        let account = self.verify_credentials(consumer, &access_token).await?;
        Ok(account.to_identity_claim())
    }
}

fn parse_form(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.trim().as_bytes())
        .into_owned()
        .collect()
}

fn take_field(
    fields: &mut HashMap<String, String>,
    step: &'static str,
    name: &str,
) -> Result<String, UpstreamError> {
    fields
        .remove(name)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| malformed(step, &format!("missing {}", name)))
}

fn malformed(step: &'static str, reason: &str) -> UpstreamError {
    UpstreamError::MalformedResponse {
        provider: ProviderKind::Twitter.to_string(),
        step,
        reason: reason.to_string(),
    }
}
