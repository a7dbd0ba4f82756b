//! Identity-token verifiers, selected by the token's `aud` claim.

use async_trait::async_trait;
use base64::prelude::*;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::errors::{DenialError, GatewayError, UpstreamError};

/// Verified identity-token payload.
pub type IdentityClaims = Map<String, Value>;

/// Verifies identity tokens for one audience.
#[async_trait]
pub trait IdentityTokenVerifier: Send + Sync {
    /// Label used in diagnostics.
    fn name(&self) -> &str;

    fn audience(&self) -> &str;

    /// Check signature, issuer, audience and expiry.
    async fn verify(&self, token: &str) -> Result<IdentityClaims, GatewayError>;
}

fn validation(algorithm: Algorithm, issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.set_required_spec_claims(&["exp", "iss", "aud"]);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation
}

/// RS256 verifier backed by a JWKS document, such as a Cognito user pool.
///
/// The key set is fetched on first use and kept for the process lifetime.
/// Concurrent first verifications share one fetch; a failed fetch is retried
/// by the next call.
pub struct JwksVerifier {
    name: String,
    issuer: String,
    audience: String,
    jwks_url: String,
    http_client: reqwest::Client,
    keys: OnceCell<JwkSet>,
}

impl JwksVerifier {
    pub fn new(
        name: &str,
        issuer: &str,
        audience: &str,
        jwks_url: &str,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.to_string(),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            jwks_url: jwks_url.to_string(),
            http_client,
            keys: OnceCell::new(),
        }
    }

    async fn keys(&self) -> Result<&JwkSet, UpstreamError> {
        self.keys
            .get_or_try_init(|| async {
                tracing::debug!(verifier = %self.name, url = %self.jwks_url, "fetching jwks");
                let response = self
                    .http_client
                    .get(&self.jwks_url)
                    .send()
                    .await
                    .map_err(|e| UpstreamError::Transport {
                        provider: self.name.clone(),
                        step: "jwks",
                        reason: e.to_string(),
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(UpstreamError::UnexpectedStatus {
                        provider: self.name.clone(),
                        step: "jwks",
                        status: status.as_u16(),
                        body: String::new(),
                    });
                }

                response
                    .json::<JwkSet>()
                    .await
                    .map_err(|e| UpstreamError::MalformedResponse {
                        provider: self.name.clone(),
                        step: "jwks",
                        reason: e.to_string(),
                    })
            })
            .await
    }

    fn rejected(&self, reason: impl ToString) -> GatewayError {
        DenialError::IdentityTokenRejected {
            verifier: self.name.clone(),
            reason: reason.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl IdentityTokenVerifier for JwksVerifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn audience(&self) -> &str {
        &self.audience
    }

    async fn verify(&self, token: &str) -> Result<IdentityClaims, GatewayError> {
        let header = decode_header(token).map_err(|e| self.rejected(e))?;
        if header.alg != Algorithm::RS256 {
            return Err(self.rejected(format!("unsupported algorithm {:?}", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| self.rejected("token header has no kid"))?;

        let keys = self.keys().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| self.rejected(format!("unknown kid {}", kid)))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| self.rejected(e))?;

        decode::<IdentityClaims>(
            token,
            &key,
            &validation(Algorithm::RS256, &self.issuer, &self.audience),
        )
        .map(|data| data.claims)
        .map_err(|e| self.rejected(e))
    }
}

/// HS256 verifier for identity tokens this gateway issues itself.
pub struct SharedSecretVerifier {
    name: String,
    issuer: String,
    audience: String,
    secret: String,
}

impl SharedSecretVerifier {
    pub fn new(name: &str, issuer: &str, audience: &str, secret: &str) -> Self {
        Self {
            name: name.to_string(),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            secret: secret.to_string(),
        }
    }
}

#[async_trait]
impl IdentityTokenVerifier for SharedSecretVerifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn audience(&self) -> &str {
        &self.audience
    }

    async fn verify(&self, token: &str) -> Result<IdentityClaims, GatewayError> {
        decode::<IdentityClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation(Algorithm::HS256, &self.issuer, &self.audience),
        )
        .map(|data| data.claims)
        .map_err(|e| {
            DenialError::IdentityTokenRejected {
                verifier: self.name.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Read the `aud` claim without checking the signature.
///
/// Only used to pick a verifier; nothing else from the unverified payload is trusted.
pub fn peek_audience(token: &str) -> Result<Vec<String>, DenialError> {
    let malformed = |reason: &str| DenialError::MalformedRequest(format!("identity token {}", reason));

    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed("is not a compact JWT"));
    };

    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| malformed("payload is not base64url"))?;
    let claims: Value =
        serde_json::from_slice(&bytes).map_err(|_| malformed("payload is not JSON"))?;

    match claims.get("aud") {
        Some(Value::String(audience)) => Ok(vec![audience.clone()]),
        Some(Value::Array(values)) => Ok(values
            .iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect()),
        _ => Err(malformed("has no aud claim")),
    }
}

/// Configured verifiers keyed by audience.
#[derive(Clone, Default)]
pub struct VerifierRegistry {
    by_audience: HashMap<String, Arc<dyn IdentityTokenVerifier>>,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, verifier: Arc<dyn IdentityTokenVerifier>) {
        tracing::info!(verifier = %verifier.name(), audience = %verifier.audience(), "identity verifier registered");
        self.by_audience
            .insert(verifier.audience().to_string(), verifier);
    }

    pub fn is_empty(&self) -> bool {
        self.by_audience.is_empty()
    }

    /// Pick the verifier for the token's audience.
    pub fn select(&self, token: &str) -> Result<Arc<dyn IdentityTokenVerifier>, DenialError> {
        let audiences = peek_audience(token)?;
        let selected = audiences
            .iter()
            .find_map(|audience| self.by_audience.get(audience))
            .cloned();
        selected.ok_or(DenialError::UnknownAudience(audiences))
    }
}
