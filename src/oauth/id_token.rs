//! Short-lived HS256 identity tokens.
//!
//! Used by the Cognito bridge, where the token is signed with the client
//! secret Cognito was configured with and consumed immediately, and by the
//! direct GitHub and Twitter flows, which have no provider-issued id token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;
use crate::oauth::types::IdentityClaim;

/// Parameters for [`create_id_token`].
pub struct IdTokenParams<'a> {
    pub secret: &'a str,
    pub issuer: &'a str,
    pub audience: &'a str,
    pub claims: &'a IdentityClaim,
    pub ttl: Duration,
}

/// Claims carried by a minted identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub email: String,
    pub email_verified: bool,
    pub iat: i64,
    pub exp: i64,
}

impl IdTokenClaims {
    pub fn new(params: &IdTokenParams<'_>, now: DateTime<Utc>) -> Self {
        Self {
            iss: params.issuer.to_string(),
            aud: params.audience.to_string(),
            sub: params.claims.sub.clone(),
            email: params.claims.email.clone(),
            email_verified: params.claims.email_verified,
            iat: now.timestamp(),
            exp: (now + params.ttl).timestamp(),
        }
    }
}

/// Mint an identity token expiring `ttl` from now.
pub fn create_id_token(params: &IdTokenParams<'_>) -> Result<String, GatewayError> {
    create_id_token_at(params, Utc::now())
}

pub fn create_id_token_at(
    params: &IdTokenParams<'_>,
    now: DateTime<Utc>,
) -> Result<String, GatewayError> {
    let claims = IdTokenClaims::new(params, now);
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(params.secret.as_bytes()),
    )
    .map_err(|e| GatewayError::Unexpected(format!("id token encode: {}", e)))
}
