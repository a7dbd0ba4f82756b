//! Access-token claims and HS256 mint/verify against a single secret.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::errors::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

/// Application payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzTokenPayload {
    pub user_id: String,
    pub email: String,
    pub user_created: DateTime<Utc>,
    pub role: Role,
}

/// Payload plus registered JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthzTokenClaims {
    #[serde(flatten)]
    pub payload: AuthzTokenPayload,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Mints and verifies access tokens for one issuer and audience.
#[derive(Debug, Clone)]
pub struct AuthzTokenCodec {
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl AuthzTokenCodec {
    pub fn new(issuer: &str, audience: &str, lifetime: Duration) -> Self {
        Self {
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            lifetime,
        }
    }

    pub fn mint(
        &self,
        payload: AuthzTokenPayload,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<String, GatewayError> {
        let claims = AuthzTokenClaims {
            payload,
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| GatewayError::Unexpected(format!("access token encode: {}", e)))
    }

    /// Check signature, expiry, issuer, audience and payload shape.
    pub fn verify(
        &self,
        token: &str,
        secret: &str,
    ) -> Result<AuthzTokenClaims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.leeway = 5;

        decode::<AuthzTokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map(|data| data.claims)
    }
}
