//! Access-token guard run on every protected call.
//!
//! Token claims only identify the user. Enablement and `deny_auth_before` are
//! always re-read from the store, so disabling a user or moving the cutoff
//! takes effect for tokens that are already out.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::secrets::SigningSecretSet;
use super::token::{AuthzTokenClaims, AuthzTokenCodec};
use crate::errors::{DenialError, GatewayError};
use crate::storage::{ServerUser, UserStore};

/// A verified access token and the current record of its user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: AuthzTokenClaims,
    pub user: ServerUser,
}

#[derive(Clone)]
pub struct AuthzGuard {
    codec: AuthzTokenCodec,
    secrets: SigningSecretSet,
    user_store: Arc<dyn UserStore>,
}

impl AuthzGuard {
    pub fn new(
        codec: AuthzTokenCodec,
        secrets: SigningSecretSet,
        user_store: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            codec,
            secrets,
            user_store,
        }
    }

    /// Try every secret, newest first. The first valid result wins.
    pub fn verify_with_rotation(&self, token: &str) -> Result<AuthzTokenClaims, DenialError> {
        let mut failures = Vec::with_capacity(self.secrets.len());
        for (index, secret) in self.secrets.iter().enumerate() {
            match self.codec.verify(token, secret) {
                Ok(claims) => {
                    if index > 0 {
                        tracing::debug!(secret_index = index, "access token verified with rotated secret");
                    }
                    return Ok(claims);
                }
                Err(e) => failures.push(format!("secret[{}]: {}", index, e)),
            }
        }
        Err(DenialError::AccessTokenRejected(failures.join("; ")))
    }

    pub async fn guard_authz(&self, token: Option<&str>) -> Result<AuthenticatedUser, GatewayError> {
        self.guard_authz_at(token, Utc::now()).await
    }

    pub async fn guard_authz_at(
        &self,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedUser, GatewayError> {
        let token = token
            .filter(|value| !value.is_empty())
            .ok_or(DenialError::MissingToken)?;

        let claims = self.verify_with_rotation(token)?;

        let user = self
            .user_store
            .get_user(&claims.payload.user_id)
            .await?
            .ok_or_else(|| DenialError::UserNotFound(claims.payload.user_id.clone()))?;

        access_guard(&user, now)?;

        Ok(AuthenticatedUser { claims, user })
    }
}

/// Deny disabled users and users locked out until a time after `now`.
pub fn access_guard(user: &ServerUser, now: DateTime<Utc>) -> Result<(), DenialError> {
    if !user.enabled {
        return Err(DenialError::UserDisabled(user.user_id.clone()));
    }
    if let Some(deny_auth_before) = user.deny_auth_before {
        if deny_auth_before > now {
            return Err(DenialError::UserLockedOut {
                user_id: user.user_id.clone(),
                until: deny_auth_before.to_rfc3339(),
            });
        }
    }
    Ok(())
}

/// The user a request targets must be the authenticated user.
pub fn cross_account_guard(authenticated: &ServerUser, requested_user_id: &str) -> Result<(), DenialError> {
    if authenticated.user_id != requested_user_id {
        return Err(DenialError::CrossAccount {
            authenticated: authenticated.user_id.clone(),
            requested: requested_user_id.to_string(),
        });
    }
    Ok(())
}
