//! Authorization-token engine: identity token in, access token out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::guard::access_guard;
use super::secrets::SigningSecretSet;
use super::token::{AuthzTokenCodec, AuthzTokenPayload, Role};
use super::verifier::{IdentityClaims, VerifierRegistry};
use crate::errors::{DenialError, GatewayError, PUBLIC_DENIAL_MESSAGE, StorageError};
use crate::storage::{ServerUser, UserStore};

/// Body of the authorization-token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzResponse {
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthzResponse {
    pub fn success(access_token: String) -> Self {
        Self {
            succeeded: true,
            access_token: Some(access_token),
            message: None,
        }
    }

    pub fn denied() -> Self {
        Self {
            succeeded: false,
            access_token: None,
            message: Some(PUBLIC_DENIAL_MESSAGE.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct AuthzEngine {
    verifiers: VerifierRegistry,
    user_store: Arc<dyn UserStore>,
    codec: AuthzTokenCodec,
    secrets: SigningSecretSet,
}

impl AuthzEngine {
    pub fn new(
        verifiers: VerifierRegistry,
        user_store: Arc<dyn UserStore>,
        codec: AuthzTokenCodec,
        secrets: SigningSecretSet,
    ) -> Self {
        Self {
            verifiers,
            user_store,
            codec,
            secrets,
        }
    }

    pub async fn authorize(&self, identity_token: &str) -> Result<String, GatewayError> {
        self.authorize_at(identity_token, Utc::now()).await
    }

    /// Verify an identity token, resolve or sign up its user, and mint an access token.
    pub async fn authorize_at(
        &self,
        identity_token: &str,
        now: DateTime<Utc>,
    ) -> Result<String, GatewayError> {
        let verifier = self.verifiers.select(identity_token)?;
        let claims = verifier.verify(identity_token).await?;

        let sub = required_claim(&claims, "sub")?;
        let email = required_claim(&claims, "email")?;

        let user = self.resolve_user(sub, email, now).await?;
        access_guard(&user, now)?;

        let access_token = self.codec.mint(
            AuthzTokenPayload {
                user_id: user.user_id.clone(),
                email: email.to_string(),
                user_created: user.created,
                role: Role::User,
            },
            self.secrets.current(),
            now,
        )?;

        tracing::info!(user_id = %user.user_id, verifier = %verifier.name(), "access token issued");
        Ok(access_token)
    }

    /// Look up the user, creating it on first sight.
    async fn resolve_user(
        &self,
        user_id: &str,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<ServerUser, GatewayError> {
        if let Some(user) = self.user_store.get_user(user_id).await? {
            return Ok(user);
        }

        let user = ServerUser::new(user_id, email, now);
        match self.user_store.create_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, "user signed up");
                Ok(user)
            }
            Err(StorageError::AlreadyExists(_)) => {
                // A concurrent first login won the insert.
                tracing::debug!(user_id = %user_id, "user created concurrently, re-reading");
                self.user_store
                    .get_user(user_id)
                    .await?
                    .ok_or_else(|| DenialError::UserNotFound(user_id.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn required_claim<'a>(claims: &'a IdentityClaims, name: &str) -> Result<&'a str, DenialError> {
    claims
        .get(name)
        .and_then(|value| value.as_str())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| DenialError::IdentityClaimMissing(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::verifier::SharedSecretVerifier;
    use crate::storage::{AccessChange, MemoryUserStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::{Value, json};

    const IDENTITY_SECRET: &str = "identity-secret-identity-secret-00";
    const SIGNING_SECRET: &str = "signing-secret-signing-secret-0000";
    const ISSUER: &str = "https://issuer.example.com";
    const AUDIENCE: &str = "google-pool";

    fn identity_token(claims: Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(IDENTITY_SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn claims(sub: Value, email: Value) -> Value {
        json!({
            "sub": sub,
            "email": email,
            "iss": ISSUER,
            "aud": AUDIENCE,
            "exp": (Utc::now() + Duration::minutes(5)).timestamp(),
        })
    }

    fn codec() -> AuthzTokenCodec {
        AuthzTokenCodec::new("https://gateway.example.com", "authgate-api", Duration::hours(24))
    }

    fn engine(store: Arc<dyn UserStore>) -> AuthzEngine {
        let mut verifiers = VerifierRegistry::new();
        verifiers.register(Arc::new(SharedSecretVerifier::new(
            "google", ISSUER, AUDIENCE, IDENTITY_SECRET,
        )));
        AuthzEngine::new(
            verifiers,
            store,
            codec(),
            SigningSecretSet::new(vec![SIGNING_SECRET.to_string()]).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_implicit_signup_and_mint() {
        let store = Arc::new(MemoryUserStore::new());
        let engine = engine(store.clone());

        let token = engine
            .authorize(&identity_token(claims(json!("u1"), json!("a@b.com"))))
            .await
            .unwrap();

        let user = store.get_user("u1").await.unwrap().unwrap();
        assert!(user.enabled);
        assert_eq!(user.email, "a@b.com");

        let decoded = codec().verify(&token, SIGNING_SECRET).unwrap();
        assert_eq!(decoded.payload.user_id, "u1");
        assert_eq!(decoded.payload.email, "a@b.com");
        assert_eq!(decoded.payload.role, Role::User);
        assert_eq!(decoded.payload.user_created, user.created);
    }

    #[tokio::test]
    async fn test_shape_validation() {
        let engine = engine(Arc::new(MemoryUserStore::new()));
        for (sub, email) in [
            (json!(null), json!("a@b.com")),
            (json!(42), json!("a@b.com")),
            (json!("u1"), json!(null)),
            (json!("u1"), json!("")),
        ] {
            assert!(matches!(
                engine.authorize(&identity_token(claims(sub, email))).await,
                Err(GatewayError::Denied(DenialError::IdentityClaimMissing(_)))
            ));
        }
    }

    #[tokio::test]
    async fn test_unknown_audience_and_bad_signature() {
        let engine = engine(Arc::new(MemoryUserStore::new()));

        let mut other = claims(json!("u1"), json!("a@b.com"));
        other["aud"] = json!("email-pool");
        assert!(matches!(
            engine.authorize(&identity_token(other)).await,
            Err(GatewayError::Denied(DenialError::UnknownAudience(_)))
        ));

        let forged = encode(
            &Header::new(Algorithm::HS256),
            &claims(json!("u1"), json!("a@b.com")),
            &EncodingKey::from_secret(b"forged-forged-forged-forged-forged"),
        )
        .unwrap();
        assert!(matches!(
            engine.authorize(&forged).await,
            Err(GatewayError::Denied(DenialError::IdentityTokenRejected { .. }))
        ));
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_mint() {
        let store = Arc::new(MemoryUserStore::new());
        let mut user = ServerUser::new("u1", "a@b.com", Utc::now());
        user.enabled = false;
        store.create_user(&user).await.unwrap();

        let engine = engine(store);
        assert!(matches!(
            engine
                .authorize(&identity_token(claims(json!("u1"), json!("a@b.com"))))
                .await,
            Err(GatewayError::Denied(DenialError::UserDisabled(_)))
        ));
    }

    /// Reports the user as absent once, then behaves like the inner store,
    /// reproducing a concurrent first login.
    struct RacingStore {
        inner: MemoryUserStore,
        winner: ServerUser,
    }

    #[async_trait]
    impl UserStore for RacingStore {
        async fn get_user(&self, user_id: &str) -> crate::storage::Result<Option<ServerUser>> {
            self.inner.get_user(user_id).await
        }

        async fn create_user(&self, user: &ServerUser) -> crate::storage::Result<()> {
            self.inner.create_user(&self.winner).await?;
            Err(StorageError::AlreadyExists(user.user_id.clone()))
        }

        async fn update_display_name(
            &self,
            user_id: &str,
            display_name: Option<&str>,
        ) -> crate::storage::Result<ServerUser> {
            self.inner.update_display_name(user_id, display_name).await
        }

        async fn update_access(
            &self,
            user_id: &str,
            change: AccessChange,
        ) -> crate::storage::Result<ServerUser> {
            self.inner.update_access(user_id, change).await
        }
    }

    #[tokio::test]
    async fn test_signup_race_uses_existing_record() {
        let winner = ServerUser::new("u1", "a@b.com", Utc::now() - Duration::seconds(1));
        let store = Arc::new(RacingStore {
            inner: MemoryUserStore::new(),
            winner: winner.clone(),
        });
        let engine = engine(store);

        let token = engine
            .authorize(&identity_token(claims(json!("u1"), json!("a@b.com"))))
            .await
            .unwrap();
        let decoded = codec().verify(&token, SIGNING_SECRET).unwrap();
        assert_eq!(decoded.payload.user_created, winner.created);
    }

    #[test]
    fn test_authz_response_shape() {
        let denied = serde_json::to_value(AuthzResponse::denied()).unwrap();
        assert_eq!(denied, json!({"succeeded": false, "message": "Access denied"}));
        let success = serde_json::to_value(AuthzResponse::success("t".to_string())).unwrap();
        assert_eq!(success, json!({"succeeded": true, "accessToken": "t"}));
    }
}
