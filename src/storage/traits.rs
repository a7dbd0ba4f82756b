//! Storage trait definitions for gateway users.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;

/// A local user record, keyed by the provider subject.
///
/// `user_id` and `created` never change after creation. Self-service updates
/// touch display fields only; `enabled` and `deny_auth_before` are changed by
/// operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerUser {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_auth_before: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

impl ServerUser {
    /// A freshly signed-up, enabled user.
    pub fn new(user_id: &str, email: &str, created: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            display_name: None,
            enabled: true,
            deny_auth_before: None,
            created,
        }
    }
}

/// An operator change to one access field of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessChange {
    Enabled(bool),
    DenyAuthBefore(Option<DateTime<Utc>>),
}

/// Trait for storing and retrieving users
///
/// Updates write only the fields they name, so a self-service update never
/// carries a stale `enabled` or `deny_auth_before` back into the store.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Retrieve a user by ID
    async fn get_user(&self, user_id: &str) -> Result<Option<ServerUser>>;

    /// Store a new user, failing with [`StorageError::AlreadyExists`] on a duplicate ID
    async fn create_user(&self, user: &ServerUser) -> Result<()>;

    /// Set the display name and return the stored user
    async fn update_display_name(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<ServerUser>;

    /// Apply an operator access change and return the stored user
    async fn update_access(&self, user_id: &str, change: AccessChange) -> Result<ServerUser>;
}
