//! In-memory user storage implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Mutex;

use crate::errors::StorageError;
use crate::storage::traits::{AccessChange, Result, ServerUser, UserStore};

/// In-memory implementation of user storage
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<String, ServerUser>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `change` to the stored user under the lock.
    fn modify(&self, user_id: &str, change: impl FnOnce(&mut ServerUser)) -> Result<ServerUser> {
        let mut users = self.lock()?;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| StorageError::NotFound(user_id.to_string()))?;
        change(user);
        Ok(user.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ServerUser>>> {
        self.users
            .lock()
            .map_err(|e| StorageError::QueryFailed(format!("Lock error: {}", e)))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<ServerUser>> {
        Ok(self.lock()?.get(user_id).cloned())
    }

    async fn create_user(&self, user: &ServerUser) -> Result<()> {
        match self.lock()?.entry(user.user_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists(user.user_id.clone())),
            Entry::Vacant(entry) => {
                entry.insert(user.clone());
                Ok(())
            }
        }
    }

    async fn update_display_name(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<ServerUser> {
        self.modify(user_id, |user| {
            user.display_name = display_name.map(str::to_string)
        })
    }

    async fn update_access(&self, user_id: &str, change: AccessChange) -> Result<ServerUser> {
        self.modify(user_id, |user| match change {
            AccessChange::Enabled(enabled) => user.enabled = enabled,
            AccessChange::DenyAuthBefore(cutoff) => user.deny_auth_before = cutoff,
        })
    }
}
