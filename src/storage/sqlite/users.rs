//! SQLite implementation for user storage

use async_trait::async_trait;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};

use crate::errors::StorageError;
use crate::storage::traits::{AccessChange, Result, ServerUser, UserStore};

/// SQLite implementation of user storage
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// Create a new SQLite user store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `database_url` and migrate it.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = database_url
            .parse::<SqliteConnectOptions>()
            .map_err(|e| StorageError::ConnectionFailed(format!("sqlite url: {}", e)))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(format!("sqlite: {}", e)))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations/sqlite")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::DatabaseError(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    fn updated_row(
        user_id: &str,
        row: std::result::Result<Option<SqliteRow>, sqlx::Error>,
    ) -> Result<ServerUser> {
        let row = row.map_err(|e| StorageError::DatabaseError(e.to_string()))?;
        let row = row.ok_or_else(|| StorageError::NotFound(user_id.to_string()))?;
        Self::row_to_user(&row)
    }

    fn row_to_user(row: &SqliteRow) -> Result<ServerUser> {
        Ok(ServerUser {
            user_id: row
                .try_get("user_id")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get user_id: {}", e)))?,
            email: row
                .try_get("email")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get email: {}", e)))?,
            display_name: row.try_get("display_name").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get display_name: {}", e))
            })?,
            enabled: row
                .try_get("enabled")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get enabled: {}", e)))?,
            deny_auth_before: row.try_get("deny_auth_before").map_err(|e| {
                StorageError::DatabaseError(format!("Failed to get deny_auth_before: {}", e))
            })?,
            created: row
                .try_get("created")
                .map_err(|e| StorageError::DatabaseError(format!("Failed to get created: {}", e)))?,
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<ServerUser>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, email, display_name, enabled, deny_auth_before, created
            FROM server_users WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn create_user(&self, user: &ServerUser) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO server_users (
                user_id, email, display_name, enabled, deny_auth_before, created
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.enabled)
        .bind(user.deny_auth_before)
        .bind(user.created)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::AlreadyExists(user.user_id.clone()));
        }
        Ok(())
    }

    async fn update_display_name(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<ServerUser> {
        let row = sqlx::query(
            r#"
            UPDATE server_users SET display_name = ? WHERE user_id = ?
            RETURNING user_id, email, display_name, enabled, deny_auth_before, created
            "#,
        )
        .bind(display_name)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        Self::updated_row(user_id, row)
    }

    async fn update_access(&self, user_id: &str, change: AccessChange) -> Result<ServerUser> {
        let row = match change {
            AccessChange::Enabled(enabled) => {
                sqlx::query(
                    r#"
                    UPDATE server_users SET enabled = ? WHERE user_id = ?
                    RETURNING user_id, email, display_name, enabled, deny_auth_before, created
                    "#,
                )
                .bind(enabled)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
            }
            AccessChange::DenyAuthBefore(cutoff) => {
                sqlx::query(
                    r#"
                    UPDATE server_users SET deny_auth_before = ? WHERE user_id = ?
                    RETURNING user_id, email, display_name, enabled, deny_auth_before, created
                    "#,
                )
                .bind(cutoff)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
            }
        };
        Self::updated_row(user_id, row)
    }
}
