//! `ServerUser` persistence behind [`UserStore`].
//!
//! The in-memory store is always available; the SQL stores are feature gated.

pub mod inmemory;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use inmemory::MemoryUserStore;
pub use traits::*;

use crate::errors::StorageError;
use std::sync::Arc;

#[cfg(feature = "sqlite")]
const DEFAULT_SQLITE_URL: &str = "sqlite:authgate.db";

/// Which [`UserStore`] to open, with its database URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite(String),
    #[cfg(feature = "postgres")]
    Postgres(String),
}

impl StorageBackend {
    /// Resolve `STORAGE_BACKEND` / `DATABASE_URL` style settings.
    ///
    /// SQLite falls back to a local file; PostgreSQL has no default URL.
    pub fn parse(name: &str, database_url: Option<&str>) -> Result<Self> {
        match (name.trim().to_ascii_lowercase().as_str(), database_url) {
            ("memory", _) => Ok(Self::Memory),
            #[cfg(feature = "sqlite")]
            ("sqlite", url) => Ok(Self::Sqlite(url.unwrap_or(DEFAULT_SQLITE_URL).to_string())),
            #[cfg(feature = "postgres")]
            ("postgres", Some(url)) => Ok(Self::Postgres(url.to_string())),
            #[cfg(feature = "postgres")]
            ("postgres", None) => Err(StorageError::InvalidData(
                "the postgres store needs DATABASE_URL".to_string(),
            )),
            (other, _) => Err(StorageError::InvalidData(format!(
                "storage backend {:?} is not available in this build",
                other
            ))),
        }
    }

    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory)
    }

    /// Open the store; SQL stores are migrated before they are returned.
    pub async fn open(self) -> Result<Arc<dyn UserStore>> {
        let store: Arc<dyn UserStore> = match self {
            Self::Memory => Arc::new(MemoryUserStore::new()),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(url) => Arc::new(sqlite::SqliteUserStore::connect(&url).await?),
            #[cfg(feature = "postgres")]
            Self::Postgres(url) => Arc::new(postgres::PostgresUserStore::connect(&url).await?),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory_and_unknown() {
        let backend = StorageBackend::parse("Memory", None).unwrap();
        assert_eq!(backend, StorageBackend::Memory);
        assert!(!backend.is_persistent());

        assert!(matches!(
            StorageBackend::parse("redis", None),
            Err(StorageError::InvalidData(_))
        ));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_postgres_requires_database_url() {
        assert!(StorageBackend::parse("postgres", None).is_err());

        let backend = StorageBackend::parse("postgres", Some("postgres://localhost/authgate")).unwrap();
        assert_eq!(
            backend,
            StorageBackend::Postgres("postgres://localhost/authgate".to_string())
        );
        assert!(backend.is_persistent());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_sqlite_defaults_to_local_file() {
        assert_eq!(
            StorageBackend::parse("sqlite", None).unwrap(),
            StorageBackend::Sqlite(DEFAULT_SQLITE_URL.to_string())
        );
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let store = StorageBackend::Memory.open().await.unwrap();
        assert!(store.get_user("nobody").await.unwrap().is_none());
    }
}
