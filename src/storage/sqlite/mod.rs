//! SQLite storage implementations
//!
//! Suitable for single-instance deployments.

mod users;

pub use users::SqliteUserStore;
