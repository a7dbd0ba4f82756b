//! PostgreSQL storage implementations
//!
//! Suitable for production deployments with more than one gateway instance.

mod users;

pub use users::PostgresUserStore;
