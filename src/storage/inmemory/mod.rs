//! In-memory storage implementations
//!
//! Suitable for development and testing. Data is lost on restart.

mod users;

pub use users::MemoryUserStore;
