//! Identity gateway library crate.
//!
//! Brokers sign-in with Google, Facebook, AAF, GitHub and Twitter, bridges
//! GitHub into Cognito user pools, and exchanges verified identity tokens for
//! the gateway's own short-lived access tokens.

pub mod authz;
pub mod config;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod storage;
