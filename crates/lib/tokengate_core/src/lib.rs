//! # tokengate_core
//!
//! Credential issuance and validation for tokengate: federated login,
//! local token minting, identity reconciliation and role checks.

pub mod auth;
pub mod config;
pub mod migrate;
pub mod users;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
