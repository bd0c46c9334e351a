//! Persisted user identities and the repository seam the auth core talks to.

pub mod memory;
pub mod queries;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryUserRepository;
pub use queries::PgUserRepository;

/// Storage errors.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Stored record is invalid: {0}")]
    Corrupt(String),
}

/// Profile attributes stored alongside a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

/// A local user, keyed by `(auth_provider, provider_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque local identifier. Empty until the record has been stored.
    pub uid: String,
    pub auth_provider: String,
    pub provider_id: String,
    pub user_name: String,
    pub created_date: DateTime<Utc>,
    #[serde(rename = "last_login_date")]
    pub last_login: DateTime<Utc>,
    #[serde(default)]
    pub user_details: UserDetails,
}

impl User {
    /// Returns true if the user holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.user_details.roles.contains(role)
    }
}

/// Storage for users. Implementations must keep `(auth_provider, provider_id)`
/// unique and never reassign a `uid` once handed out.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Look up a user by provider identity.
    async fn find_by_provider(
        &self,
        auth_provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Insert `user` when it has no uid yet, update it otherwise.
    /// Returns the stored record with its uid and timestamps filled in.
    async fn upsert(&self, user: User) -> Result<User, RepositoryError>;

    /// All stored users.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
}
