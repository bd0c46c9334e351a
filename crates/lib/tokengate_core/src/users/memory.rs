//! In-process user repository backed by `DashMap`.
//!
//! Used by tests and by the server's `--in-memory` development mode.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{RepositoryError, User, UserRepository};
use crate::uuid::new_uid;

/// Users keyed by `(auth_provider, provider_id)`.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: DashMap<(String, String), User>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Replace the role set of a stored user. Returns false if absent.
    pub fn set_roles<I, S>(&self, auth_provider: &str, provider_id: &str, roles: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = (auth_provider.to_string(), provider_id.to_string());
        match self.users.get_mut(&key) {
            Some(mut user) => {
                user.user_details.roles = roles.into_iter().map(Into::into).collect();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_provider(
        &self,
        auth_provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let key = (auth_provider.to_string(), provider_id.to_string());
        Ok(self.users.get(&key).map(|u| u.clone()))
    }

    async fn upsert(&self, mut user: User) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let key = (user.auth_provider.clone(), user.provider_id.clone());
        match self.users.entry(key) {
            Entry::Occupied(mut slot) => {
                // An existing identity keeps its uid and creation time.
                let stored = slot.get();
                user.uid = stored.uid.clone();
                user.created_date = stored.created_date;
                user.last_login = now;
                slot.insert(user.clone());
            }
            Entry::Vacant(slot) => {
                if user.uid.is_empty() {
                    user.uid = new_uid();
                }
                user.created_date = now;
                user.last_login = now;
                slot.insert(user.clone());
            }
        }
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let mut users: Vec<User> = self.users.iter().map(|e| e.value().clone()).collect();
        users.sort_by(|a, b| a.created_date.cmp(&b.created_date));
        Ok(users)
    }
}
