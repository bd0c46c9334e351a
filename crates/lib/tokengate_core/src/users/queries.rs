//! Postgres-backed user repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use super::{RepositoryError, User, UserDetails, UserRepository};
use crate::uuid::new_uid;

#[derive(sqlx::FromRow)]
struct UserRow {
    uid: String,
    auth_provider: String,
    provider_id: String,
    user_name: String,
    details: Json<UserDetails>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            uid: row.uid,
            auth_provider: row.auth_provider,
            provider_id: row.provider_id,
            user_name: row.user_name,
            created_date: row.created_at,
            last_login: row.updated_at,
            user_details: row.details.0,
        }
    }
}

const USER_COLUMNS: &str =
    "uid::text AS uid, auth_provider, provider_id, user_name, details, created_at, updated_at";

/// `UserRepository` over a `PgPool`.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_provider(
        &self,
        auth_provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE auth_provider = $1 AND provider_id = $2"
        ))
        .bind(auth_provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn upsert(&self, user: User) -> Result<User, RepositoryError> {
        let row = if user.uid.is_empty() {
            // A concurrent first login for the same identity lands on the
            // conflict arm and keeps the uid that won the race.
            sqlx::query_as::<_, UserRow>(&format!(
                "INSERT INTO users (uid, auth_provider, provider_id, user_name, details, updated_at) \
                 VALUES ($1::uuid, $2, $3, $4, $5, now()) \
                 ON CONFLICT (auth_provider, provider_id) DO UPDATE \
                 SET user_name = EXCLUDED.user_name, details = EXCLUDED.details, updated_at = now() \
                 RETURNING {USER_COLUMNS}"
            ))
            .bind(new_uid())
            .bind(&user.auth_provider)
            .bind(&user.provider_id)
            .bind(&user.user_name)
            .bind(Json(&user.user_details))
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, UserRow>(&format!(
                "UPDATE users \
                 SET auth_provider = $2, provider_id = $3, user_name = $4, details = $5, updated_at = now() \
                 WHERE uid = $1::uuid \
                 RETURNING {USER_COLUMNS}"
            ))
            .bind(&user.uid)
            .bind(&user.auth_provider)
            .bind(&user.provider_id)
            .bind(&user.user_name)
            .bind(Json(&user.user_details))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::Corrupt(format!("user {} vanished", user.uid)))?
        };
        Ok(row.into())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
