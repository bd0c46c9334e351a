//! Request handlers.

pub mod auth;
pub mod users;

use crate::error::AppError;

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::NotFound("not found".into())
}
