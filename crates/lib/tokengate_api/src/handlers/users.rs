//! User handlers. Both routes sit behind `require_auth`.

use axum::extract::State;
use axum::{Extension, Json};
use tokengate_core::auth::Claims;
use tokengate_core::users::User;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;

/// `GET /v1/users`: list stored users (admin only).
pub async fn list_users_handler(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    let users = state.users.list().await?;
    Ok(Json(users))
}

/// `GET /v1/me`: the caller's own claims.
pub async fn me_handler(
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> Json<Claims> {
    Json(claims)
}
