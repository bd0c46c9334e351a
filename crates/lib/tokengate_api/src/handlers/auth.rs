//! Login and token refresh handlers.

use axum::Json;
use axum::extract::State;
use tracing::{debug, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::JsonBody;
use crate::models::{LoginRequest, RefreshRequest, Token};

const LOGIN_FAILED: &str = "unable to process login request";
const REFRESH_FAILED: &str = "unable to process refresh request";

/// `POST /v1/login`: exchange a provider ID token for a local token pair.
pub async fn login_handler(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> AppResult<Json<Token>> {
    let login = state.auth.login(&body.token);
    match tokio::time::timeout(state.config.login_timeout, login).await {
        Ok(Ok(token)) => Ok(Json(token)),
        Ok(Err(e)) => {
            warn!(error = %e, "unable to get auth token");
            Err(AppError::Forbidden(LOGIN_FAILED.into()))
        }
        Err(_) => {
            warn!(timeout = ?state.config.login_timeout, "login deadline exceeded");
            Err(AppError::Forbidden(LOGIN_FAILED.into()))
        }
    }
}

/// `POST /v1/login/refresh`: exchange a previously issued token for a new pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshRequest>,
) -> AppResult<Json<Token>> {
    let token = state
        .auth
        .refresh(&body.refresh_token)
        .await
        .map_err(|e| {
            warn!(error = %e, "unable to refresh token");
            AppError::Forbidden(REFRESH_FAILED.into())
        })?;
    debug!("new token issued");
    Ok(Json(token))
}
