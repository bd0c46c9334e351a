//! Authentication middleware: Bearer token extraction, local token
//! verification and per-route permission checks.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tokengate_core::auth::{AuthService, Claims, Permission};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Validated caller identity, stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Claims);

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the
/// access token and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            debug!("missing authorization header");
            AppError::unauthorized()
        })?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            debug!("invalid authorization scheme");
            AppError::unauthorized()
        })?;

    let claims = state.auth.authenticate(token).map_err(|e| {
        debug!(error = %e, "bearer token rejected");
        AppError::unauthorized()
    })?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// Middleware state for [`require_permission`]: the permissions a route
/// demands, all of which must pass.
#[derive(Clone)]
pub struct PermissionGuard {
    auth: Arc<AuthService>,
    permissions: Arc<[Permission]>,
}

impl PermissionGuard {
    pub fn new(auth: Arc<AuthService>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            auth,
            permissions: permissions.into_iter().collect(),
        }
    }
}

/// Axum middleware: rejects the request with 403 unless the authenticated
/// caller holds every guarded permission. Must run inside [`require_auth`].
pub async fn require_permission(
    State(guard): State<PermissionGuard>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(AuthenticatedUser(claims)) = request.extensions().get::<AuthenticatedUser>() else {
        return Err(AppError::unauthorized());
    };

    for permission in guard.permissions.iter() {
        guard.auth.authorize(claims, permission).map_err(|e| {
            debug!(uid = %claims.subject_uid, %permission, error = %e, "permission denied");
            AppError::forbidden()
        })?;
    }

    Ok(next.run(request).await)
}
