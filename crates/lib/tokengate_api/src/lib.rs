//! # tokengate_api
//!
//! HTTP surface for tokengate: federated login, token refresh and
//! bearer-protected user routes.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tokengate_core::auth::{AuthService, Permission};
use tokengate_core::users::UserRepository;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, users};
use crate::middleware::auth::{PermissionGuard, require_auth, require_permission};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single auth facade, built once at startup.
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserRepository>,
    pub config: ApiConfig,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.allowed_origin.clone())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true);

    let guard = |permissions: Vec<Permission>| {
        axum::middleware::from_fn_with_state(
            PermissionGuard::new(state.auth.clone(), permissions),
            require_permission,
        )
    };

    // Public routes (no auth required)
    let public = Router::new()
        .route("/v1/login", post(auth::login_handler))
        .route("/v1/login/refresh", post(auth::refresh_handler));

    // Protected routes (require a bearer access token)
    let protected = Router::new()
        .route(
            "/v1/users",
            get(users::list_users_handler).route_layer(guard(vec![Permission::ADMIN])),
        )
        .route(
            "/v1/me",
            get(users::me_handler).route_layer(guard(vec![Permission::READ])),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
