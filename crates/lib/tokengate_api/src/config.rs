//! API server configuration.

use std::time::Duration;

use axum::http::HeaderValue;

/// Default deadline for a login request, including the provider key fetch
/// and the user store round-trips.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for the HTTP layer.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8080").
    pub bind_addr: String,
    /// Origin allowed by the CORS layer.
    pub allowed_origin: HeaderValue,
    pub login_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            allowed_origin: HeaderValue::from_static("http://localhost"),
            login_timeout: DEFAULT_LOGIN_TIMEOUT,
        }
    }
}
