//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use tokengate_core::auth::Token;

/// `POST /v1/login` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// ID token issued by the identity provider.
    pub token: String,
}

/// `POST /v1/login/refresh` body. Clients send back the token pair they
/// hold; only `refresh_token` is used.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
