//! Authentication and authorization logic.
//!
//! Federated login, local token issuance, identity reconciliation and
//! role-based permission checks, composed behind [`AuthService`].

pub mod claims;
pub mod federation;
pub mod jwt;
pub mod permissions;
pub mod reconcile;
pub mod service;

use thiserror::Error;

use crate::users::RepositoryError;

pub use claims::{Claims, ExternalClaims, Token, TokenKind};
pub use federation::{FederationValidator, JwksKeySource, ProviderKeyCache, ProviderKeySource};
pub use jwt::{SigningKeys, TokenIssuer};
pub use permissions::{Permission, RoleHolder, check_permission};
pub use reconcile::ClaimsReconciler;
pub use service::AuthService;

/// Role granted to every newly reconciled identity.
pub const USER_ROLE: &str = "ROLE_USER";

/// Role that passes every permission check.
pub const ADMINISTRATOR_ROLE: &str = "ROLE_ADMIN";

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad, expired or unverifiable credential.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Valid identity lacking the requested permission.
    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Signing failed with otherwise valid key material.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub(crate) fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }
}
