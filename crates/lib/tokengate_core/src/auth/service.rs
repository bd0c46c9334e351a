//! The auth facade: login, refresh and per-request authentication.

use std::sync::Arc;

use tracing::{debug, info};

use super::claims::{Claims, Token, TokenKind};
use super::federation::{FederationValidator, JwksKeySource, ProviderKeyCache};
use super::jwt::TokenIssuer;
use super::permissions::{Permission, check_permission};
use super::reconcile::ClaimsReconciler;
use super::AuthError;
use crate::config::{AuthConfig, ConfigError};
use crate::users::UserRepository;

/// Built once at startup and shared across request handlers. Holds no
/// per-session state: liveness lives entirely in token expiry.
pub struct AuthService {
    federation: FederationValidator,
    reconciler: ClaimsReconciler,
    tokens: TokenIssuer,
}

impl AuthService {
    pub fn new(
        federation: FederationValidator,
        reconciler: ClaimsReconciler,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            federation,
            reconciler,
            tokens,
        }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(
        config: &AuthConfig,
        users: Arc<dyn UserRepository>,
    ) -> Result<Self, ConfigError> {
        let tokens = TokenIssuer::from_config(config)?;
        let source = JwksKeySource::new(&config.provider_jwks_url).map_err(|e| {
            ConfigError::Invalid {
                name: "PROVIDER_JWKS_URL",
                reason: e.to_string(),
            }
        })?;
        let federation =
            FederationValidator::new(Arc::new(source), ProviderKeyCache::new(), config);
        Ok(Self::new(
            federation,
            ClaimsReconciler::new(users),
            tokens,
        ))
    }

    /// Exchange a provider ID token for a local token pair.
    pub async fn login(&self, provider_token: &str) -> Result<Token, AuthError> {
        let external = self.federation.validate(provider_token).await?;
        let claims = self.reconciler.reconcile(external).await?;
        info!(uid = %claims.subject_uid, "login accepted");
        self.tokens.issue(claims)
    }

    /// Re-issue a pair from a previously issued token without consulting the
    /// user store. Either half of a pair is accepted.
    pub async fn refresh(&self, presented: &str) -> Result<Token, AuthError> {
        let claims = self.tokens.validate(presented)?;
        debug!(uid = %claims.subject_uid, kind = ?claims.kind, "refreshing token pair");
        self.tokens.issue(claims)
    }

    /// Validate a bearer credential for a protected call. Refresh tokens
    /// are not accepted here.
    pub fn authenticate(&self, access_token: &str) -> Result<Claims, AuthError> {
        let claims = self.tokens.validate(access_token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::authentication(
                "refresh token presented as access token",
            ));
        }
        Ok(claims)
    }

    pub fn authorize(&self, claims: &Claims, permission: &Permission) -> Result<(), AuthError> {
        check_permission(claims, permission)
    }
}
