//! Maps provider claims onto a local identity and keeps the user store in sync.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::claims::{Claims, ExternalClaims};
use super::{AuthError, USER_ROLE};
use crate::users::{User, UserDetails, UserRepository};

/// Reconciles federated identities against the user repository.
pub struct ClaimsReconciler {
    users: Arc<dyn UserRepository>,
}

impl ClaimsReconciler {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }

    /// Turn provider claims into local claims whose roles come from the
    /// store, creating the user on first sight.
    ///
    /// The lookup and the upsert are separate repository calls; the
    /// repository's uniqueness on `(auth_provider, provider_id)` is what
    /// keeps concurrent first logins from producing two users.
    pub async fn reconcile(&self, external: ExternalClaims) -> Result<Claims, AuthError> {
        let mut claims = Claims::from(external);
        if claims.issuer.is_empty() || claims.id.is_empty() {
            return Err(AuthError::authentication(
                "issuer and ID are required claim fields",
            ));
        }

        let existing = self
            .users
            .find_by_provider(&claims.issuer, &claims.id)
            .await?;

        let uid = match existing {
            Some(stored) => {
                // Provider-asserted roles are never trusted.
                claims.roles = stored.user_details.roles;
                stored.uid
            }
            None => {
                claims.roles = BTreeSet::from([USER_ROLE.to_string()]);
                info!(issuer = %claims.issuer, "first login for provider identity");
                String::new()
            }
        };

        let stored = self.users.upsert(user_from_claims(&claims, uid)).await?;
        debug!(uid = %stored.uid, "reconciled identity");
        claims.subject_uid = stored.uid;
        Ok(claims)
    }
}

fn user_from_claims(claims: &Claims, uid: String) -> User {
    let now = Utc::now();
    User {
        uid,
        auth_provider: claims.issuer.clone(),
        provider_id: claims.id.clone(),
        user_name: claims.username.clone(),
        created_date: now,
        last_login: now,
        user_details: UserDetails {
            first_name: claims.first_name.clone(),
            last_name: claims.last_name.clone(),
            email: claims.email.clone(),
            full_name: claims.username.clone(),
            image: claims.image_url.clone(),
            roles: claims.roles.clone(),
        },
    }
}
