//! Validation of ID tokens minted by the external identity provider.
//!
//! Provider verification keys are resolved by `kid` through a
//! [`ProviderKeyCache`]; on a miss the provider's published JWKS is fetched
//! once (concurrent misses wait on the same fetch) and every decodable key
//! in it is cached.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::AuthError;
use super::claims::ExternalClaims;
use super::jwt::describe_jwt_error;
use crate::config::AuthConfig;

/// Signing algorithm the provider uses for ID tokens.
const PROVIDER_ALGORITHM: Algorithm = Algorithm::RS256;

/// Timeout for the JWKS request.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Minimum spacing between key set fetches triggered by a `kid` the cache
/// has never seen.
pub const DEFAULT_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Key retrieval
// ---------------------------------------------------------------------------

/// Where provider verification keys come from.
#[async_trait]
pub trait ProviderKeySource: Send + Sync {
    async fn fetch_key_set(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches the provider's JWKS document over HTTPS.
pub struct JwksKeySource {
    http: reqwest::Client,
    url: String,
}

impl JwksKeySource {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self::with_client(http, url))
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ProviderKeySource for JwksKeySource {
    async fn fetch_key_set(&self) -> Result<JwkSet, AuthError> {
        info!(url = %self.url, "fetching provider signing keys");
        let response = self.http.get(&self.url).send().await.map_err(|e| {
            warn!(error = %e, "provider key fetch failed");
            AuthError::authentication("unable to fetch provider keys")
        })?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "provider key fetch returned an error status");
            return Err(AuthError::authentication("unable to fetch provider keys"));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            warn!(error = %e, "provider key set is not valid JWKS");
            AuthError::authentication("unable to fetch provider keys")
        })
    }
}

// ---------------------------------------------------------------------------
// Key cache
// ---------------------------------------------------------------------------

struct CachedKey {
    key: Arc<DecodingKey>,
    fetched_at: Instant,
}

/// Provider verification keys keyed by `kid`.
///
/// Entries live for the whole process unless a TTL is configured with
/// [`ProviderKeyCache::with_ttl`] or an entry is dropped with
/// [`ProviderKeyCache::invalidate`]. A `kid` reused with different key
/// material is not detected.
///
/// A `kid` that has never been cached only triggers a fetch once the last
/// full fetch is older than the refetch interval; earlier lookups fail
/// without touching the network.
pub struct ProviderKeyCache {
    keys: DashMap<String, CachedKey>,
    fetch_lock: Mutex<()>,
    last_fetch: StdMutex<Option<Instant>>,
    ttl: Option<Duration>,
    refetch_interval: Duration,
}

impl ProviderKeyCache {
    pub fn new() -> Self {
        Self {
            keys: DashMap::new(),
            fetch_lock: Mutex::new(()),
            last_fetch: StdMutex::new(None),
            ttl: None,
            refetch_interval: DEFAULT_REFETCH_INTERVAL,
        }
    }

    /// Spacing between fetches caused by unknown key ids.
    pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
        self.refetch_interval = interval;
        self
    }

    /// Treat entries older than `ttl` as missing.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let entry = self.keys.get(kid)?;
        match self.ttl {
            Some(ttl) if entry.fetched_at.elapsed() >= ttl => None,
            _ => Some(Arc::clone(&entry.key)),
        }
    }

    pub fn insert(&self, kid: impl Into<String>, key: DecodingKey) -> Arc<DecodingKey> {
        let key = Arc::new(key);
        self.keys.insert(
            kid.into(),
            CachedKey {
                key: Arc::clone(&key),
                fetched_at: Instant::now(),
            },
        );
        key
    }

    /// Drop `kid` and allow the next miss to fetch immediately.
    pub fn invalidate(&self, kid: &str) {
        self.keys.remove(kid);
        self.set_last_fetch(None);
    }

    pub fn clear(&self) {
        self.keys.clear();
        self.set_last_fetch(None);
    }

    /// Whether a miss on `kid` may go to the network now. Known but expired
    /// entries always may.
    fn may_fetch(&self, kid: &str) -> bool {
        if self.keys.contains_key(kid) {
            return true;
        }
        let last = *self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner);
        last.is_none_or(|at| at.elapsed() >= self.refetch_interval)
    }

    fn set_last_fetch(&self, at: Option<Instant>) {
        *self.last_fetch.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for ProviderKeyCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Verifies provider ID tokens: signature, issuer allow-list, audience and
/// expiry with a clock-skew grace window.
pub struct FederationValidator {
    source: Arc<dyn ProviderKeySource>,
    cache: ProviderKeyCache,
    validation: Validation,
}

impl FederationValidator {
    pub fn new(
        source: Arc<dyn ProviderKeySource>,
        cache: ProviderKeyCache,
        config: &AuthConfig,
    ) -> Self {
        let mut validation = Validation::new(PROVIDER_ALGORITHM);
        validation.leeway = config.grace.as_secs();
        validation.validate_nbf = true;
        validation.set_issuer(config.provider_issuers.as_slice());
        validation.set_audience(&[&config.provider_audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        Self {
            source,
            cache,
            validation,
        }
    }

    pub fn cache(&self) -> &ProviderKeyCache {
        &self.cache
    }

    /// Verify `token` and return the provider's claims.
    pub async fn validate(&self, token: &str) -> Result<ExternalClaims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "provider token header unreadable");
            AuthError::authentication("malformed token")
        })?;
        if header.alg != PROVIDER_ALGORITHM {
            return Err(AuthError::authentication("algorithm is not accepted"));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::authentication("token has no key id"))?;

        let key = self.resolve_key(&kid).await?;

        decode::<ExternalClaims>(token, &key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, kid = %kid, "provider token rejected");
                AuthError::authentication(describe_jwt_error(&e))
            })
    }

    async fn resolve_key(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        if let Some(key) = self.cache.get(kid) {
            return Ok(key);
        }

        let _guard = self.cache.fetch_lock.lock().await;
        // Another request may have filled the cache while we waited.
        if let Some(key) = self.cache.get(kid) {
            return Ok(key);
        }

        if !self.cache.may_fetch(kid) {
            debug!(kid = %kid, "unknown key id, provider keys fetched recently");
            return Err(AuthError::authentication("signing key not found"));
        }

        let key_set = self.source.fetch_key_set().await;
        self.cache.set_last_fetch(Some(Instant::now()));
        let key_set = key_set?;
        let mut resolved = None;
        for jwk in &key_set.keys {
            let Some(id) = jwk.common.key_id.as_deref() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    let key = self.cache.insert(id, key);
                    if id == kid {
                        resolved = Some(key);
                    }
                }
                Err(e) => warn!(kid = %id, error = %e, "skipping undecodable provider key"),
            }
        }

        resolved.ok_or_else(|| {
            warn!(kid = %kid, "provider key id not published");
            AuthError::authentication("signing key not found")
        })
    }
}
