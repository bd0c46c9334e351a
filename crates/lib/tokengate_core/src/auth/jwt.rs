//! Local token issuance and verification (RS256).

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::{Error as JwtError, ErrorKind};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::{debug, error};

use super::AuthError;
use super::claims::{Claims, Token, TokenKind};
use crate::config::{AuthConfig, ConfigError};

/// `iss` and `aud` stamped on every local token.
pub const LOCAL_ISSUER: &str = "local";

/// `sub` stamped on every local token.
pub const LOCAL_SUBJECT: &str = "access";

const ALGORITHM: Algorithm = Algorithm::RS256;

/// The process-wide RSA key pair. Loaded once, read-only afterwards.
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    /// Parse PEM key material and check that the two halves belong together.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, ConfigError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| ConfigError::KeyMaterial(format!("private key: {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| ConfigError::KeyMaterial(format!("public key: {e}")))?;
        let keys = Self { encoding, decoding };
        keys.check_pair()?;
        Ok(keys)
    }

    fn check_pair(&self) -> Result<(), ConfigError> {
        let probe = encode(
            &Header::new(ALGORITHM),
            &serde_json::json!({ "probe": true }),
            &self.encoding,
        )
        .map_err(|e| ConfigError::KeyMaterial(format!("signing probe: {e}")))?;

        let mut validation = Validation::new(ALGORITHM);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        decode::<serde_json::Value>(&probe, &self.decoding, &validation).map_err(|_| {
            ConfigError::KeyMaterial("public key does not match private key".into())
        })?;
        Ok(())
    }
}

/// Mints and verifies locally signed access/refresh tokens.
pub struct TokenIssuer {
    keys: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(keys: SigningKeys, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        // Local tokens are checked against real wall-clock time: no leeway.
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[LOCAL_ISSUER]);
        validation.set_audience(&[LOCAL_ISSUER]);
        validation.sub = Some(LOCAL_SUBJECT.to_string());
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "aud", "sub"]);

        Self {
            keys,
            access_ttl,
            refresh_ttl,
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let keys = SigningKeys::from_pem(&config.private_key_pem, &config.public_key_pem)?;
        Ok(Self::new(keys, config.access_ttl, config.refresh_ttl))
    }

    /// Stamp fresh registered claims onto `claims` and sign an access token
    /// plus a longer-lived refresh token carrying the same identity.
    pub fn issue(&self, mut claims: Claims) -> Result<Token, AuthError> {
        let now = Utc::now();
        let access_expires_at = expiry(now, self.access_ttl)?;
        let refresh_expires_at = expiry(now, self.refresh_ttl)?;

        claims.issuer = LOCAL_ISSUER.to_string();
        claims.subject = LOCAL_SUBJECT.to_string();
        claims.audience = BTreeSet::from([LOCAL_ISSUER.to_string()]);
        claims.id.clear();
        claims.issued_at = now.timestamp();
        claims.not_before = now.timestamp();
        claims.expires_at = access_expires_at.timestamp();
        claims.kind = TokenKind::Access;
        let access_token = self.sign(&claims)?;

        let mut refresh_claims = claims;
        refresh_claims.expires_at = refresh_expires_at.timestamp();
        refresh_claims.kind = TokenKind::Refresh;
        let refresh_token = self.sign(&refresh_claims)?;

        debug!(uid = %refresh_claims.subject_uid, "issued local token pair");

        Ok(Token {
            access_token,
            refresh_token,
            expires_at: access_expires_at,
        })
    }

    /// Verify a locally issued token (access or refresh) and return its claims.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "local token rejected");
                AuthError::authentication(describe_jwt_error(&e))
            })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(ALGORITHM), claims, &self.keys.encoding).map_err(|e| {
            error!(error = %e, "unable to create token");
            AuthError::Internal(format!("jwt encode: {e}"))
        })
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            error!(ttl = ?ttl, "token lifetime out of range");
            AuthError::Internal(format!("token lifetime {ttl:?} out of range"))
        })
}

/// Single-line reason for a failed JWT check. Never echoes token content.
pub(crate) fn describe_jwt_error(err: &JwtError) -> &'static str {
    match err.kind() {
        ErrorKind::InvalidSignature => "signature is invalid",
        ErrorKind::ExpiredSignature => "token is expired",
        ErrorKind::ImmatureSignature => "token is not yet valid",
        ErrorKind::InvalidIssuer => "iss is invalid",
        ErrorKind::InvalidAudience => "aud is invalid",
        ErrorKind::InvalidSubject => "sub is invalid",
        ErrorKind::InvalidAlgorithm => "algorithm is not accepted",
        ErrorKind::MissingRequiredClaim(_) => "required claim is missing",
        _ => "malformed token",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{LOCAL_PRIVATE_PEM, LOCAL_PUBLIC_PEM, UNTRUSTED_PRIVATE_PEM};

    fn issuer() -> TokenIssuer {
        let keys = SigningKeys::from_pem(LOCAL_PRIVATE_PEM, LOCAL_PUBLIC_PEM).unwrap();
        TokenIssuer::new(keys, Duration::from_secs(300), Duration::from_secs(600))
    }

    fn reconciled_claims() -> Claims {
        Claims {
            subject_uid: "0b6f4c3e-8e53-4a3c-9a43-1f2c1b7e2d10".into(),
            username: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            roles: BTreeSet::from(["ROLE_USER".to_string()]),
            activated: true,
            issuer: "https://accounts.google.com".into(),
            id: "1234567890".into(),
            ..Claims::default()
        }
    }

    /// Sign `claims` verbatim, bypassing the issuer's stamping.
    fn sign_raw(claims: &Claims, private_pem: &str) -> String {
        let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
    }

    fn stamped(expires_in: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            issuer: LOCAL_ISSUER.into(),
            subject: LOCAL_SUBJECT.into(),
            audience: BTreeSet::from([LOCAL_ISSUER.to_string()]),
            issued_at: now - 600,
            not_before: now - 600,
            expires_at: now + expires_in,
            ..reconciled_claims()
        }
    }

    #[test]
    fn mismatched_key_pair_is_rejected() {
        let private = UNTRUSTED_PRIVATE_PEM;
        let err = SigningKeys::from_pem(private, LOCAL_PUBLIC_PEM).err().unwrap();
        assert!(matches!(err, ConfigError::KeyMaterial(_)));
    }

    #[test]
    fn garbage_pem_is_rejected() {
        assert!(SigningKeys::from_pem("not a key", LOCAL_PUBLIC_PEM).is_err());
    }

    #[test]
    fn issued_access_token_round_trips() {
        let issuer = issuer();
        let original = reconciled_claims();
        let token = issuer.issue(original.clone()).unwrap();

        let claims = issuer.validate(&token.access_token).unwrap();
        assert_eq!(claims.subject_uid, original.subject_uid);
        assert_eq!(claims.roles, original.roles);
        assert_eq!(claims.issuer, "local");
        assert_eq!(claims.subject, "access");
        assert_eq!(claims.audience, BTreeSet::from(["local".to_string()]));
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.id.is_empty());
        assert_eq!(claims.expires_at, token.expires_at.timestamp());
    }

    #[test]
    fn refresh_token_outlives_access_token() {
        let issuer = issuer();
        let token = issuer.issue(reconciled_claims()).unwrap();
        let access = issuer.validate(&token.access_token).unwrap();
        let refresh = issuer.validate(&token.refresh_token).unwrap();

        assert_eq!(refresh.kind, TokenKind::Refresh);
        assert_eq!(refresh.subject_uid, access.subject_uid);
        assert_eq!(refresh.issued_at, access.issued_at);
        assert_eq!(refresh.expires_at - access.expires_at, 300);
    }

    #[test]
    fn expired_token_fails() {
        let token = sign_raw(&stamped(-1), LOCAL_PRIVATE_PEM);
        let err = issuer().validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::Authentication(ref m) if m == "token is expired"));
    }

    #[test]
    fn token_from_foreign_key_fails() {
        let token = sign_raw(&stamped(300), UNTRUSTED_PRIVATE_PEM);
        let err = issuer().validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::Authentication(ref m) if m == "signature is invalid"));
    }

    #[test]
    fn token_with_foreign_issuer_fails() {
        let mut claims = stamped(300);
        claims.issuer = "https://accounts.google.com".into();
        let token = sign_raw(&claims, LOCAL_PRIVATE_PEM);
        let err = issuer().validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::Authentication(ref m) if m == "iss is invalid"));
    }

    #[test]
    fn future_token_fails() {
        let mut claims = stamped(900);
        claims.not_before = Utc::now().timestamp() + 120;
        let token = sign_raw(&claims, LOCAL_PRIVATE_PEM);
        let err = issuer().validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::Authentication(ref m) if m == "token is not yet valid"));
    }

    #[test]
    fn malformed_token_fails() {
        for garbage in ["", "abc", "a.b.c", "eyJhbGciOiJSUzI1NiJ9.e30."] {
            let err = issuer().validate(garbage).unwrap_err();
            assert!(matches!(err, AuthError::Authentication(_)), "{garbage:?}");
        }
    }

    #[test]
    fn out_of_range_lifetime_is_an_error_not_a_panic() {
        let keys = SigningKeys::from_pem(LOCAL_PRIVATE_PEM, LOCAL_PUBLIC_PEM).unwrap();
        let issuer = TokenIssuer::new(
            keys,
            Duration::from_secs(60_000_000_000_000),
            Duration::from_secs(600),
        );
        let err = issuer.issue(reconciled_claims()).unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }
}
