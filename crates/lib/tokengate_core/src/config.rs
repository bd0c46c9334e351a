//! Authentication configuration, loaded once at startup.

use std::time::Duration;

use thiserror::Error;

/// Default access-token lifetime in minutes.
pub const DEFAULT_ACCESS_TTL_MINUTES: u64 = 5;

/// Default refresh-token lifetime in minutes.
pub const DEFAULT_REFRESH_TTL_MINUTES: u64 = 10;

/// Default clock-skew tolerance for provider tokens, in seconds.
pub const DEFAULT_GRACE_SECONDS: u64 = 5;

/// Upper bound for either token lifetime: one year.
pub const MAX_TTL_MINUTES: u64 = 365 * 24 * 60;

/// Upper bound for the provider clock-skew tolerance: one hour.
pub const MAX_GRACE_SECONDS: u64 = 3600;

/// Google's published JWKS endpoint.
pub const DEFAULT_PROVIDER_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Issuer strings Google uses interchangeably.
pub const DEFAULT_PROVIDER_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Startup configuration errors. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("key material error: {0}")]
    KeyMaterial(String),
}

/// Immutable authentication settings shared by every component.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// PEM-encoded RSA private key used to sign local tokens.
    pub private_key_pem: String,
    /// PEM-encoded RSA public key paired with `private_key_pem`.
    pub public_key_pem: String,
    /// Audience the provider must have minted its token for.
    pub provider_audience: String,
    /// Accepted `iss` values for provider tokens.
    pub provider_issuers: Vec<String>,
    /// Where the provider publishes its signing keys.
    pub provider_jwks_url: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Clock-skew tolerance applied to provider tokens only.
    pub grace: Duration,
}

impl AuthConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                      | Default                                  |
    /// |-------------------------------|------------------------------------------|
    /// | `PRIVATE_KEY`                 | required                                 |
    /// | `PUBLIC_KEY`                  | required                                 |
    /// | `GOOGLE_TOKEN_AUDIENCE`       | required                                 |
    /// | `PROVIDER_ISSUERS`            | `accounts.google.com,https://accounts.google.com` |
    /// | `PROVIDER_JWKS_URL`           | `https://www.googleapis.com/oauth2/v3/certs` |
    /// | `TOKEN_VALID_MINUTES`         | `5`                                      |
    /// | `REFRESH_TOKEN_VALID_MINUTES` | `10`                                     |
    /// | `TOKEN_GRACE_SECONDS`         | `5`                                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let number = |name: &'static str, default: u64| match lookup(name) {
            Some(v) if !v.trim().is_empty() => {
                v.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name,
                    reason: e.to_string(),
                })
            }
            _ => Ok(default),
        };
        let bounded = |name: &'static str, default: u64, max: u64| -> Result<u64, ConfigError> {
            let value = number(name, default)?;
            if value > max {
                return Err(ConfigError::Invalid {
                    name,
                    reason: format!("{value} exceeds the maximum of {max}"),
                });
            }
            Ok(value)
        };

        let provider_issuers = match lookup("PROVIDER_ISSUERS") {
            Some(v) if !v.trim().is_empty() => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            _ => DEFAULT_PROVIDER_ISSUERS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            private_key_pem: required("PRIVATE_KEY")?,
            public_key_pem: required("PUBLIC_KEY")?,
            provider_audience: required("GOOGLE_TOKEN_AUDIENCE")?,
            provider_issuers,
            provider_jwks_url: lookup("PROVIDER_JWKS_URL")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROVIDER_JWKS_URL.to_string()),
            access_ttl: minutes(bounded(
                "TOKEN_VALID_MINUTES",
                DEFAULT_ACCESS_TTL_MINUTES,
                MAX_TTL_MINUTES,
            )?),
            refresh_ttl: minutes(bounded(
                "REFRESH_TOKEN_VALID_MINUTES",
                DEFAULT_REFRESH_TTL_MINUTES,
                MAX_TTL_MINUTES,
            )?),
            grace: Duration::from_secs(bounded(
                "TOKEN_GRACE_SECONDS",
                DEFAULT_GRACE_SECONDS,
                MAX_GRACE_SECONDS,
            )?),
        })
    }
}

/// Callers bound `m` by [`MAX_TTL_MINUTES`], so the product cannot overflow.
fn minutes(m: u64) -> Duration {
    Duration::from_secs(m * 60)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("PRIVATE_KEY", "priv"),
        ("PUBLIC_KEY", "pub"),
        ("GOOGLE_TOKEN_AUDIENCE", "client-id"),
    ];

    #[test]
    fn defaults_apply_when_optional_vars_absent() {
        let cfg = AuthConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.access_ttl, Duration::from_secs(300));
        assert_eq!(cfg.refresh_ttl, Duration::from_secs(600));
        assert_eq!(cfg.grace, Duration::from_secs(5));
        assert_eq!(cfg.provider_jwks_url, DEFAULT_PROVIDER_JWKS_URL);
        assert_eq!(
            cfg.provider_issuers,
            vec!["accounts.google.com", "https://accounts.google.com"]
        );
    }

    #[test]
    fn missing_audience_is_fatal() {
        let err = AuthConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("GOOGLE_TOKEN_AUDIENCE")));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars[0] = ("PRIVATE_KEY", "  ");
        let err = AuthConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PRIVATE_KEY")));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TOKEN_VALID_MINUTES", "15"));
        vars.push(("REFRESH_TOKEN_VALID_MINUTES", "60"));
        vars.push(("TOKEN_GRACE_SECONDS", "0"));
        vars.push(("PROVIDER_ISSUERS", "https://issuer.example, other"));
        let cfg = AuthConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(cfg.access_ttl, Duration::from_secs(900));
        assert_eq!(cfg.refresh_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.grace, Duration::ZERO);
        assert_eq!(cfg.provider_issuers, vec!["https://issuer.example", "other"]);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TOKEN_GRACE_SECONDS", "soon"));
        let err = AuthConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "TOKEN_GRACE_SECONDS",
                ..
            }
        ));
    }

    #[test]
    fn oversized_ttl_is_rejected_at_startup() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TOKEN_VALID_MINUTES", "1000000000000"));
        let err = AuthConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "TOKEN_VALID_MINUTES",
                ..
            }
        ));
    }

    #[test]
    fn ttl_at_the_cap_is_accepted() {
        let mut vars = REQUIRED.to_vec();
        let cap = MAX_TTL_MINUTES.to_string();
        vars.push(("REFRESH_TOKEN_VALID_MINUTES", cap.as_str()));
        let cfg = AuthConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(cfg.refresh_ttl, Duration::from_secs(MAX_TTL_MINUTES * 60));
    }

    #[test]
    fn oversized_grace_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("TOKEN_GRACE_SECONDS", "86400"));
        let err = AuthConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "TOKEN_GRACE_SECONDS",
                ..
            }
        ));
    }
}
