//! Claim sets carried by provider and local tokens.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Distinguishes the two halves of a local token pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Access,
    Refresh,
}

/// Unified identity assertion, embedded in local tokens and held in
/// request extensions once a token has been validated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Local user identifier. Empty until reconciled.
    #[serde(rename = "uid", default)]
    pub subject_uid: String,
    #[serde(rename = "user_name", default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Mirrors the provider's email verification flag.
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(rename = "image", default)]
    pub image_url: String,
    #[serde(rename = "token_use", default)]
    pub kind: TokenKind,

    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(
        rename = "aud",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub audience: BTreeSet<String>,
    /// Token id. Before reconciliation this carries the provider-side subject.
    #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "nbf", default)]
    pub not_before: i64,
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Payload of an ID token minted by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalClaims {
    /// Provider-side subject identifier.
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    /// Full display name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub iss: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub aud: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    pub exp: i64,
}

impl From<ExternalClaims> for Claims {
    fn from(ext: ExternalClaims) -> Self {
        Self {
            username: ext.name,
            email: ext.email,
            activated: ext.email_verified,
            first_name: ext.given_name,
            last_name: ext.family_name,
            image_url: ext.picture,
            issuer: ext.iss,
            id: ext.sub,
            ..Self::default()
        }
    }
}

/// Local token pair handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,
}

/// Accepts `"aud": "x"` as well as `"aud": ["x", "y"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(BTreeSet<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => BTreeSet::from([s]),
        OneOrMany::Many(set) => set,
    })
}
