//! Role-to-permission decisions.

use std::borrow::Cow;
use std::fmt;

use super::claims::Claims;
use super::{ADMINISTRATOR_ROLE, AuthError, USER_ROLE};
use crate::users::User;

/// A requested capability, evaluated against the caller's roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const READ: Permission = Permission(Cow::Borrowed("read"));
    pub const WRITE: Permission = Permission(Cow::Borrowed("write"));
    /// Not granted to base users; only administrators pass it.
    pub const ADMIN: Permission = Permission(Cow::Borrowed("admin"));

    pub fn new(tag: impl Into<String>) -> Self {
        Self(Cow::Owned(tag.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Operations a base user may perform.
    fn is_base_operation(&self) -> bool {
        *self == Self::READ || *self == Self::WRITE
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Anything that carries a role set.
pub trait RoleHolder {
    fn has_role(&self, role: &str) -> bool;
}

impl RoleHolder for Claims {
    fn has_role(&self, role: &str) -> bool {
        Claims::has_role(self, role)
    }
}

impl RoleHolder for User {
    fn has_role(&self, role: &str) -> bool {
        User::has_role(self, role)
    }
}

/// Administrators pass everything. Base users pass `read` and `write` only.
/// Everyone else fails.
pub fn check_permission<R>(identity: &R, permission: &Permission) -> Result<(), AuthError>
where
    R: RoleHolder + ?Sized,
{
    if permission.as_str().is_empty() {
        return Err(AuthError::Authorization(
            "a permission tag is required".into(),
        ));
    }

    if identity.has_role(ADMINISTRATOR_ROLE) {
        return Ok(());
    }

    if identity.has_role(USER_ROLE) && permission.is_base_operation() {
        return Ok(());
    }

    Err(AuthError::Authorization(format!(
        "missing permission '{permission}'"
    )))
}
