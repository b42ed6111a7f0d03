//! User model.
//!
//! A user's effective permissions are never stored on the user: they are always
//! the live permission set of the role it references.

use serde::{Deserialize, Serialize};

use backoffice_core::{DomainError, DomainResult, RoleId, UserId};

const MAX_EMAIL_LEN: usize = 50;
const FULL_NAME_LEN: core::ops::RangeInclusive<usize> = 2..=50;
const PASSWORD_LEN: core::ops::RangeInclusive<usize> = 6..=30;

/// A back-office account.
///
/// # Invariants
/// - Exactly one role; the referenced role must exist.
/// - Credentials live in the user store, never on this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Stable login name, used as the token subject.
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub email_confirmed: bool,
    pub active: bool,
    pub role_id: RoleId,
}

/// Registration data handed to the user store.
#[derive(Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role_id: RoleId,
}

impl core::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("full_name", &self.full_name)
            .field("password", &"<redacted>")
            .field("role_id", &self.role_id)
            .finish()
    }
}

impl NewUser {
    /// Trim/lower-case the fields and check their shape.
    pub fn normalized(self) -> DomainResult<Self> {
        let email = normalize_email(&self.email);
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if email.len() > MAX_EMAIL_LEN {
            return Err(DomainError::validation(format!(
                "email must be at most {MAX_EMAIL_LEN} characters"
            )));
        }

        let full_name = normalize_full_name(&self.full_name)?;

        if !PASSWORD_LEN.contains(&self.password.chars().count()) {
            return Err(DomainError::validation(format!(
                "password must be between {} and {} characters",
                PASSWORD_LEN.start(),
                PASSWORD_LEN.end()
            )));
        }

        Ok(Self {
            email,
            full_name,
            password: self.password,
            role_id: self.role_id,
        })
    }
}

/// Trimmed full name, 2 to 50 characters.
pub fn normalize_full_name(full_name: &str) -> DomainResult<String> {
    let full_name = full_name.trim();
    if !FULL_NAME_LEN.contains(&full_name.chars().count()) {
        return Err(DomainError::validation(format!(
            "full name must be between {} and {} characters",
            FULL_NAME_LEN.start(),
            FULL_NAME_LEN.end()
        )));
    }
    Ok(full_name.to_string())
}

/// Canonical form used for email lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
