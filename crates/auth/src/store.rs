//! Role and user store contracts.
//!
//! Persistence lives outside this crate. Implementations report absence as
//! `Ok(None)` and reserve `Err` for genuine store failures or rejected writes.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use backoffice_core::{DomainError, ExpectedVersion, RoleId, UserId};

use crate::{NewUser, Role, User};

/// Store operation error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The stored version did not match the writer's expectation.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record to update or delete does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => DomainError::Conflict(msg),
            StoreError::Conflict(msg) => DomainError::Conflict(msg),
            StoreError::NotFound(msg) => DomainError::NotFound(msg),
            StoreError::Storage(msg) => DomainError::Store(msg),
        }
    }
}

/// Role persistence.
///
/// ## Write semantics
///
/// `create_role` and `update_role` replace the whole role value (name,
/// description, active flag, permission set) in one critical section and
/// assign the next `version`. Readers observe either the old value or the new
/// one, never a mix. Both reject a write that would leave two active roles
/// sharing a name with [`StoreError::Conflict`].
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_role_by_id(&self, role_id: RoleId) -> Result<Option<Role>, StoreError>;

    /// Active role with this name (case-insensitive).
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    async fn create_role(&self, role: Role) -> Result<Role, StoreError>;

    /// Replace the stored role if its version matches `expected_version`.
    async fn update_role(
        &self,
        role: Role,
        expected_version: ExpectedVersion,
    ) -> Result<Role, StoreError>;

    /// Delete the role and its grants. Returns `false` if it did not exist.
    async fn delete_role(&self, role_id: RoleId) -> Result<bool, StoreError>;

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;
}

/// User persistence and credential checks.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError>;

    /// Lookup by normalized (trimmed, lower-cased) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Persist a new, active user and its credential. The store assigns the id.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn update_user(&self, user: User) -> Result<User, StoreError>;

    async fn verify_password(&self, user: &User, password: &str) -> Result<bool, StoreError>;

    /// Run a password check as costly as [`UserStore::verify_password`]
    /// against a placeholder credential. Used when no account matches, so a
    /// miss takes as long as a wrong password.
    async fn verify_dummy_password(&self, password: &str) -> Result<(), StoreError>;

    async fn count_users_by_role(&self, role_id: RoleId) -> Result<usize, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

#[async_trait]
impl<S> RoleStore for Arc<S>
where
    S: RoleStore + ?Sized,
{
    async fn find_role_by_id(&self, role_id: RoleId) -> Result<Option<Role>, StoreError> {
        (**self).find_role_by_id(role_id).await
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        (**self).find_role_by_name(name).await
    }

    async fn create_role(&self, role: Role) -> Result<Role, StoreError> {
        (**self).create_role(role).await
    }

    async fn update_role(
        &self,
        role: Role,
        expected_version: ExpectedVersion,
    ) -> Result<Role, StoreError> {
        (**self).update_role(role, expected_version).await
    }

    async fn delete_role(&self, role_id: RoleId) -> Result<bool, StoreError> {
        (**self).delete_role(role_id).await
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        (**self).list_roles().await
    }
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_user_by_id(user_id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_user_by_email(email).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        (**self).create_user(new_user).await
    }

    async fn update_user(&self, user: User) -> Result<User, StoreError> {
        (**self).update_user(user).await
    }

    async fn verify_password(&self, user: &User, password: &str) -> Result<bool, StoreError> {
        (**self).verify_password(user, password).await
    }

    async fn verify_dummy_password(&self, password: &str) -> Result<(), StoreError> {
        (**self).verify_dummy_password(password).await
    }

    async fn count_users_by_role(&self, role_id: RoleId) -> Result<usize, StoreError> {
        (**self).count_users_by_role(role_id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        (**self).list_users().await
    }
}
