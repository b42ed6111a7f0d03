use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use async_trait::async_trait;

use backoffice_auth::{NewUser, StoreError, User, UserStore};
use backoffice_core::{RoleId, UserId};

use super::poisoned;
use crate::password;

#[derive(Debug)]
struct StoredUser {
    user: User,
    password_hash: String,
}

#[derive(Debug, Default)]
struct UserTable {
    users: HashMap<UserId, StoredUser>,
    last_id: u64,
}

/// In-memory user store with Argon2 password hashes.
///
/// Ids are assigned sequentially starting at 1.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<UserTable>,
    dummy_hash: OnceLock<String>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash compared against when no account matches; built on first use.
    fn dummy_hash(&self) -> Result<&str, StoreError> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash);
        }
        let hash = password::hash_password("placeholder-credential")?;
        Ok(self.dummy_hash.get_or_init(|| hash))
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user_by_id(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        let table = self.inner.read().map_err(poisoned)?;
        Ok(table.users.get(&user_id).map(|s| s.user.clone()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let table = self.inner.read().map_err(poisoned)?;
        Ok(table
            .users
            .values()
            .find(|s| s.user.email == email)
            .map(|s| s.user.clone()))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let password_hash = password::hash_password(&new_user.password)?;

        let mut table = self.inner.write().map_err(poisoned)?;
        if table.users.values().any(|s| s.user.email == new_user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                new_user.email
            )));
        }

        table.last_id += 1;
        let user = User {
            id: UserId::new(table.last_id),
            username: new_user.email.clone(),
            email: new_user.email,
            full_name: new_user.full_name,
            email_confirmed: true,
            active: true,
            role_id: new_user.role_id,
        };
        table.users.insert(
            user.id,
            StoredUser {
                user: user.clone(),
                password_hash,
            },
        );
        Ok(user)
    }

    async fn update_user(&self, user: User) -> Result<User, StoreError> {
        let mut table = self.inner.write().map_err(poisoned)?;
        if table
            .users
            .values()
            .any(|s| s.user.id != user.id && s.user.email == user.email)
        {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }

        let stored = table
            .users
            .get_mut(&user.id)
            .ok_or_else(|| StoreError::NotFound(format!("user {}", user.id)))?;
        stored.user = user.clone();
        Ok(user)
    }

    async fn verify_password(&self, user: &User, password: &str) -> Result<bool, StoreError> {
        let hash = {
            let table = self.inner.read().map_err(poisoned)?;
            match table.users.get(&user.id) {
                Some(stored) => stored.password_hash.clone(),
                None => return Ok(false),
            }
        };
        Ok(password::verify_password(&hash, password))
    }

    async fn verify_dummy_password(&self, password: &str) -> Result<(), StoreError> {
        let hash = self.dummy_hash()?;
        let _ = password::verify_password(hash, password);
        Ok(())
    }

    async fn count_users_by_role(&self, role_id: RoleId) -> Result<usize, StoreError> {
        let table = self.inner.read().map_err(poisoned)?;
        Ok(table
            .users
            .values()
            .filter(|s| s.user.role_id == role_id)
            .count())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let table = self.inner.read().map_err(poisoned)?;
        Ok(table.users.values().map(|s| s.user.clone()).collect())
    }
}
