use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use backoffice_auth::{Role, RoleStore, StoreError};
use backoffice_core::{ExpectedVersion, RoleId};

use super::poisoned;

/// In-memory role store.
///
/// Each write replaces the whole role under the write lock, so readers see
/// either the previous value or the new one.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<HashMap<RoleId, Role>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn active_name_taken(roles: &HashMap<RoleId, Role>, name: &str, except: RoleId) -> bool {
        roles
            .values()
            .any(|r| r.active && r.id != except && r.name.to_lowercase() == name.to_lowercase())
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn find_role_by_id(&self, role_id: RoleId) -> Result<Option<Role>, StoreError> {
        let roles = self.roles.read().map_err(poisoned)?;
        Ok(roles.get(&role_id).cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let needle = name.trim().to_lowercase();
        let roles = self.roles.read().map_err(poisoned)?;
        Ok(roles
            .values()
            .find(|r| r.active && r.name.to_lowercase() == needle)
            .cloned())
    }

    async fn create_role(&self, mut role: Role) -> Result<Role, StoreError> {
        let mut roles = self.roles.write().map_err(poisoned)?;

        if roles.contains_key(&role.id) {
            return Err(StoreError::Conflict(format!("role {} already exists", role.id)));
        }
        if role.active && Self::active_name_taken(&roles, &role.name, role.id) {
            return Err(StoreError::Conflict(format!(
                "an active role named '{}' already exists",
                role.name
            )));
        }

        role.version = 1;
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn update_role(
        &self,
        mut role: Role,
        expected_version: ExpectedVersion,
    ) -> Result<Role, StoreError> {
        let mut roles = self.roles.write().map_err(poisoned)?;

        let current = roles
            .get(&role.id)
            .map(|r| r.version)
            .ok_or_else(|| StoreError::NotFound(format!("role {}", role.id)))?;

        if !expected_version.matches(current) {
            debug!(
                role_id = %role.id,
                expected = ?expected_version,
                found = current,
                "stale role write rejected"
            );
            return Err(StoreError::Concurrency(format!(
                "role {}: expected {expected_version:?}, found {current}",
                role.id
            )));
        }
        if role.active && Self::active_name_taken(&roles, &role.name, role.id) {
            return Err(StoreError::Conflict(format!(
                "an active role named '{}' already exists",
                role.name
            )));
        }

        role.version = current + 1;
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn delete_role(&self, role_id: RoleId) -> Result<bool, StoreError> {
        let mut roles = self.roles.write().map_err(poisoned)?;
        Ok(roles.remove(&role_id).is_some())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let roles = self.roles.read().map_err(poisoned)?;
        Ok(roles.values().cloned().collect())
    }
}
