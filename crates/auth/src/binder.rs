//! Role management: creating roles and converging their grant sets.
//!
//! Every mutation is a single compare-and-swap against the role store, keyed on
//! the version read at the start of the operation. A concurrent writer turns
//! into a `Conflict`; readers never see a half-applied grant set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use backoffice_core::{DomainError, DomainResult, ExpectedVersion, RoleId};

use crate::authorize::CommandAuthorization;
use crate::paging::{DEFAULT_PAGE_SIZE, Page, SortDirection};
use crate::permissions::{self, Catalog};
use crate::store::{RoleStore, UserStore};
use crate::validator::parse_permissions;
use crate::{Permission, Role};

static REQUIRES_CREATE: [Permission; 1] = [permissions::roles::CREATE];
static REQUIRES_EDIT: [Permission; 1] = [permissions::roles::EDIT];
static REQUIRES_DELETE: [Permission; 1] = [permissions::roles::DELETE];

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Create an active role granting exactly `permissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRole {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

/// Replace a role's name, description and whole grant set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRole {
    pub role_id: RoleId,
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableRole {
    pub role_id: RoleId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableRole {
    pub role_id: RoleId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRole {
    pub role_id: RoleId,
}

impl CommandAuthorization for CreateRole {
    fn required_permissions(&self) -> &[Permission] {
        &REQUIRES_CREATE
    }
}

impl CommandAuthorization for UpdateRole {
    fn required_permissions(&self) -> &[Permission] {
        &REQUIRES_EDIT
    }
}

impl CommandAuthorization for EnableRole {
    fn required_permissions(&self) -> &[Permission] {
        &REQUIRES_EDIT
    }
}

impl CommandAuthorization for DisableRole {
    fn required_permissions(&self) -> &[Permission] {
        &REQUIRES_EDIT
    }
}

impl CommandAuthorization for DeleteRole {
    fn required_permissions(&self) -> &[Permission] {
        &REQUIRES_DELETE
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleOrder {
    #[default]
    Name,
    Id,
}

/// Filter, sort and paging options for [`RoleBinder::list_roles`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleQuery {
    /// Case-insensitive substring of the role name.
    pub filter: Option<String>,
    pub order_by: RoleOrder,
    pub direction: SortDirection,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl Default for RoleQuery {
    fn default() -> Self {
        Self {
            filter: None,
            order_by: RoleOrder::Name,
            direction: SortDirection::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Binder
// ─────────────────────────────────────────────────────────────────────────────

/// Applies role commands against the role store.
///
/// The user store is consulted only to refuse deleting a role that is still
/// assigned.
#[derive(Debug, Clone)]
pub struct RoleBinder<R, U> {
    roles: R,
    users: U,
    catalog: &'static Catalog,
}

impl<R, U> RoleBinder<R, U> {
    pub fn new(roles: R, users: U) -> Self {
        Self {
            roles,
            users,
            catalog: Catalog::global(),
        }
    }
}

impl<R, U> RoleBinder<R, U>
where
    R: RoleStore,
    U: UserStore,
{
    pub async fn create_role(&self, cmd: CreateRole) -> DomainResult<Role> {
        let name = required_text("name", &cmd.name)?;
        let description = required_text("description", &cmd.description)?;
        let target = self.target_set(&cmd.permissions)?;

        if self.roles.find_role_by_name(&name).await?.is_some() {
            return Err(DomainError::conflict(format!("role '{name}' already exists")));
        }

        let role = self
            .roles
            .create_role(Role::new(name, description, target))
            .await?;

        info!(
            role_id = %role.id,
            name = %role.name,
            permissions = role.permissions.len(),
            "role created"
        );
        Ok(role)
    }

    /// Full replace of name, description and grants.
    ///
    /// Submitting the role's current state is a no-op and does not bump its
    /// version.
    pub async fn update_role(&self, cmd: UpdateRole) -> DomainResult<Role> {
        let name = required_text("name", &cmd.name)?;
        let description = required_text("description", &cmd.description)?;
        let target = self.target_set(&cmd.permissions)?;

        let current = self.load(cmd.role_id).await?;
        if !current.active {
            return Err(DomainError::state(format!(
                "role '{}' is disabled and cannot be edited",
                current.name
            )));
        }

        if !current.name.eq_ignore_ascii_case(&name) {
            self.ensure_name_free(&name, current.id).await?;
        }

        let diff = current.diff(&target);
        if diff.is_empty() && current.name == name && current.description == description {
            return Ok(current);
        }

        let next = Role {
            name,
            description,
            permissions: target,
            ..current.clone()
        };
        let updated = self
            .roles
            .update_role(next, ExpectedVersion::Exact(current.version))
            .await?;

        info!(
            role_id = %updated.id,
            version = updated.version,
            added = diff.added.len(),
            removed = diff.removed.len(),
            "role updated"
        );
        Ok(updated)
    }

    pub async fn enable_role(&self, cmd: EnableRole) -> DomainResult<Role> {
        let current = self.load(cmd.role_id).await?;
        if current.active {
            return Err(DomainError::state(format!(
                "role '{}' is already enabled",
                current.name
            )));
        }
        self.ensure_name_free(&current.name, current.id).await?;

        let version = current.version;
        let next = Role {
            active: true,
            ..current
        };
        let updated = self
            .roles
            .update_role(next, ExpectedVersion::Exact(version))
            .await?;

        info!(role_id = %updated.id, "role enabled");
        Ok(updated)
    }

    pub async fn disable_role(&self, cmd: DisableRole) -> DomainResult<Role> {
        let current = self.load(cmd.role_id).await?;
        if !current.active {
            return Err(DomainError::state(format!(
                "role '{}' is already disabled",
                current.name
            )));
        }

        let version = current.version;
        let next = Role {
            active: false,
            ..current
        };
        let updated = self
            .roles
            .update_role(next, ExpectedVersion::Exact(version))
            .await?;

        info!(role_id = %updated.id, "role disabled");
        Ok(updated)
    }

    /// Delete a role nobody holds.
    ///
    /// The in-use check and the delete are two store calls; a user assigned to
    /// the role in between is left dangling and is denied by the evaluator.
    pub async fn delete_role(&self, cmd: DeleteRole) -> DomainResult<()> {
        let current = self.load(cmd.role_id).await?;

        let holders = self.users.count_users_by_role(current.id).await?;
        if holders > 0 {
            warn!(role_id = %current.id, holders, "refusing to delete role in use");
            return Err(DomainError::conflict(format!(
                "role '{}' is in use by {holders} user(s)",
                current.name
            )));
        }

        if !self.roles.delete_role(current.id).await? {
            return Err(DomainError::not_found(format!("role {}", current.id)));
        }

        info!(role_id = %current.id, name = %current.name, "role deleted");
        Ok(())
    }

    pub async fn get_role(&self, role_id: RoleId) -> DomainResult<Role> {
        self.load(role_id).await
    }

    pub async fn list_roles(&self, query: RoleQuery) -> DomainResult<Page<Role>> {
        let mut roles = self.roles.list_roles().await?;

        if let Some(filter) = query.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            let needle = filter.to_lowercase();
            roles.retain(|r| r.name.to_lowercase().contains(&needle));
        }

        match query.order_by {
            RoleOrder::Name => roles.sort_by(|a, b| {
                a.name
                    .to_lowercase()
                    .cmp(&b.name.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            }),
            RoleOrder::Id => roles.sort_by(|a, b| a.id.cmp(&b.id)),
        }
        if query.direction == SortDirection::Desc {
            roles.reverse();
        }

        Ok(Page::slice(roles, query.page, query.page_size))
    }

    async fn load(&self, role_id: RoleId) -> DomainResult<Role> {
        self.roles
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("role {role_id}")))
    }

    async fn ensure_name_free(&self, name: &str, owner: RoleId) -> DomainResult<()> {
        match self.roles.find_role_by_name(name).await? {
            Some(other) if other.id != owner => Err(DomainError::conflict(format!(
                "role '{name}' already exists"
            ))),
            _ => Ok(()),
        }
    }

    fn target_set(&self, requested: &[String]) -> DomainResult<BTreeSet<Permission>> {
        if requested.is_empty() {
            return Err(DomainError::validation("a role must grant at least one permission"));
        }
        parse_permissions(self.catalog, requested)
    }
}

fn required_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
