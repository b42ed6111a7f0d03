//! User account administration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use backoffice_core::{DomainError, DomainResult, RoleId, UserId};

use crate::authorize::CommandAuthorization;
use crate::paging::{DEFAULT_PAGE_SIZE, Page, SortDirection};
use crate::permissions;
use crate::store::{RoleStore, UserStore};
use crate::user::{normalize_email, normalize_full_name};
use crate::{NewUser, Permission, Role, User};

static REQUIRES_EDIT: [Permission; 1] = [permissions::users::EDIT];

/// Rename a user and assign its role in one write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUser {
    pub user_id: UserId,
    pub full_name: String,
    pub role_id: RoleId,
}

impl CommandAuthorization for UpdateUser {
    fn required_permissions(&self) -> &[Permission] {
        &REQUIRES_EDIT
    }
}

/// A user together with the role it currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDetails {
    pub user: User,
    pub role: Role,
}

/// One row of [`UserDirectory::list_users`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub full_name: String,
    pub role_name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOrder {
    #[default]
    FullName,
    /// By role name.
    Role,
    Active,
    Id,
}

/// Filter, sort and paging options for [`UserDirectory::list_users`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserQuery {
    /// Case-insensitive substring of the full name.
    pub filter: Option<String>,
    pub order_by: UserOrder,
    pub direction: SortDirection,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            filter: None,
            order_by: UserOrder::FullName,
            direction: SortDirection::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Creates users, toggles their active flag and moves them between roles.
#[derive(Debug, Clone)]
pub struct UserDirectory<U, R> {
    users: U,
    roles: R,
}

impl<U, R> UserDirectory<U, R> {
    pub fn new(users: U, roles: R) -> Self {
        Self { users, roles }
    }
}

impl<U, R> UserDirectory<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    pub async fn create_user(&self, new_user: NewUser) -> DomainResult<User> {
        let new_user = new_user.normalized()?;

        if self.users.find_user_by_email(&new_user.email).await?.is_some() {
            return Err(DomainError::conflict(format!(
                "email '{}' is already registered",
                new_user.email
            )));
        }
        self.ensure_role_exists(new_user.role_id).await?;

        let user = self.users.create_user(new_user).await?;
        info!(user_id = %user.id, role_id = %user.role_id, "user created");
        Ok(user)
    }

    pub async fn enable_user(&self, user_id: UserId) -> DomainResult<User> {
        self.set_active(user_id, true).await
    }

    pub async fn disable_user(&self, user_id: UserId) -> DomainResult<User> {
        self.set_active(user_id, false).await
    }

    /// Point the user at another role. Effective on the user's next request.
    pub async fn change_role(&self, user_id: UserId, role_id: RoleId) -> DomainResult<User> {
        let mut user = self.load(user_id).await?;
        self.ensure_role_exists(role_id).await?;

        if user.role_id == role_id {
            return Ok(user);
        }
        let previous = user.role_id;
        user.role_id = role_id;
        let user = self.users.update_user(user).await?;

        info!(%user_id, from = %previous, to = %role_id, "user role changed");
        Ok(user)
    }

    /// Replace the user's full name and role.
    ///
    /// The name is checked before any lookup; an unknown user is reported
    /// before an unknown role.
    pub async fn update_user(&self, cmd: UpdateUser) -> DomainResult<UserDetails> {
        let full_name = normalize_full_name(&cmd.full_name)?;
        let mut user = self.load(cmd.user_id).await?;
        let role = self
            .roles
            .find_role_by_id(cmd.role_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("role {}", cmd.role_id)))?;

        if user.full_name == full_name && user.role_id == role.id {
            return Ok(UserDetails { user, role });
        }

        let previous_role = user.role_id;
        user.full_name = full_name;
        user.role_id = role.id;
        let user = self.users.update_user(user).await?;

        info!(
            user_id = %user.id,
            from = %previous_role,
            to = %role.id,
            "user updated"
        );
        Ok(UserDetails { user, role })
    }

    /// Users joined with their role names, filtered, sorted and paged.
    ///
    /// Users whose role no longer exists are left out.
    pub async fn list_users(&self, query: UserQuery) -> DomainResult<Page<UserSummary>> {
        let roles: HashMap<RoleId, String> = self
            .roles
            .list_roles()
            .await?
            .into_iter()
            .map(|r| (r.id, r.name))
            .collect();

        let needle = query
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_lowercase);

        let mut rows: Vec<UserSummary> = Vec::new();
        for user in self.users.list_users().await? {
            let Some(role_name) = roles.get(&user.role_id) else {
                warn!(
                    user_id = %user.id,
                    role_id = %user.role_id,
                    "user with dangling role skipped"
                );
                continue;
            };
            let lowered = user.full_name.to_lowercase();
            if needle.as_deref().is_some_and(|n| !lowered.contains(n)) {
                continue;
            }
            rows.push(UserSummary {
                id: user.id,
                full_name: user.full_name,
                role_name: role_name.clone(),
                active: user.active,
            });
        }

        match query.order_by {
            UserOrder::FullName => rows.sort_by(|a, b| {
                a.full_name
                    .to_lowercase()
                    .cmp(&b.full_name.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            }),
            UserOrder::Role => rows.sort_by(|a, b| {
                a.role_name
                    .to_lowercase()
                    .cmp(&b.role_name.to_lowercase())
                    .then_with(|| a.id.cmp(&b.id))
            }),
            UserOrder::Active => rows.sort_by(|a, b| a.active.cmp(&b.active).then(a.id.cmp(&b.id))),
            UserOrder::Id => rows.sort_by_key(|r| r.id),
        }
        if query.direction == SortDirection::Desc {
            rows.reverse();
        }

        Ok(Page::slice(rows, query.page, query.page_size))
    }

    pub async fn get_user(&self, user_id: UserId) -> DomainResult<User> {
        self.load(user_id).await
    }

    pub async fn find_by_email(&self, email: &str) -> DomainResult<Option<User>> {
        Ok(self.users.find_user_by_email(&normalize_email(email)).await?)
    }

    async fn set_active(&self, user_id: UserId, active: bool) -> DomainResult<User> {
        let mut user = self.load(user_id).await?;
        if user.active == active {
            let state = if active { "enabled" } else { "disabled" };
            return Err(DomainError::state(format!("user {user_id} is already {state}")));
        }
        user.active = active;
        let user = self.users.update_user(user).await?;

        info!(%user_id, active, "user active flag changed");
        Ok(user)
    }

    async fn load(&self, user_id: UserId) -> DomainResult<User> {
        self.users
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))
    }

    async fn ensure_role_exists(&self, role_id: RoleId) -> DomainResult<()> {
        match self.roles.find_role_by_id(role_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found(format!("role {role_id}"))),
        }
    }
}
