//! Permission catalog.
//!
//! The catalog is the closed universe of permission identifiers, partitioned by
//! [`Module`]. It is built once per process and only ever read.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use backoffice_core::DomainError;

/// Permission identifier (`Permissions.<Module>.<Action>`).
///
/// Values only come from the catalog: the constants below, [`Catalog::resolve`],
/// or deserialization, which rejects identifiers the catalog does not define.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(Cow<'static, str>);

impl Permission {
    const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The module segment of the identifier.
    pub fn module(&self) -> Option<Module> {
        self.as_str().split('.').nth(1)?.parse().ok()
    }

    /// The action segment of the identifier.
    pub fn action(&self) -> &str {
        self.as_str().rsplit('.').next().unwrap_or_default()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Permission {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for Permission {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Catalog::global()
            .resolve(&value)
            .ok_or_else(|| DomainError::validation(format!("unknown permission '{value}'")))
    }
}

impl core::str::FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0.into_owned()
    }
}

pub mod dashboard {
    use super::Permission;

    pub const VIEW: Permission = Permission::from_static("Permissions.Dashboard.View");
}

pub mod users {
    use super::Permission;

    pub const VIEW: Permission = Permission::from_static("Permissions.Users.View");
    pub const CREATE: Permission = Permission::from_static("Permissions.Users.Create");
    pub const EDIT: Permission = Permission::from_static("Permissions.Users.Edit");
    pub const DELETE: Permission = Permission::from_static("Permissions.Users.Delete");
}

pub mod roles {
    use super::Permission;

    pub const VIEW: Permission = Permission::from_static("Permissions.Roles.View");
    pub const CREATE: Permission = Permission::from_static("Permissions.Roles.Create");
    pub const EDIT: Permission = Permission::from_static("Permissions.Roles.Edit");
    pub const DELETE: Permission = Permission::from_static("Permissions.Roles.Delete");
}

pub mod products {
    use super::Permission;

    pub const VIEW: Permission = Permission::from_static("Permissions.Products.View");
    pub const CREATE: Permission = Permission::from_static("Permissions.Products.Create");
    pub const EDIT: Permission = Permission::from_static("Permissions.Products.Edit");
    pub const DELETE: Permission = Permission::from_static("Permissions.Products.Delete");
}

static DASHBOARD: [Permission; 1] = [dashboard::VIEW];
static USERS: [Permission; 4] = [users::VIEW, users::CREATE, users::EDIT, users::DELETE];
static ROLES: [Permission; 4] = [roles::VIEW, roles::CREATE, roles::EDIT, roles::DELETE];
static PRODUCTS: [Permission; 4] = [
    products::VIEW,
    products::CREATE,
    products::EDIT,
    products::DELETE,
];

/// Named grouping of permissions.
///
/// `All` is synthetic: it scopes a catalog query to every concrete module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Module {
    Dashboard,
    Users,
    Roles,
    Products,
    All,
}

impl Module {
    /// Concrete modules, in catalog order.
    pub const CONCRETE: [Module; 4] = [
        Module::Users,
        Module::Roles,
        Module::Products,
        Module::Dashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Dashboard => "Dashboard",
            Module::Users => "Users",
            Module::Roles => "Roles",
            Module::Products => "Products",
            Module::All => "All",
        }
    }

    fn declared(&self) -> &'static [Permission] {
        match self {
            Module::Dashboard => &DASHBOARD,
            Module::Users => &USERS,
            Module::Roles => &ROLES,
            Module::Products => &PRODUCTS,
            Module::All => &[],
        }
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Module {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Dashboard" => Ok(Module::Dashboard),
            "Users" => Ok(Module::Users),
            "Roles" => Ok(Module::Roles),
            "Products" => Ok(Module::Products),
            "All" => Ok(Module::All),
            other => Err(DomainError::UnknownModule(other.to_string())),
        }
    }
}

/// Catalog entry with display metadata, for role-edit screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionDefinition {
    pub name: Permission,
    pub module: Module,
    pub description: String,
}

/// The complete, read-only permission universe.
#[derive(Debug)]
pub struct Catalog {
    all: Vec<Permission>,
    index: HashMap<&'static str, Permission>,
}

impl Catalog {
    /// The process-wide catalog.
    pub fn global() -> &'static Catalog {
        static CATALOG: OnceLock<Catalog> = OnceLock::new();
        CATALOG.get_or_init(Catalog::build)
    }

    fn build() -> Self {
        let all: Vec<Permission> = Module::CONCRETE
            .iter()
            .flat_map(|m| m.declared().iter().cloned())
            .collect();
        let index = Module::CONCRETE
            .iter()
            .flat_map(|m| m.declared().iter())
            .map(|p| (p.as_str(), p.clone()))
            .collect();
        Self { all, index }
    }

    /// Union of every module's permissions, in catalog order.
    pub fn all_permissions(&self) -> &[Permission] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn permissions_for_module(&self, module: Module) -> &[Permission] {
        match module {
            Module::All => &self.all,
            concrete => concrete.declared(),
        }
    }

    /// Resolve a module by name, failing loudly on names outside the closed set.
    pub fn permissions_for_module_name(&self, module: &str) -> Result<&[Permission], DomainError> {
        let module: Module = module.parse()?;
        Ok(self.permissions_for_module(module))
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.index.contains_key(permission)
    }

    pub fn resolve(&self, permission: &str) -> Option<Permission> {
        self.index.get(permission).cloned()
    }

    pub fn definitions(&self) -> Vec<PermissionDefinition> {
        Module::CONCRETE
            .iter()
            .flat_map(|module| {
                module.declared().iter().map(move |p| PermissionDefinition {
                    name: p.clone(),
                    module: *module,
                    description: describe(p, *module),
                })
            })
            .collect()
    }
}

fn describe(permission: &Permission, module: Module) -> String {
    let action = match permission.action() {
        "View" => "View",
        "Create" => "Create new",
        "Edit" => "Edit",
        "Delete" => "Delete",
        other => other,
    };
    format!("{} {}", action, module.as_str().to_lowercase())
}
