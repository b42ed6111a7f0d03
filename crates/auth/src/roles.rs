//! Role model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use backoffice_core::RoleId;

use crate::Permission;

/// A named, versioned set of granted permissions.
///
/// # Invariants
/// - Every granted permission came from the catalog (the type guarantees it).
/// - Among active roles, names are unique (enforced by the binder and the store).
/// - `version` is bumped by the store on every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub active: bool,
    pub permissions: BTreeSet<Permission>,
    pub version: u64,
}

impl Role {
    /// A fresh, active role that has not been stored yet.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        permissions: BTreeSet<Permission>,
    ) -> Self {
        Self {
            id: RoleId::new(),
            name: name.into(),
            description: description.into(),
            active: true,
            permissions,
            version: 0,
        }
    }

    pub fn grants(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Edit script that turns the current grant set into `target`.
    pub fn diff(&self, target: &BTreeSet<Permission>) -> PermissionDiff {
        PermissionDiff {
            added: target.difference(&self.permissions).cloned().collect(),
            removed: self.permissions.difference(target).cloned().collect(),
        }
    }

    pub fn permission_names(&self) -> Vec<String> {
        self.permissions.iter().map(|p| p.to_string()).collect()
    }
}

/// Grants to add and revoke when converging a role to a target set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PermissionDiff {
    pub added: BTreeSet<Permission>,
    pub removed: BTreeSet<Permission>,
}

impl PermissionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
