//! Validation of caller-submitted permission lists.

use std::collections::BTreeSet;

use backoffice_core::{DomainError, DomainResult};

use crate::permissions::{Catalog, Permission};

/// Decide whether `requested` may be granted to a role.
///
/// Oversized batches are rejected before the membership scan. Duplicates are
/// accepted here; [`parse_permissions`] collapses them.
pub fn validate<S: AsRef<str>>(catalog: &Catalog, requested: &[S]) -> bool {
    if requested.len() > catalog.len() {
        return false;
    }
    requested.iter().all(|p| catalog.contains(p.as_ref()))
}

/// Validate and convert `requested` into a de-duplicated, typed set.
pub fn parse_permissions<S: AsRef<str>>(
    catalog: &Catalog,
    requested: &[S],
) -> DomainResult<BTreeSet<Permission>> {
    if requested.len() > catalog.len() {
        return Err(DomainError::validation(format!(
            "too many permissions: {} requested, catalog defines {}",
            requested.len(),
            catalog.len()
        )));
    }

    requested
        .iter()
        .map(|p| {
            let name = p.as_ref();
            catalog
                .resolve(name)
                .ok_or_else(|| DomainError::validation(format!("unknown permission '{name}'")))
        })
        .collect()
}
