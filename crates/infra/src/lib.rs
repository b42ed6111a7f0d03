//! Infrastructure layer: in-memory persistence and credential hashing.

pub mod password;
pub mod store;

pub use store::{InMemoryRoleStore, InMemoryUserStore};

#[cfg(test)]
mod integration_tests;
