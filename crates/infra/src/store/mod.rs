//! In-memory role and user stores for tests/dev.

pub mod roles;
pub mod users;

pub use roles::InMemoryRoleStore;
pub use users::InMemoryUserStore;

use backoffice_auth::StoreError;

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}
