//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Which credential check rejected an authentication attempt.
///
/// Kept for logs and tests. Callers facing the outside world should render
/// [`DomainError::public_message`] instead, which is the same for every variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    NoAccount,
    InactiveAccount,
    InvalidCredentials,
}

impl core::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AuthFailure::NoAccount => f.write_str("no account"),
            AuthFailure::InactiveAccount => f.write_str("inactive account"),
            AuthFailure::InvalidCredentials => f.write_str("invalid credentials"),
        }
    }
}

/// Domain-level error.
///
/// Every variant is a deterministic, typed outcome the caller can match on.
/// "No permission" is never an error; the evaluator returns a `Deny` decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-catalog input, correctable by the caller.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced role or user does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Name collision, role still in use, or a lost optimistic-concurrency race.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The operation is invalid for the current active/inactive state.
    #[error("invalid state: {0}")]
    State(String),

    /// Credential resolution failed.
    #[error("authentication failed: {0}")]
    Authentication(AuthFailure),

    /// A module name outside the closed set was used against the catalog.
    #[error("unknown module: {0}")]
    UnknownModule(String),

    /// Stored data violates a cross-entity invariant (e.g. a user pointing at a missing role).
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// The backing store failed.
    #[error("store failure: {0}")]
    Store(String),

    /// A token could not be signed with the configured key.
    #[error("token signing failed: {0}")]
    Signing(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Stable, machine-checkable error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound(_) => "not_found",
            DomainError::Conflict(_) => "conflict",
            DomainError::State(_) => "invalid_state",
            DomainError::Authentication(_) => "not_authorized",
            DomainError::UnknownModule(_) => "unknown_module",
            DomainError::Integrity(_) => "integrity_violation",
            DomainError::Store(_) => "store_error",
            DomainError::Signing(_) => "signing_error",
        }
    }

    /// Message safe to show outside the trust boundary.
    ///
    /// Authentication failures collapse to one message so responses cannot be
    /// used to enumerate accounts.
    pub fn public_message(&self) -> String {
        match self {
            DomainError::Authentication(_) => "not authorized".to_string(),
            DomainError::Integrity(_) | DomainError::Store(_) | DomainError::Signing(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        }
    }
}
