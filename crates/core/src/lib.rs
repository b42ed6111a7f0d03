//! `backoffice-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod clock;
pub mod concurrency;
pub mod error;
pub mod id;

pub use clock::{Clock, FixedClock, SystemClock};
pub use concurrency::ExpectedVersion;
pub use error::{AuthFailure, DomainError, DomainResult};
pub use id::{RoleId, TokenId, UserId};
