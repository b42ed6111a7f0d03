//! `backoffice-auth` — permission catalog, role binding, token issuance and
//! per-request authorization.
//!
//! This crate is intentionally decoupled from HTTP and storage; persistence is
//! reached through the [`RoleStore`] and [`UserStore`] traits.

pub mod authorize;
pub mod binder;
pub mod claims;
pub mod directory;
pub mod paging;
pub mod permissions;
pub mod roles;
pub mod settings;
pub mod store;
pub mod token;
pub mod user;
pub mod validator;

pub use authorize::{
    AuthorizationExplanation, Authorizer, CommandAuthorization, Decision, DenialKind, SubjectState,
};
pub use binder::{
    CreateRole, DeleteRole, DisableRole, EnableRole, RoleBinder, RoleOrder, RoleQuery, UpdateRole,
};
pub use claims::{validate_claims, TokenClaims, TokenValidationError};
pub use directory::{UpdateUser, UserDetails, UserDirectory, UserOrder, UserQuery, UserSummary};
pub use paging::{Page, SortDirection};
pub use permissions::{Catalog, Module, Permission, PermissionDefinition};
pub use roles::{PermissionDiff, Role};
pub use settings::{ConfigError, TokenSettings};
pub use store::{RoleStore, StoreError, UserStore};
pub use token::{Hs256Signer, IdentitySummary, IssuedToken, Signer, TokenIssuer};
pub use user::{NewUser, User};
pub use validator::{parse_permissions, validate};
