//! Per-request authorization decisions.
//!
//! Decisions are made from live store state on every call: user → role →
//! granted permissions. Nothing is cached and nothing is read from the token
//! beyond the subject's user id, so role edits and role disablement take effect
//! on the very next request.

use serde::Serialize;
use tracing::{debug, error};

use backoffice_core::{DomainResult, RoleId, UserId};

use crate::claims::TokenClaims;
use crate::store::{RoleStore, UserStore};
use crate::Permission;

/// Allow/deny outcome for a single guarded operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Command-side authorization contract (checked at the command boundary).
///
/// Implement this on commands that require permissions.
/// The request boundary should enforce these requirements before dispatching.
pub trait CommandAuthorization {
    fn required_permissions(&self) -> &[Permission];
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    /// The permission that was being checked.
    pub required_permission: String,

    pub decision: Decision,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// What was resolved for the subject, as far as resolution got.
    pub subject: Option<SubjectState>,

    /// Set when the decision is `Deny`.
    pub denial: Option<DenialKind>,
}

/// State of the subject at decision time.
#[derive(Debug, Clone, Serialize)]
pub struct SubjectState {
    pub user_id: UserId,
    pub user_active: bool,
    pub role_id: RoleId,
    pub role_name: Option<String>,
    pub role_active: Option<bool>,
    pub effective_permissions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    /// No subject id on the request (anonymous or malformed token).
    AnonymousSubject,
    /// The subject id does not resolve to a user.
    UnknownUser,
    InactiveUser,
    /// The user references a role that does not exist.
    DanglingRole,
    InactiveRole,
    MissingPermission,
}

impl AuthorizationExplanation {
    fn deny(
        required: &Permission,
        kind: DenialKind,
        reason: String,
        subject: Option<SubjectState>,
    ) -> Self {
        Self {
            required_permission: required.to_string(),
            decision: Decision::Deny,
            reason,
            subject,
            denial: Some(kind),
        }
    }
}

/// Resolves subjects against the stores and renders decisions.
#[derive(Debug, Clone)]
pub struct Authorizer<U, R> {
    users: U,
    roles: R,
}

impl<U, R> Authorizer<U, R> {
    pub fn new(users: U, roles: R) -> Self {
        Self { users, roles }
    }
}

impl<U, R> Authorizer<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    /// `Allow` iff the subject's current role is active and grants `required`.
    ///
    /// Absence of a subject or of the records it points to is a `Deny`, not an
    /// error. `Err` is reserved for store failures.
    pub async fn authorize(
        &self,
        subject: Option<UserId>,
        required: &Permission,
    ) -> DomainResult<Decision> {
        Ok(self.explain(subject, required).await?.decision)
    }

    /// Authorize using the verified claims of the request, if any.
    pub async fn authorize_claims(
        &self,
        claims: Option<&TokenClaims>,
        required: &Permission,
    ) -> DomainResult<Decision> {
        self.authorize(claims.map(|c| c.uid), required).await
    }

    /// Authorize from a raw `uid` claim value. An unparsable value is `Deny`.
    pub async fn authorize_claim(
        &self,
        uid: Option<&str>,
        required: &Permission,
    ) -> DomainResult<Decision> {
        let subject = uid.and_then(|raw| raw.trim().parse::<UserId>().ok());
        if uid.is_some() && subject.is_none() {
            debug!(permission = %required, "denied: malformed uid claim");
        }
        self.authorize(subject, required).await
    }

    /// `Allow` iff every permission the command declares is allowed.
    pub async fn authorize_command<C: CommandAuthorization>(
        &self,
        subject: Option<UserId>,
        command: &C,
    ) -> DomainResult<Decision> {
        for required in command.required_permissions() {
            if self.authorize(subject, required).await? == Decision::Deny {
                return Ok(Decision::Deny);
            }
        }
        Ok(Decision::Allow)
    }

    /// Explain why an authorization decision is made.
    pub async fn explain(
        &self,
        subject: Option<UserId>,
        required: &Permission,
    ) -> DomainResult<AuthorizationExplanation> {
        let Some(user_id) = subject else {
            debug!(permission = %required, "denied: anonymous subject");
            return Ok(AuthorizationExplanation::deny(
                required,
                DenialKind::AnonymousSubject,
                "request carries no subject".to_string(),
                None,
            ));
        };

        let Some(user) = self.users.find_user_by_id(user_id).await? else {
            debug!(%user_id, permission = %required, "denied: unknown user");
            return Ok(AuthorizationExplanation::deny(
                required,
                DenialKind::UnknownUser,
                format!("user {user_id} does not exist"),
                None,
            ));
        };

        let mut state = SubjectState {
            user_id,
            user_active: user.active,
            role_id: user.role_id,
            role_name: None,
            role_active: None,
            effective_permissions: Vec::new(),
        };

        if !user.active {
            debug!(%user_id, permission = %required, "denied: inactive user");
            return Ok(AuthorizationExplanation::deny(
                required,
                DenialKind::InactiveUser,
                format!("user {user_id} is disabled"),
                Some(state),
            ));
        }

        let Some(role) = self.roles.find_role_by_id(user.role_id).await? else {
            error!(
                %user_id,
                role_id = %user.role_id,
                "user references a role that does not exist"
            );
            return Ok(AuthorizationExplanation::deny(
                required,
                DenialKind::DanglingRole,
                format!("role {} referenced by user {user_id} does not exist", user.role_id),
                Some(state),
            ));
        };

        state.role_name = Some(role.name.clone());
        state.role_active = Some(role.active);
        state.effective_permissions = role.permission_names();

        if !role.active {
            debug!(%user_id, role_id = %role.id, permission = %required, "denied: role disabled");
            return Ok(AuthorizationExplanation::deny(
                required,
                DenialKind::InactiveRole,
                format!("role '{}' is disabled", role.name),
                Some(state),
            ));
        }

        if role.grants(required) {
            Ok(AuthorizationExplanation {
                required_permission: required.to_string(),
                decision: Decision::Allow,
                reason: format!("role '{}' grants '{}'", role.name, required),
                subject: Some(state),
                denial: None,
            })
        } else {
            debug!(
                %user_id,
                role_id = %role.id,
                permission = %required,
                "denied: missing permission"
            );
            Ok(AuthorizationExplanation::deny(
                required,
                DenialKind::MissingPermission,
                format!("role '{}' does not grant '{}'", role.name, required),
                Some(state),
            ))
        }
    }
}
