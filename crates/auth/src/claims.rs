use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_core::{RoleId, UserId};

/// Identity token claims.
///
/// Carries who the subject is and which role it holds, never what the role
/// grants. Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Stable username.
    pub sub: String,

    /// Unique token id.
    pub jti: String,

    pub email: String,

    pub uid: UserId,

    pub full_name: String,

    pub role_id: RoleId,

    pub iss: String,

    pub aud: String,

    /// Not-before (issuance time).
    pub nbf: i64,

    pub iat: i64,

    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (nbf is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= nbf)")]
    InvalidTimeWindow,

    /// Bad signature, issuer, audience, or encoding.
    #[error("token rejected: {0}")]
    Rejected(String),
}

/// Deterministically validate the claims' time window against `now`.
///
/// Note: this validates the *claims* only. Signature verification / decoding is
/// done by [`crate::token::Hs256Signer::verify`].
pub fn validate_claims(
    claims: &TokenClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.nbf {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.nbf {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
