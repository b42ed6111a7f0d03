//! Credential check and identity token issuance.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use tracing::{error, info, warn};

use backoffice_core::{AuthFailure, Clock, DomainError, DomainResult, RoleId, TokenId, UserId};

use crate::claims::{validate_claims, TokenClaims, TokenValidationError};
use crate::settings::{ConfigError, TokenSettings};
use crate::store::{RoleStore, UserStore};
use crate::user::normalize_email;

/// Turns claims into a compact signed token.
pub trait Signer: Send + Sync {
    fn sign(&self, claims: &TokenClaims) -> DomainResult<String>;
}

/// HMAC-SHA-256 signer and verifier over a shared symmetric key.
#[derive(Clone)]
pub struct Hs256Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
}

impl core::fmt::Debug for Hs256Signer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Hs256Signer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl Hs256Signer {
    /// Fails if `settings` do not validate, so an empty key never signs.
    pub fn new(settings: &TokenSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.key.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.key.as_bytes()),
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
        })
    }

    /// Check signature, issuer and audience, then the time window against `now`.
    pub fn verify(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenClaims, TokenValidationError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        // Lifetime is checked against the injected clock below.
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| TokenValidationError::Rejected(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

impl Signer for Hs256Signer {
    fn sign(&self, claims: &TokenClaims) -> DomainResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| DomainError::Signing(e.to_string()))
    }
}

/// The signed token and its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: TokenId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Who signed in, returned next to the token for display purposes.
///
/// `permissions` reflects the role at issuance time only; authorization never
/// reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySummary {
    pub user_id: UserId,
    pub role_id: RoleId,
    pub role_name: String,
    pub email: String,
    pub full_name: String,
    pub permissions: Vec<String>,
    pub is_verified: bool,
}

/// Authenticates credentials and issues identity tokens.
pub struct TokenIssuer<U, R> {
    users: U,
    roles: R,
    signer: Arc<dyn Signer>,
    clock: Arc<dyn Clock>,
    issuer: String,
    audience: String,
    lifetime: chrono::Duration,
}

impl<U, R> TokenIssuer<U, R> {
    /// HS256 issuer configured from `settings`.
    pub fn new(
        users: U,
        roles: R,
        settings: &TokenSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let signer = Arc::new(Hs256Signer::new(settings)?);
        Self::with_signer(users, roles, settings, signer, clock)
    }

    pub fn with_signer(
        users: U,
        roles: R,
        settings: &TokenSettings,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            users,
            roles,
            signer,
            clock,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            lifetime: settings.duration()?,
        })
    }
}

impl<U, R> TokenIssuer<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    /// Authenticate `email`/`password` and issue a token for the account.
    ///
    /// The password is verified before the active flag is consulted, and a
    /// disabled account is reported as such even when the password matches.
    pub async fn issue_token(
        &self,
        email: &str,
        password: &str,
    ) -> DomainResult<(IssuedToken, IdentitySummary)> {
        let email = normalize_email(email);

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            // Unknown accounts pay the same hashing cost as known ones.
            self.users.verify_dummy_password(password).await?;
            warn!(%email, "token request for unknown account");
            return Err(DomainError::Authentication(AuthFailure::NoAccount));
        };

        let password_ok = self.users.verify_password(&user, password).await?;

        if !user.active {
            warn!(user_id = %user.id, "token request for inactive account");
            return Err(DomainError::Authentication(AuthFailure::InactiveAccount));
        }
        if !password_ok {
            warn!(user_id = %user.id, "token request with invalid credentials");
            return Err(DomainError::Authentication(AuthFailure::InvalidCredentials));
        }

        let Some(role) = self.roles.find_role_by_id(user.role_id).await? else {
            error!(
                user_id = %user.id,
                role_id = %user.role_id,
                "user references a role that does not exist"
            );
            return Err(DomainError::integrity(format!(
                "role {} referenced by user {} does not exist",
                user.role_id, user.id
            )));
        };

        // Claims carry whole seconds; keep the reported instants in step.
        let issued_at = DateTime::from_timestamp(self.clock.now_utc().timestamp(), 0)
            .ok_or_else(|| DomainError::Signing("clock out of range".to_string()))?;
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| DomainError::Signing("token expiry out of range".to_string()))?;
        let token_id = TokenId::new();

        let claims = TokenClaims {
            sub: user.username.clone(),
            jti: token_id.to_string(),
            email: user.email.clone(),
            uid: user.id,
            full_name: user.full_name.clone(),
            role_id: role.id,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            nbf: issued_at.timestamp(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = self.signer.sign(&claims)?;

        info!(
            user_id = %user.id,
            role_id = %role.id,
            %token_id,
            %expires_at,
            "identity token issued"
        );

        let summary = IdentitySummary {
            user_id: user.id,
            role_id: role.id,
            role_name: role.name.clone(),
            email: user.email,
            full_name: user.full_name,
            permissions: role.permission_names(),
            is_verified: user.email_confirmed,
        };

        Ok((
            IssuedToken {
                token,
                token_id,
                issued_at,
                expires_at,
            },
            summary,
        ))
    }
}
