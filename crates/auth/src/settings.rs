//! Token issuance settings.

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_ISSUER: &str = "backoffice";
pub const DEFAULT_AUDIENCE: &str = "backoffice-clients";
pub const DEFAULT_DURATION_MINUTES: i64 = 60;
/// One year.
pub const MAX_DURATION_MINUTES: i64 = 525_600;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Signing key, issuer, audience and lifetime of identity tokens.
#[derive(Clone, Deserialize)]
pub struct TokenSettings {
    pub key: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

fn default_audience() -> String {
    DEFAULT_AUDIENCE.to_string()
}

fn default_duration_minutes() -> i64 {
    DEFAULT_DURATION_MINUTES
}

impl core::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("key", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("duration_minutes", &self.duration_minutes)
            .finish()
    }
}

impl TokenSettings {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            issuer: default_issuer(),
            audience: default_audience(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }

    /// Read `JWT_KEY`, `JWT_ISSUER`, `JWT_AUDIENCE` and `JWT_DURATION_MINUTES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TokenSettings::from_env`] against an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup("JWT_KEY").ok_or(ConfigError::Missing("JWT_KEY"))?;
        let issuer = lookup("JWT_ISSUER").unwrap_or_else(default_issuer);
        let audience = lookup("JWT_AUDIENCE").unwrap_or_else(default_audience);
        let duration_minutes = match lookup("JWT_DURATION_MINUTES") {
            Some(raw) => raw.trim().parse::<i64>().map_err(|e| ConfigError::Invalid {
                name: "JWT_DURATION_MINUTES",
                reason: e.to_string(),
            })?,
            None => DEFAULT_DURATION_MINUTES,
        };

        let settings = Self {
            key,
            issuer,
            audience,
            duration_minutes,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.is_empty() {
            return Err(ConfigError::Invalid {
                name: "key",
                reason: "must not be empty".to_string(),
            });
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "issuer",
                reason: "must not be empty".to_string(),
            });
        }
        if self.audience.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "audience",
                reason: "must not be empty".to_string(),
            });
        }
        if self.duration_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "duration_minutes",
                reason: format!("must be positive, got {}", self.duration_minutes),
            });
        }
        if self.duration_minutes > MAX_DURATION_MINUTES {
            return Err(ConfigError::Invalid {
                name: "duration_minutes",
                reason: format!(
                    "must be at most {MAX_DURATION_MINUTES}, got {}",
                    self.duration_minutes
                ),
            });
        }
        Ok(())
    }

    /// Token lifetime, or an error if `duration_minutes` does not fit a duration.
    pub fn duration(&self) -> Result<chrono::Duration, ConfigError> {
        chrono::Duration::try_minutes(self.duration_minutes).ok_or_else(|| ConfigError::Invalid {
            name: "duration_minutes",
            reason: format!("{} minutes is out of range", self.duration_minutes),
        })
    }
}
