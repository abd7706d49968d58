//! Controller configuration.

use serde::{Deserialize, Serialize};

use crate::Policy;

/// Prompt text used when none is configured.
pub const DEFAULT_REASON: &str = "Authenticate using your biometric data";

/// Errors that can occur when loading an [`AuthConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The input was not valid JSON for this shape.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// The prompt reason was blank.
    #[error("reason cannot be empty")]
    EmptyReason,
}

/// What the controller evaluates and what it tells the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Policy used by `authenticate` and `permit_and_auth`.
    pub policy: Policy,
    /// Localized prompt text, passed through to the provider verbatim.
    pub reason: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            policy: Policy::BiometricsOnly,
            reason: DEFAULT_REASON.to_owned(),
        }
    }
}

impl AuthConfig {
    /// Creates a configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyReason`] if `reason` is blank.
    pub fn new(policy: Policy, reason: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            policy,
            reason: reason.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the reason is blank.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration can be used for prompting.
    ///
    /// # Errors
    /// Returns [`ConfigError::EmptyReason`] if the reason is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reason.trim().is_empty() {
            return Err(ConfigError::EmptyReason);
        }
        Ok(())
    }
}
