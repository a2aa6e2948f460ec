//! Main configuration type.

use serde::{Deserialize, Serialize};

use crate::{AuthorizationConfig, ConfigError, LogFormat, LoggingConfig};

/// Complete Warden configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use warden_config::WardenConfig;
///
/// let config = WardenConfig::default();
/// assert!(!config.authorization.dev_mode);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct WardenConfig {
    /// Authorization configuration.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WardenConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Both `authorization.policy_dir` and `authorization.bundle_path` are set
    /// - `authorization.max_eval_time_ms` is zero
    /// - `logging.level` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.authorization.policy_dir.is_some() && self.authorization.bundle_path.is_some() {
            return Err(ConfigError::invalid(
                "authorization.bundle_path",
                "cannot be combined with authorization.policy_dir",
            ));
        }

        if self.authorization.max_eval_time_ms == 0 {
            return Err(ConfigError::invalid(
                "authorization.max_eval_time_ms",
                "must be greater than zero",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty debug logging, and every call allowed at the protocol default.
    ///
    /// # Example
    ///
    /// ```
    /// use warden_config::WardenConfig;
    ///
    /// let config = WardenConfig::development();
    /// assert!(config.authorization.dev_mode);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config.logging.include_location = true;

        config.authorization.dev_mode = true;
        config.authorization.max_eval_time_ms = 500;

        config
    }

    /// Create a production configuration preset.
    ///
    /// JSON logging and strict builtin errors.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;

        config.authorization.dev_mode = false;
        config.authorization.strict_mode = true;
        config.authorization.max_eval_time_ms = 50;

        config
    }
}
