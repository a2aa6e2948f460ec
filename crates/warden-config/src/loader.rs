//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ConfigError, Format, WardenConfig};

/// Builds a [`WardenConfig`] from a preset, an optional document and
/// environment overrides, in that order.
///
/// A document replaces the configuration loaded before it; fields it omits
/// take their defaults rather than the preset's values.
///
/// ```no_run
/// use warden_config::ConfigLoader;
///
/// # fn main() -> Result<(), warden_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("warden.toml")?
///     .with_env_prefix("WARDEN")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: WardenConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Start from [`WardenConfig::default`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from [`WardenConfig::development`].
    ///
    /// ```
    /// use warden_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert!(config.authorization.dev_mode);
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = WardenConfig::development();
        self
    }

    /// Start from [`WardenConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = WardenConfig::production();
        self
    }

    /// Read a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnsupportedFormat`] for other extensions,
    /// [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Syntax`] if it does not parse.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.config = format.parse(&content, &path.display().to_string())?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Any error of `with_file` other than the file not existing.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(self),
            _ => self.with_file(path),
        }
    }

    /// Parse an inline document; `format` is `"toml"` or `"json"`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnsupportedFormat`] or [`ConfigError::Syntax`].
    ///
    /// ```
    /// use warden_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[authorization]\npolicy_dir = \"/etc/warden/policy\"", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert!(config.authorization.policy_dir.is_some());
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = format.parse::<Format>()?.parse(content, "<string>")?;
        Ok(self)
    }

    /// Read overrides named `PREFIX__SECTION__KEY` when loading, e.g.
    /// `WARDEN__AUTHORIZATION__POLICY_DIR=/etc/warden/policy`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Env`] for an unparsable override, or whatever
    /// [`WardenConfig::validate`] reports.
    pub fn load(mut self) -> Result<WardenConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let mut vars: Vec<(String, String)> =
                env::vars().filter(|(k, _)| k.starts_with(&prefix)).collect();
            vars.sort();
            for (var, value) in vars {
                self.apply_env_var(&var, &value, &prefix)?;
            }
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// The configuration as loaded so far, without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> WardenConfig {
        self.config
    }

    fn apply_env_var(&mut self, var: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        // WARDENX shares the prefix but not the separator.
        let Some(key) = var.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };

        let flag = || parse_bool(value).ok_or_else(|| ConfigError::env(var, value, "a boolean"));
        let auth = &mut self.config.authorization;
        let logging = &mut self.config.logging;

        match key {
            "AUTHORIZATION__POLICY_DIR" => auth.policy_dir = optional_path(value),
            "AUTHORIZATION__BUNDLE_PATH" => auth.bundle_path = optional_path(value),
            "AUTHORIZATION__DEV_MODE" => auth.dev_mode = flag()?,
            "AUTHORIZATION__STRICT_MODE" => auth.strict_mode = flag()?,
            "AUTHORIZATION__MAX_EVAL_TIME_MS" => {
                auth.max_eval_time_ms = value
                    .parse()
                    .map_err(|_| ConfigError::env(var, value, "milliseconds"))?;
            }
            "LOGGING__ENABLED" => logging.enabled = flag()?,
            "LOGGING__LEVEL" => logging.level = value.to_string(),
            "LOGGING__FORMAT" => {
                logging.format = value
                    .parse()
                    .map_err(|()| ConfigError::env(var, value, "`json` or `pretty`"))?;
            }
            "LOGGING__INCLUDE_LOCATION" => logging.include_location = flag()?,
            _ => {}
        }

        Ok(())
    }
}

/// Empty clears the path.
fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
