//! Configuration document formats.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, WardenConfig};

/// Serialization format of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// TOML, the usual on-disk form.
    Toml,
    /// JSON, for generated configuration.
    Json,
}

impl Format {
    /// Format implied by a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        ext.parse()
            .map_err(|_| ConfigError::UnsupportedFormat(path.display().to_string()))
    }

    /// Parse `content` into a configuration. `origin` names the document in errors.
    pub fn parse(self, content: &str, origin: &str) -> Result<WardenConfig, ConfigError> {
        let syntax = |message: String| ConfigError::Syntax {
            origin: origin.to_string(),
            format: self,
            message,
        };
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| syntax(e.message().to_string())),
            Self::Json => serde_json::from_str(content).map_err(|e| syntax(e.to_string())),
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        })
    }
}
