//! Configuration errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::Format;

/// Why a configuration could not be produced.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was requested.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A document was not valid for its format or named an unknown field.
    #[error("invalid {format} in {origin}: {message}")]
    Syntax {
        /// File path, or `<string>` for inline documents.
        origin: String,
        /// Format the document was parsed as.
        format: Format,
        /// Parser message.
        message: String,
    },

    /// The document format could not be determined.
    #[error("unsupported configuration format `{0}`")]
    UnsupportedFormat(String),

    /// A field holds a value the authorizer cannot use.
    #[error("{field}: {reason}")]
    Invalid {
        /// Dotted field path, e.g. `authorization.max_eval_time_ms`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// An environment override could not be parsed.
    #[error("{var}={value:?}: expected {expected}")]
    Env {
        /// Variable name including prefix.
        var: String,
        /// Raw value.
        value: String,
        /// Accepted forms.
        expected: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn env(var: &str, value: &str, expected: &'static str) -> Self {
        Self::Env {
            var: var.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    /// Whether a requested file did not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
