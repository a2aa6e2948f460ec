//! Error types for the authorization crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors that can occur during authorization.
///
/// Only [`AuthzError::Unauthenticated`] and [`AuthzError::PermissionDenied`]
/// describe an authorization outcome. Every other variant means the decision
/// could not be determined, or a policy could not be constructed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// The call was denied and the caller presented no valid credential.
    #[error("unauthenticated: {service}/{method} requires a valid credential")]
    Unauthenticated {
        /// Service that was called.
        service: String,
        /// Method that was called.
        method: String,
    },

    /// The call was denied and the caller's credential was valid.
    #[error("permission denied: {service}/{method}")]
    PermissionDenied {
        /// Service that was called.
        service: String,
        /// Method that was called.
        method: String,
    },

    /// The caller cancelled the call while it was being authorized.
    #[error("authorization cancelled")]
    Cancelled,

    /// The caller's deadline expired while the call was being authorized.
    #[error("authorization deadline exceeded")]
    DeadlineExceeded,

    /// Policy evaluation failed.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),

    /// A query produced a value that is not a boolean.
    #[error("query {query} produced a non-boolean verdict: {value}")]
    NonBooleanVerdict {
        /// The query that was evaluated.
        query: String,
        /// The value it produced.
        value: serde_json::Value,
    },

    /// Invalid policy input.
    #[error("invalid policy input: {0}")]
    InvalidInput(String),

    /// Bundle loading failed.
    #[error("failed to load bundle from {path}: {message}")]
    BundleLoad {
        /// Path to the bundle.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Bundle parsing failed.
    #[error("failed to parse bundle: {0}")]
    BundleParse(String),

    /// A policy module or data document failed to compile.
    #[error("failed to compile {path}: {message}")]
    Compile {
        /// Bundle path of the module or data file.
        path: String,
        /// Compiler message.
        message: String,
    },

    /// Two modules declare the same package.
    #[error("package {package} declared by both {first} and {second}")]
    DuplicatePackage {
        /// The package name.
        package: String,
        /// First module declaring it.
        first: String,
        /// Second module declaring it.
        second: String,
    },

    /// A module declares a package that does not live under its directory.
    #[error("module {path} declares package {package} outside its directory")]
    PackageOutsideDirectory {
        /// Bundle path of the module.
        path: String,
        /// The declared package.
        package: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthzError {
    /// Create a bundle load error.
    pub fn bundle_load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::BundleLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a compile error.
    pub fn compile(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Compile {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Check if this is an unauthenticated error.
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// Check if this is a permission denied error.
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Check if this error is an authorization outcome rather than a failure
    /// to reach one.
    pub const fn is_denial(&self) -> bool {
        self.is_unauthenticated() || self.is_permission_denied()
    }
}
