//! Configuration sections.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Per-query evaluation budget when none is configured.
pub const DEFAULT_MAX_EVAL_TIME_MS: u64 = 100;

/// `[authorization]`: where the policy comes from and how it is evaluated.
///
/// At most one of `policy_dir` and `bundle_path` may be set. With neither,
/// the built-in trait policy is used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Directory tree of Rego modules and data documents.
    pub policy_dir: Option<PathBuf>,

    /// OPA `.tar.gz` policy bundle.
    pub bundle_path: Option<PathBuf>,

    /// Allow every call at the protocol default scope.
    pub dev_mode: bool,

    /// Abort evaluation on builtin errors instead of yielding undefined.
    pub strict_mode: bool,

    /// Budget for a single scope query.
    pub max_eval_time_ms: u64,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            policy_dir: None,
            bundle_path: None,
            dev_mode: false,
            strict_mode: false,
            max_eval_time_ms: DEFAULT_MAX_EVAL_TIME_MS,
        }
    }
}

impl AuthorizationConfig {
    /// The configured policy location, if any. Bundles win over directories.
    pub fn policy_location(&self) -> Option<&Path> {
        self.bundle_path.as_deref().or(self.policy_dir.as_deref())
    }
}

/// Shape of emitted log lines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line, human-readable.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            _ => Err(()),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Install a log subscriber at all.
    pub enabled: bool,

    /// Filter directives, e.g. `info` or `warden_authz=debug,info`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Include source file and line.
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
        }
    }
}
