//! Building authorizers from configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, instrument, warn};
use warden_authz::{
    default_policy_with_config, Authorizer, AuthzResult, EvaluatorConfig, RegoPolicy,
    TraitRegistry,
};
use warden_config::{AuthorizationConfig, LogFormat, LoggingConfig};
use warden_telemetry::{LogConfig, TelemetryResult};

/// Where the active policy comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    /// An OPA `.tar.gz` bundle.
    Bundle(PathBuf),
    /// A directory tree of modules and data documents.
    Directory(PathBuf),
    /// The built-in trait policy.
    Default {
        /// Whether every call is allowed at the protocol default.
        dev_mode: bool,
    },
}

impl PolicySource {
    /// Select the source named by `config`: bundle, then directory, then
    /// the built-in policy.
    pub fn from_config(config: &AuthorizationConfig) -> Self {
        if let Some(path) = &config.bundle_path {
            Self::Bundle(path.clone())
        } else if let Some(path) = &config.policy_dir {
            Self::Directory(path.clone())
        } else {
            Self::Default {
                dev_mode: config.dev_mode,
            }
        }
    }

    /// Label used in logs and metrics.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bundle(_) => "bundle",
            Self::Directory(_) => "directory",
            Self::Default { .. } => "default",
        }
    }
}

/// Evaluator settings carried by the authorization section.
pub fn evaluator_config(config: &AuthorizationConfig) -> EvaluatorConfig {
    EvaluatorConfig::new()
        .with_strict_builtins(config.strict_mode)
        .with_query_timeout(Duration::from_millis(config.max_eval_time_ms))
}

/// Build the policy named by `config`.
///
/// `registry` is only consulted for the built-in policy.
#[instrument(skip_all)]
pub async fn load_policy(
    config: &AuthorizationConfig,
    registry: &TraitRegistry,
) -> AuthzResult<RegoPolicy> {
    let source = PolicySource::from_config(config);
    let evaluator = evaluator_config(config);

    if config.dev_mode && !matches!(source, PolicySource::Default { .. }) {
        warn!(source = source.label(), "dev_mode only applies to the built-in policy");
    }

    let result = match &source {
        PolicySource::Bundle(path) => RegoPolicy::from_bundle_file(path, evaluator).await,
        PolicySource::Directory(path) => RegoPolicy::from_fs_with_config(path, evaluator),
        PolicySource::Default { dev_mode } => {
            default_policy_with_config(registry, *dev_mode, evaluator)
        }
    };

    warden_telemetry::record_policy_load(source.label(), result.is_ok());
    match &result {
        Ok(policy) => info!(
            source = source.label(),
            revision = %policy.bundle_metadata().revision,
            packages = policy.packages().len(),
            "policy loaded"
        ),
        Err(e) => error!(source = source.label(), error = %e, "policy load failed"),
    }

    result
}

/// Build an [`Authorizer`] serving the policy named by `config`.
pub async fn authorizer_from_config(
    config: &AuthorizationConfig,
    registry: &TraitRegistry,
) -> AuthzResult<Authorizer> {
    let policy = load_policy(config, registry).await?;
    Ok(Authorizer::new(policy))
}

/// Rebuild the policy named by `config` and install it in `authorizer`.
///
/// On failure the active policy is left in place.
pub async fn reload_from_config(
    authorizer: &Authorizer,
    config: &AuthorizationConfig,
    registry: &TraitRegistry,
) -> AuthzResult<()> {
    let policy = load_policy(config, registry).await?;
    authorizer.reload(policy);
    Ok(())
}

/// Logging settings carried by the logging section.
pub fn log_config(config: &LoggingConfig) -> LogConfig {
    let base = match config.format {
        LogFormat::Json => LogConfig::production(),
        LogFormat::Pretty => LogConfig::development(),
    };
    LogConfig {
        enabled: config.enabled,
        directives: config.level.clone(),
        location: config.include_location,
        ..base
    }
}

/// Install the global log subscriber described by `config`.
pub fn init_telemetry(config: &LoggingConfig) -> TelemetryResult<()> {
    warden_telemetry::init_logging(&log_config(config))
}
