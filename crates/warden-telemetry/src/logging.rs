//! Log subscriber setup.
//!
//! Warden crates only emit through `tracing`; [`init_logging`] installs the
//! process-wide subscriber: an [`EnvFilter`] in front of one `fmt` layer.
//!
//! ```rust,ignore
//! use warden_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! tracing::info!(service = "foo.v1.FooApi", method = "GetFoo", "call allowed");
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Line format of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogOutput {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, coloured.
    Pretty,
}

/// What [`init_logging`] installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// When false, nothing is installed.
    pub enabled: bool,
    /// `EnvFilter` directives, e.g. `info,warden_authz=debug`.
    pub directives: String,
    /// Line format.
    pub output: LogOutput,
    /// Log span open and close, which shows per-query timings.
    pub span_events: bool,
    /// Source file and line of each event.
    pub location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// Pretty debug output with spans and source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            directives: "debug".to_string(),
            output: LogOutput::Pretty,
            span_events: true,
            location: true,
        }
    }

    /// JSON at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            enabled: true,
            directives: "info".to_string(),
            output: LogOutput::Json,
            span_events: false,
            location: false,
        }
    }
}

/// Install the global subscriber described by `config`.
///
/// # Errors
///
/// [`TelemetryError::InvalidFilter`] for bad directives,
/// [`TelemetryError::SubscriberInstalled`] if a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.directives)?;
    tracing_subscriber::registry()
        .with(fmt_layer(config).with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInstalled(e.to_string()))
}

fn fmt_layer(config: &LogConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_file(config.location)
        .with_line_number(config.location);

    match config.output {
        LogOutput::Json => layer.json().boxed(),
        LogOutput::Pretty => layer.pretty().boxed(),
    }
}

/// Parse filter directives.
///
/// # Errors
///
/// [`TelemetryError::InvalidFilter`] if they do not parse.
pub fn create_env_filter(directives: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directives).map_err(|source| TelemetryError::InvalidFilter {
        directives: directives.to_string(),
        source,
    })
}

/// Field names shared by authorization log events.
pub mod fields {
    /// Called service.
    pub const SERVICE: &str = "service";
    /// Called method.
    pub const METHOD: &str = "method";
    /// Call protocol.
    pub const PROTOCOL: &str = "protocol";
    /// Scope query being evaluated.
    pub const QUERY: &str = "query";
    /// Revision of the active policy bundle.
    pub const REVISION: &str = "revision";
}
