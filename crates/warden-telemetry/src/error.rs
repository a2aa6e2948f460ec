//! Telemetry errors.

use thiserror::Error;
use tracing_subscriber::filter::ParseError;

/// Why a subscriber or recorder could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Log filter directives did not parse.
    #[error("invalid log filter {directives:?}: {source}")]
    InvalidFilter {
        /// The rejected directives.
        directives: String,
        /// Parser error.
        #[source]
        source: ParseError,
    },

    /// A global `tracing` subscriber is already set.
    #[error("log subscriber already installed: {0}")]
    SubscriberInstalled(String),

    /// A global `metrics` recorder is already set.
    #[error("metrics recorder already installed: {0}")]
    RecorderInstalled(String),
}
