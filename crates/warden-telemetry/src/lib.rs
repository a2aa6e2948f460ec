//! Observability for Warden.
//!
//! - **Logging**: structured JSON or pretty output through `tracing-subscriber`
//! - **Metrics**: Prometheus-format counters via the `metrics` crate
//!
//! The authorization crates only emit through the `tracing` and `metrics`
//! facades; this crate installs the subscriber and recorder behind them.
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_telemetry::{init_logging, install_prometheus_recorder, LogConfig};
//!
//! init_logging(&LogConfig::production())?;
//! let handle = install_prometheus_recorder()?;
//!
//! // Serve `handle.render()` from the metrics endpoint.
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogOutput};
pub use metrics::{describe_metrics, install_prometheus_recorder, record_policy_load, render_metrics};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
