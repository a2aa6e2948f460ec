//! Prometheus metrics for Warden.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `warden_authz_decisions_total` | Counter | `outcome` | Final authorization outcomes |
//! | `warden_authz_queries_total` | Counter | `verdict` | Scope queries evaluated |
//! | `warden_authz_abandoned_evaluations_total` | Counter | | Evaluations still running after timeout or cancellation |
//! | `warden_policy_loads_total` | Counter | `source`, `result` | Policy constructions |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Final authorization outcomes, labelled by `outcome`.
pub const AUTHZ_DECISIONS_TOTAL: &str = "warden_authz_decisions_total";

/// Scope queries evaluated, labelled by `verdict`.
pub const AUTHZ_QUERIES_TOTAL: &str = "warden_authz_queries_total";

/// Evaluations left running after their caller timed out or was cancelled.
pub const AUTHZ_ABANDONED_EVALUATIONS_TOTAL: &str = "warden_authz_abandoned_evaluations_total";

/// Policy constructions, labelled by `source` and `result`.
pub const POLICY_LOADS_TOTAL: &str = "warden_policy_loads_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder as the global `metrics` recorder.
///
/// Rendering is left to the embedding server via the returned handle.
///
/// # Errors
///
/// [`TelemetryError::RecorderInstalled`] if a recorder is already set.
pub fn install_prometheus_recorder() -> TelemetryResult<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::RecorderInstalled(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle.clone());
    describe_metrics();

    Ok(handle)
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if the recorder is not installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers descriptions for all standard metrics.
pub fn describe_metrics() {
    describe_counter!(
        AUTHZ_DECISIONS_TOTAL,
        "Total authorization decisions by outcome"
    );
    describe_counter!(
        AUTHZ_QUERIES_TOTAL,
        "Total scope queries evaluated by verdict"
    );
    describe_counter!(
        AUTHZ_ABANDONED_EVALUATIONS_TOTAL,
        "Policy evaluations still running after their caller gave up"
    );
    describe_counter!(
        POLICY_LOADS_TOTAL,
        "Total policy constructions by source and result"
    );
}

/// Records a policy construction.
///
/// # Arguments
///
/// * `source` - Where the policy came from ("bundle", "directory", "default")
/// * `success` - Whether the policy compiled
pub fn record_policy_load(source: &'static str, success: bool) {
    counter!(
        POLICY_LOADS_TOTAL,
        "source" => source,
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}
