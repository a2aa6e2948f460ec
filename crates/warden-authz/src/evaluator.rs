//! Policy evaluation.
//!
//! [`PolicyEvaluator`] is the capability the decision resolver consumes: run
//! one named query against a call's attributes. [`RegoPolicy`] implements it
//! with the `regorus` crate, a pure Rust implementation of OPA.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use regorus::Engine;
use tracing::{debug, info, instrument, warn};

use crate::attributes::Attributes;
use crate::bundle::{root_data, Bundle, BundleLoader, BundleMetadata};
use crate::config::EvaluatorConfig;
use crate::context::CallContext;
use crate::error::{AuthzError, AuthzResult};
use crate::verdict::{ExpressionValue, QueryResult, ResultSet};

/// Executes named boolean queries against call attributes.
///
/// Implementations must be safe for concurrent use: one instance serves
/// every in-flight call.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync + std::fmt::Debug {
    /// Evaluate `query` (e.g. `data.foo.bar.allow`) for `attributes`.
    ///
    /// An empty result set means the query is undefined. Errors mean the
    /// query could not be evaluated and are never a decision.
    async fn eval_policy(
        &self,
        ctx: &CallContext,
        query: &str,
        attributes: &Attributes,
    ) -> AuthzResult<ResultSet>;
}

#[async_trait]
impl<T: PolicyEvaluator + ?Sized> PolicyEvaluator for Arc<T> {
    async fn eval_policy(
        &self,
        ctx: &CallContext,
        query: &str,
        attributes: &Attributes,
    ) -> AuthzResult<ResultSet> {
        (**self).eval_policy(ctx, query, attributes).await
    }
}

/// Metric counting evaluations left running after their caller gave up.
pub const ABANDONED_METRIC: &str = "warden_authz_abandoned_evaluations_total";

/// A compiled Rego rule set.
///
/// Evaluation never mutates the compiled engine; each query runs on its own
/// clone, so one policy can be shared across all in-flight calls.
///
/// Queries run on the blocking thread pool and the engine cannot be
/// interrupted. When the per-query timeout fires or the call is cancelled the
/// caller gets its error at once, but the evaluation keeps its thread until it
/// finishes. Such evaluations are counted in [`RegoPolicy::abandoned_evaluations`]
/// and the `warden_authz_abandoned_evaluations_total` metric.
#[derive(Debug, Clone)]
pub struct RegoPolicy {
    /// The compiled regorus engine.
    engine: Engine,
    /// Evaluator configuration.
    config: EvaluatorConfig,
    /// Metadata of the bundle the policy was compiled from.
    metadata: BundleMetadata,
    /// Packages declared by the bundle's modules.
    packages: Vec<String>,
    /// Evaluations whose caller stopped waiting, shared between clones.
    abandoned: Arc<AtomicU64>,
}

/// Marks a blocking evaluation as abandoned unless it is disarmed.
struct PendingEvaluation<'a> {
    abandoned: &'a AtomicU64,
    query: &'a str,
    finished: bool,
}

impl Drop for PendingEvaluation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.abandoned.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(ABANDONED_METRIC).increment(1);
            warn!(query = self.query, "evaluation abandoned while still running");
        }
    }
}

impl RegoPolicy {
    /// Compile every module and data document of `bundle`.
    ///
    /// Fails on the first layout, syntax or data error; no partially
    /// compiled policy is ever returned.
    #[instrument(skip_all, fields(revision = %bundle.metadata.revision))]
    pub fn compile(bundle: Bundle, config: EvaluatorConfig) -> AuthzResult<Self> {
        let packages = bundle.check_layout()?;

        let mut engine = Engine::new();
        if config.strict_builtins {
            engine.set_strict_builtin_errors(true);
        }

        for (path, source) in &bundle.policies {
            debug!(path, "adding policy");
            engine
                .add_policy(path.clone(), source.clone())
                .map_err(|e| AuthzError::compile(path, e))?;
        }

        for (path, document) in &bundle.data {
            debug!(path, "adding data");
            let rooted = root_data(path, document.clone());
            engine
                .add_data(rooted.into())
                .map_err(|e| AuthzError::compile(path, e))?;
        }

        // Preparing the engine once surfaces analysis errors now rather than
        // on the first call, and every clone inherits the prepared state.
        engine
            .eval_query("true".to_string(), false)
            .map_err(|e| AuthzError::compile(bundle.metadata.source.clone(), e))?;

        info!(
            policies = bundle.policies.len(),
            data_files = bundle.data.len(),
            source = %bundle.metadata.source,
            "policy compiled"
        );

        Ok(Self {
            engine,
            config,
            metadata: bundle.metadata,
            packages,
            abandoned: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Load and compile the rule tree rooted at `root`.
    pub fn from_fs(root: impl AsRef<Path>) -> AuthzResult<Self> {
        Self::from_fs_with_config(root, EvaluatorConfig::default())
    }

    /// Load and compile the rule tree rooted at `root` with `config`.
    pub fn from_fs_with_config(root: impl AsRef<Path>, config: EvaluatorConfig) -> AuthzResult<Self> {
        let bundle = BundleLoader::from_dir(root)?;
        Self::compile(bundle, config)
    }

    /// Load and compile a `.tar.gz` bundle file.
    pub async fn from_bundle_file(
        path: impl AsRef<Path>,
        config: EvaluatorConfig,
    ) -> AuthzResult<Self> {
        let bundle = BundleLoader::from_file(path).await?;
        Self::compile(bundle, config)
    }

    /// Metadata of the bundle this policy was compiled from.
    pub fn bundle_metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    /// Packages declared by the compiled modules, sorted.
    pub fn packages(&self) -> &[String] {
        &self.packages
    }

    /// Whether some module declares `package`.
    pub fn has_package(&self, package: &str) -> bool {
        self.packages.binary_search_by(|p| p.as_str().cmp(package)).is_ok()
    }

    /// The evaluator configuration.
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Number of evaluations that timed out or were cancelled while their
    /// blocking task was still running.
    pub fn abandoned_evaluations(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    fn evaluate_blocking(
        mut engine: Engine,
        input: serde_json::Value,
        query: String,
    ) -> AuthzResult<ResultSet> {
        engine.set_input(input.into());
        let results = engine
            .eval_query(query.clone(), false)
            .map_err(|e| AuthzError::Evaluation(format!("query {query} failed: {e}")))?;
        convert_results(results)
    }
}

#[async_trait]
impl PolicyEvaluator for RegoPolicy {
    async fn eval_policy(
        &self,
        ctx: &CallContext,
        query: &str,
        attributes: &Attributes,
    ) -> AuthzResult<ResultSet> {
        ctx.check()?;
        let start = Instant::now();

        let input = serde_json::to_value(attributes)
            .map_err(|e| AuthzError::InvalidInput(format!("failed to serialize input: {e}")))?;

        let engine = self.engine.clone();
        let owned_query = query.to_string();
        let task =
            tokio::task::spawn_blocking(move || Self::evaluate_blocking(engine, input, owned_query));
        let mut pending = PendingEvaluation {
            abandoned: &self.abandoned,
            query,
            finished: false,
        };

        let joined = tokio::time::timeout(self.config.query_timeout, task)
            .await
            .map_err(|_| {
                AuthzError::Evaluation(format!(
                    "query {query} exceeded {:?}",
                    self.config.query_timeout
                ))
            })?;
        pending.finished = true;
        let results =
            joined.map_err(|e| AuthzError::Evaluation(format!("evaluation task failed: {e}")))??;

        debug!(
            query,
            results = results.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "policy evaluation complete"
        );

        Ok(results)
    }
}

/// Convert regorus results, dropping results with undefined expressions.
fn convert_results(results: regorus::QueryResults) -> AuthzResult<ResultSet> {
    let mut converted = Vec::with_capacity(results.result.len());
    'results: for result in results.result {
        let mut expressions = Vec::with_capacity(result.expressions.len());
        for expr in result.expressions {
            let value = match expr.value {
                regorus::Value::Undefined => continue 'results,
                regorus::Value::Bool(b) => serde_json::Value::Bool(b),
                ref other => serde_json::to_value(other)?,
            };
            expressions.push(ExpressionValue::new(value, expr.text.to_string()));
        }
        converted.push(QueryResult { expressions });
    }
    Ok(converted)
}
