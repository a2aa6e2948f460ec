//! Hierarchical decision resolution.
//!
//! A call is decided by walking its [`QueryHierarchy`] from the most specific
//! scope to the protocol default. The first scope whose `allow` rule yields a
//! boolean decides; scopes without a verdict are skipped.

use tracing::{debug, instrument};

use crate::attributes::Attributes;
use crate::context::CallContext;
use crate::error::{AuthzError, AuthzResult};
use crate::evaluator::PolicyEvaluator;
use crate::hierarchy::{check_service_name, QueryHierarchy};
use crate::verdict::Verdict;

/// Metric counting final decisions, labelled by `outcome`.
pub const DECISIONS_METRIC: &str = "warden_authz_decisions_total";
/// Metric counting evaluated scope queries, labelled by `verdict`.
pub const QUERIES_METRIC: &str = "warden_authz_queries_total";

/// An allowed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The query whose verdict allowed the call.
    pub decided_by: String,
    /// Every query evaluated, in order.
    pub queries: Vec<String>,
}

/// Decide whether the call described by `attributes` may proceed.
///
/// Returns the [`Decision`] when some scope allows the call. A deny, or no
/// verdict at any scope, fails with [`AuthzError::PermissionDenied`] when the
/// caller holds a valid token or certificate and
/// [`AuthzError::Unauthenticated`] otherwise. Evaluator failures and context
/// cancellation are returned as they occur; they are never turned into a
/// denial. A service name that is not a dotted identifier path fails with
/// [`AuthzError::InvalidInput`] before the evaluator sees any query.
#[instrument(
    skip_all,
    fields(service = %attributes.service, method = %attributes.method, protocol = %attributes.protocol)
)]
pub async fn validate<E>(
    ctx: &CallContext,
    evaluator: &E,
    attributes: &Attributes,
) -> AuthzResult<Decision>
where
    E: PolicyEvaluator + ?Sized,
{
    let result = resolve(ctx, evaluator, attributes).await;
    let outcome = match &result {
        Ok(_) => "allow",
        Err(AuthzError::PermissionDenied { .. }) => "permission_denied",
        Err(AuthzError::Unauthenticated { .. }) => "unauthenticated",
        Err(AuthzError::Cancelled | AuthzError::DeadlineExceeded) => "aborted",
        Err(_) => "error",
    };
    metrics::counter!(DECISIONS_METRIC, "outcome" => outcome).increment(1);
    result
}

async fn resolve<E>(
    ctx: &CallContext,
    evaluator: &E,
    attributes: &Attributes,
) -> AuthzResult<Decision>
where
    E: PolicyEvaluator + ?Sized,
{
    check_service_name(&attributes.service)?;

    let hierarchy = QueryHierarchy::new(&attributes.service, attributes.protocol);
    let mut queries = Vec::with_capacity(hierarchy.len());

    for query in hierarchy {
        ctx.check()?;
        queries.push(query.clone());

        let results = ctx
            .run(evaluator.eval_policy(ctx, &query, attributes))
            .await??;
        let verdict = Verdict::from_result_set(&query, &results)?;
        metrics::counter!(QUERIES_METRIC, "verdict" => verdict.as_str()).increment(1);
        debug!(query, verdict = verdict.as_str(), "scope evaluated");

        match verdict {
            Verdict::Allow => {
                return Ok(Decision {
                    decided_by: query,
                    queries,
                })
            }
            Verdict::Deny => break,
            Verdict::NoDecision => {}
        }
    }

    debug!(
        queries = queries.len(),
        authenticated = attributes.is_authenticated(),
        "call denied"
    );

    let service = attributes.service.clone();
    let method = attributes.method.clone();
    if attributes.is_authenticated() {
        Err(AuthzError::PermissionDenied { service, method })
    } else {
        Err(AuthzError::Unauthenticated { service, method })
    }
}
