//! Warden Authorization - hierarchical, trait-aware call authorization
//!
//! This crate decides whether an incoming RPC or HTTP call may proceed by
//! evaluating Rego policies at successively broader scopes of the called
//! service.
//!
//! # Overview
//!
//! - Describe each call with [`Attributes`] (service, method, request, and
//!   the caller's token and certificate state)
//! - Walk the scope hierarchy `data.s1.s2.s3.allow`, `data.s1.s2.allow`, ...
//!   `data.grpc_default.allow`; the most specific verdict wins
//! - Classify denials as [`AuthzError::Unauthenticated`] or
//!   [`AuthzError::PermissionDenied`] depending on the caller's credentials
//! - Build policies from a directory tree, a `.tar.gz` bundle, or the
//!   built-in trait registry
//!
//! # Architecture
//!
//! ```text
//!   policy dir / bundle        TraitRegistry
//!          │                        │
//!   ┌──────▼───────┐       ┌────────▼─────────┐
//!   │ BundleLoader │       │ default_policy   │
//!   └──────┬───────┘       └────────┬─────────┘
//!          └──────────┬─────────────┘
//!              ┌──────▼──────┐
//!              │ RegoPolicy  │  (PolicyEvaluator)
//!              └──────┬──────┘
//!   Attributes        │ eval_policy(scope)
//!       │      ┌──────▼──────┐
//!       └─────►│  validate   │──► Decision / AuthzError
//!              └─────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use warden_authz::{Attributes, Authorizer, CallContext, RegoPolicy};
//!
//! let authorizer = Authorizer::new(RegoPolicy::from_fs("policy")?);
//!
//! let attrs = Attributes::builder()
//!     .service("smartcore.bos.soundsensor.v1.SoundSensorApi")
//!     .method("GetSoundLevel")
//!     .token(true, claims)
//!     .build();
//!
//! let decision = authorizer.validate(&CallContext::background(), &attrs).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

pub mod attributes;
pub mod bundle;
pub mod config;
pub mod context;
pub mod default_policy;
pub mod error;
pub mod evaluator;
pub mod hierarchy;
pub mod registry;
pub mod resolver;
pub mod verdict;

// Re-exports for convenience
pub use attributes::{
    Attributes, AttributesBuilder, PermissionAssignment, Protocol, ResourceType, TokenClaims,
};
pub use bundle::{Bundle, BundleLoader, BundleMetadata};
pub use config::EvaluatorConfig;
pub use context::CallContext;
pub use default_policy::{default_bundle, default_policy, default_policy_with_config};
pub use error::{AuthzError, AuthzResult};
pub use evaluator::{PolicyEvaluator, RegoPolicy};
pub use hierarchy::{query_hierarchy, QueryHierarchy};
pub use registry::{Access, ServiceEntry, TraitName, TraitRegistry};
pub use resolver::{validate, Decision};
pub use verdict::{QueryResult, ResultSet, Verdict};

/// Shared authorization entry point.
///
/// Holds the active policy and swaps it on reload. Calls already in flight
/// finish against the policy they started with.
#[derive(Debug)]
pub struct Authorizer {
    policy: RwLock<Arc<dyn PolicyEvaluator>>,
}

impl Authorizer {
    /// Create an authorizer serving `policy`.
    pub fn new<P: PolicyEvaluator + 'static>(policy: P) -> Self {
        Self::from_shared(Arc::new(policy))
    }

    /// Create an authorizer serving an already shared policy.
    pub fn from_shared(policy: Arc<dyn PolicyEvaluator>) -> Self {
        Self {
            policy: RwLock::new(policy),
        }
    }

    /// Decide whether the call described by `attributes` may proceed.
    pub async fn validate(
        &self,
        ctx: &CallContext,
        attributes: &Attributes,
    ) -> AuthzResult<Decision> {
        let policy = self.policy();
        resolver::validate(ctx, policy.as_ref(), attributes).await
    }

    /// Replace the active policy for subsequent calls.
    pub fn reload<P: PolicyEvaluator + 'static>(&self, policy: P) {
        self.reload_shared(Arc::new(policy));
    }

    /// Replace the active policy with an already shared one.
    pub fn reload_shared(&self, policy: Arc<dyn PolicyEvaluator>) {
        *self.policy.write() = policy;
        info!("authorization policy reloaded");
    }

    /// The active policy.
    pub fn policy(&self) -> Arc<dyn PolicyEvaluator> {
        Arc::clone(&self.policy.read())
    }
}
