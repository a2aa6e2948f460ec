//! # Warden
//!
//! **Hierarchical, trait-aware authorization for device APIs**
//!
//! Warden decides whether a gRPC or HTTP call may proceed by evaluating Rego
//! policies at successively broader scopes of the called service, stopping
//! at the first scope with a verdict.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use warden::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("warden.toml")?
//!         .with_env_prefix("WARDEN")
//!         .load()?;
//!     warden::init_telemetry(&config.logging)?;
//!
//!     let registry = TraitRegistry::builtin();
//!     let authorizer = warden::authorizer_from_config(&config.authorization, &registry).await?;
//!
//!     let attrs = Attributes::builder()
//!         .service("smartcore.bos.meter.v1.MeterApi")
//!         .method("GetMeterReading")
//!         .token(true, claims)
//!         .build();
//!     authorizer.validate(&CallContext::background(), &attrs).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bootstrap;

// Re-export the component crates
pub use warden_authz as authz;
pub use warden_config as config;
pub use warden_telemetry as telemetry;

pub use bootstrap::{
    authorizer_from_config, init_telemetry, load_policy, reload_from_config, PolicySource,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use warden_authz::{
        Access, Attributes, Authorizer, AuthzError, AuthzResult, CallContext, Decision,
        PermissionAssignment, PolicyEvaluator, Protocol, RegoPolicy, ResourceType, TokenClaims,
        TraitRegistry,
    };

    pub use warden_config::{AuthorizationConfig, ConfigLoader, LoggingConfig, WardenConfig};

    pub use crate::bootstrap::PolicySource;
}
