//! Typed configuration for Warden.
//!
//! A [`WardenConfig`] is built from a preset, then at most one TOML or JSON
//! document, then `PREFIX__SECTION__KEY` environment overrides. Unknown
//! fields are rejected.
//!
//! # Configuration File Format
//!
//! ```toml
//! [authorization]
//! # Exactly one policy source, or neither for the built-in trait policy.
//! policy_dir = "/etc/warden/policy"
//! # bundle_path = "/etc/warden/bundle.tar.gz"
//! dev_mode = false
//! strict_mode = false
//! max_eval_time_ms = 100
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__SECTION__KEY`:
//!
//! - `WARDEN__AUTHORIZATION__BUNDLE_PATH=/srv/bundle.tar.gz`
//! - `WARDEN__LOGGING__LEVEL=warden_authz=debug,info`

#![warn(missing_docs)]

mod config;
mod error;
mod format;
mod loader;
mod schema;

pub use config::WardenConfig;
pub use error::ConfigError;
pub use format::Format;
pub use loader::ConfigLoader;
pub use schema::{AuthorizationConfig, LogFormat, LoggingConfig, DEFAULT_MAX_EVAL_TIME_MS};
