//! The built-in policy.
//!
//! Generated from a [`TraitRegistry`]: every registered service gets a module
//! at its own scope that admits trait calls the caller's permissions cover.
//! The protocol defaults only admit the unscoped superuser, plus everyone in
//! development mode.

use tracing::{info, instrument, warn};

use crate::attributes::Protocol;
use crate::bundle::Bundle;
use crate::config::EvaluatorConfig;
use crate::error::AuthzResult;
use crate::evaluator::RegoPolicy;
use crate::hierarchy::is_package_path;
use crate::registry::{permission, TraitRegistry};

const TRAITS_LIBRARY: &str = include_str!("../policy/system/traits.rego");
const TRAITS_LIBRARY_PATH: &str = "system/traits.rego";
const HEALTH_MODULE: &str = include_str!("../policy/grpc/health/v1/Health.rego");
const HEALTH_MODULE_PATH: &str = "grpc/health/v1/Health.rego";
const REGISTRY_DATA_PATH: &str = "registry/data.json";


/// Build the default bundle without compiling it.
pub fn default_bundle(registry: &TraitRegistry, dev_mode: bool) -> Bundle {
    let mut bundle = Bundle::new(if dev_mode { "default-dev" } else { "default" });
    bundle.metadata.source = "builtin".to_string();

    bundle.add_data(REGISTRY_DATA_PATH, registry.to_data());
    bundle.add_policy(TRAITS_LIBRARY_PATH, TRAITS_LIBRARY);
    bundle.add_policy(HEALTH_MODULE_PATH, HEALTH_MODULE);
    for protocol in [Protocol::Grpc, Protocol::Http] {
        bundle.add_policy(
            format!("{}.rego", protocol.default_package()),
            protocol_default_module(protocol, dev_mode),
        );
    }

    for (service, entry) in registry.services() {
        if !is_package_path(service) {
            warn!(service, trait_name = %entry.trait_name, "service name is not a valid package, skipping");
            continue;
        }
        let path = format!("{}.rego", service.replace('.', "/"));
        if bundle.policies.contains_key(&path) {
            warn!(service, "service collides with a built-in module, skipping");
            continue;
        }
        bundle.add_policy(path, service_module(service));
    }

    bundle
}

/// Compile the default policy.
pub fn default_policy(registry: &TraitRegistry, dev_mode: bool) -> AuthzResult<RegoPolicy> {
    default_policy_with_config(registry, dev_mode, EvaluatorConfig::default())
}

/// Compile the default policy with `config`.
#[instrument(skip(registry, config), fields(services = registry.len()))]
pub fn default_policy_with_config(
    registry: &TraitRegistry,
    dev_mode: bool,
    config: EvaluatorConfig,
) -> AuthzResult<RegoPolicy> {
    if dev_mode {
        warn!("development mode: every call is allowed");
    }
    let policy = RegoPolicy::compile(default_bundle(registry, dev_mode), config)?;
    info!(
        packages = policy.packages().len(),
        traits = registry.traits().len(),
        "default policy ready"
    );
    Ok(policy)
}

fn protocol_default_module(protocol: Protocol, dev_mode: bool) -> String {
    let mut module = format!(
        r#"package {package}

import rego.v1

allow if {{
	input.token_valid
	some assignment in input.token_claims.permissions
	assignment.permission == "{superuser}"
	not assignment.scoped
}}
"#,
        package = protocol.default_package(),
        superuser = permission::SUPERUSER,
    );
    if dev_mode {
        module.push_str("\nallow if {\n\ttrue\n}\n");
    }
    module
}

fn service_module(service: &str) -> String {
    format!(
        r"package {service}

import rego.v1

allow if {{
	data.system.traits.allow_trait_call
}}
"
    )
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_layout() {
        let bundle = default_bundle(&TraitRegistry::builtin(), false);
        let packages = bundle.check_layout().unwrap();

        assert!(packages.contains(&"grpc_default".to_string()));
        assert!(packages.contains(&"http_default".to_string()));
        assert!(packages.contains(&"system.traits".to_string()));
        assert!(packages.contains(&"grpc.health.v1.Health".to_string()));
        assert!(packages.contains(&"smartcore.bos.soundsensor.v1.SoundSensorApi".to_string()));
        assert_eq!(bundle.metadata.revision, "default");
    }

    #[test]
    fn test_dev_mode_extends_protocol_defaults() {
        let bundle = default_bundle(&TraitRegistry::new(), true);
        assert_eq!(bundle.metadata.revision, "default-dev");
        for path in ["grpc_default.rego", "http_default.rego"] {
            assert!(bundle.policies[path].contains("allow if {\n\ttrue\n}"));
        }

        let bundle = default_bundle(&TraitRegistry::new(), false);
        assert!(!bundle.policies["grpc_default.rego"].contains("\ttrue\n"));
    }

    #[test]
    fn test_invalid_service_names_are_skipped() {
        let mut registry = TraitRegistry::new();
        registry.register(
            "acme.Widget",
            [
                "acme.widget-v1.WidgetApi",
                "acme.in.WidgetApi",
                "acme.widget.v1.WidgetApi",
            ],
        );
        let bundle = default_bundle(&registry, false);

        assert!(bundle.policies.contains_key("acme/widget/v1/WidgetApi.rego"));
        assert!(!bundle.policies.keys().any(|p| p.contains("widget-v1")));
        assert!(!bundle.policies.contains_key("acme/in/WidgetApi.rego"));
    }

    #[test]
    fn test_service_colliding_with_builtin_module_is_skipped() {
        let mut registry = TraitRegistry::new();
        registry.register("acme.Health", ["grpc.health.v1.Health"]);
        let bundle = default_bundle(&registry, false);

        assert_eq!(bundle.policies[HEALTH_MODULE_PATH], HEALTH_MODULE);
        assert!(bundle.check_layout().is_ok());
    }
}
