//! End-to-end: configuration to authorization decisions.

use std::path::PathBuf;

use warden::prelude::*;
use warden_authz::registry::permission;

fn anonymous(service: &str) -> Attributes {
    Attributes::builder().service(service).method("GetThing").build()
}

#[tokio::test]
async fn test_default_config_uses_builtin_policy() {
    let config = WardenConfig::default();
    let authorizer = warden::authorizer_from_config(&config.authorization, &TraitRegistry::builtin())
        .await
        .unwrap();

    let err = authorizer
        .validate(&CallContext::background(), &anonymous("acme.v1.Api"))
        .await
        .unwrap_err();
    assert!(err.is_unauthenticated());

    let reader = TokenClaims {
        permissions: vec![PermissionAssignment::global(permission::TRAIT_READ)],
        ..TokenClaims::default()
    };
    let attrs = Attributes::builder()
        .service("smartcore.bos.meter.v1.MeterApi")
        .method("GetMeterReading")
        .token(true, reader)
        .build();
    assert!(authorizer
        .validate(&CallContext::background(), &attrs)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_development_config_allows_everything() {
    let config = WardenConfig::development();
    let authorizer = warden::authorizer_from_config(&config.authorization, &TraitRegistry::new())
        .await
        .unwrap();

    let decision = authorizer
        .validate(&CallContext::background(), &anonymous("acme.v1.Api"))
        .await
        .unwrap();
    assert_eq!(decision.decided_by, "data.grpc_default.allow");
}

#[tokio::test]
async fn test_policy_dir_from_config() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("acme")).unwrap();
    std::fs::write(
        dir.path().join("acme/policy.rego"),
        "package acme\n\nimport rego.v1\n\nallow := true\n",
    )
    .unwrap();

    let toml = format!(
        "[authorization]\npolicy_dir = {:?}\n",
        dir.path().to_string_lossy()
    );
    let config = ConfigLoader::new()
        .with_string(&toml, "toml")
        .unwrap()
        .load()
        .unwrap();

    let policy = warden::load_policy(&config.authorization, &TraitRegistry::builtin())
        .await
        .unwrap();
    assert!(policy.has_package("acme"));
    assert!(!policy.has_package("system.traits"));
}

#[tokio::test]
async fn test_missing_bundle_fails() {
    let config = AuthorizationConfig {
        bundle_path: Some(PathBuf::from("/nonexistent/bundle.tar.gz")),
        ..AuthorizationConfig::default()
    };

    let err = warden::load_policy(&config, &TraitRegistry::builtin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::BundleLoad { .. }));
}

#[tokio::test]
async fn test_failed_reload_keeps_active_policy() {
    let registry = TraitRegistry::builtin();
    let authorizer = warden::authorizer_from_config(&WardenConfig::development().authorization, &registry)
        .await
        .unwrap();

    let broken = AuthorizationConfig {
        policy_dir: Some(PathBuf::from("/nonexistent/policy")),
        ..AuthorizationConfig::default()
    };
    assert!(warden::reload_from_config(&authorizer, &broken, &registry)
        .await
        .is_err());

    assert!(authorizer
        .validate(&CallContext::background(), &anonymous("acme.v1.Api"))
        .await
        .is_ok());

    warden::reload_from_config(&authorizer, &AuthorizationConfig::default(), &registry)
        .await
        .unwrap();
    assert!(authorizer
        .validate(&CallContext::background(), &anonymous("acme.v1.Api"))
        .await
        .unwrap_err()
        .is_unauthenticated());
}
