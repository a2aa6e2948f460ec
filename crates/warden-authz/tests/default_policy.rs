//! Scenarios for the built-in trait policy.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinSet;
use warden_authz::registry::permission;
use warden_authz::{
    default_policy, validate, Access, Attributes, AuthzError, AuthzResult, CallContext, Decision,
    PermissionAssignment, Protocol, RegoPolicy, ResourceType, TokenClaims, TraitRegistry,
};

const SOUND_SENSOR_API: &str = "smartcore.bos.soundsensor.v1.SoundSensorApi";

fn builtin() -> RegoPolicy {
    default_policy(&TraitRegistry::builtin(), false).unwrap()
}

fn claims(permissions: Vec<PermissionAssignment>) -> TokenClaims {
    TokenClaims {
        subject: "test-user".to_string(),
        permissions,
        ..TokenClaims::default()
    }
}

fn trait_call(service: &str, method: &str, name: &str, claims: TokenClaims) -> Attributes {
    Attributes::builder()
        .service(service)
        .method(method)
        .request(json!({ "name": name }))
        .token(true, claims)
        .build()
}

async fn check(policy: &RegoPolicy, attrs: &Attributes) -> AuthzResult<Decision> {
    validate(&CallContext::background(), policy, attrs).await
}

fn read_under_foo() -> TokenClaims {
    claims(vec![PermissionAssignment::scoped(
        permission::TRAIT_READ,
        ResourceType::NamedResourcePathPrefix,
        "foo",
    )])
}

#[tokio::test]
async fn test_scoped_read_permission_allows_registered_trait() {
    let policy = builtin();
    let attrs = trait_call(SOUND_SENSOR_API, "GetSoundLevel", "foo/testsoundsensor", read_under_foo());

    let decision = check(&policy, &attrs).await.unwrap();
    assert_eq!(
        decision.decided_by,
        "data.smartcore.bos.soundsensor.v1.SoundSensorApi.allow"
    );
}

#[tokio::test]
async fn test_unregistered_services_are_denied() {
    let policy = builtin();

    for service in [
        "smartcore.bos.NonExistentTraitApi",
        "smartcore.bos.SoundSensorFoobar",
        "smartcore.bos.soundsensor.v1.SoundSensorApiV2",
    ] {
        let attrs = trait_call(service, "GetSoundLevel", "foo/testsoundsensor", read_under_foo());
        let err = check(&policy, &attrs).await.unwrap_err();
        assert!(err.is_permission_denied(), "{service} should be denied, got {err}");
    }
}

#[tokio::test]
async fn test_read_permission_does_not_grant_writes() {
    let policy = builtin();
    let attrs = trait_call(
        "smartcore.traits.OnOffApi",
        "UpdateOnOff",
        "foo/lamp",
        read_under_foo(),
    );

    let err = check(&policy, &attrs).await.unwrap_err();
    assert!(err.is_permission_denied());
}

#[tokio::test]
async fn test_write_permission_grants_reads_and_writes() {
    let policy = builtin();
    let writer = claims(vec![PermissionAssignment::scoped(
        permission::TRAIT_WRITE,
        ResourceType::NamedResourcePathPrefix,
        "foo/",
    )]);

    for method in ["GetOnOff", "PullOnOff", "UpdateOnOff"] {
        let attrs = trait_call("smartcore.traits.OnOffApi", method, "foo/lamp", writer.clone());
        assert!(check(&policy, &attrs).await.is_ok(), "{method} should be allowed");
    }
}

#[tokio::test]
async fn test_path_prefix_respects_segment_boundaries() {
    let policy = builtin();

    for (name, allowed) in [
        ("foo", true),
        ("foo/a", true),
        ("foo/a/b", true),
        ("foobar", false),
        ("foobar/a", false),
        ("bar/foo", false),
    ] {
        let attrs = trait_call(SOUND_SENSOR_API, "GetSoundLevel", name, read_under_foo());
        assert_eq!(check(&policy, &attrs).await.is_ok(), allowed, "name {name}");
    }
}

#[tokio::test]
async fn test_named_resource_matches_exactly() {
    let policy = builtin();
    let exact = claims(vec![PermissionAssignment::scoped(
        permission::TRAIT_READ,
        ResourceType::NamedResource,
        "foo/testsoundsensor",
    )]);

    let attrs = trait_call(SOUND_SENSOR_API, "GetSoundLevel", "foo/testsoundsensor", exact.clone());
    assert!(check(&policy, &attrs).await.is_ok());

    let attrs = trait_call(SOUND_SENSOR_API, "GetSoundLevel", "foo/testsoundsensor/child", exact);
    assert!(check(&policy, &attrs).await.unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn test_unscoped_permission_covers_every_resource() {
    let policy = builtin();
    let global = claims(vec![PermissionAssignment::global(permission::TRAIT_READ)]);

    let attrs = trait_call(SOUND_SENSOR_API, "GetSoundLevel", "anything/at/all", global.clone());
    assert!(check(&policy, &attrs).await.is_ok());

    let attrs = Attributes::builder()
        .service(SOUND_SENSOR_API)
        .method("GetSoundLevel")
        .token(true, global)
        .build();
    assert!(check(&policy, &attrs).await.is_ok());
}

#[tokio::test]
async fn test_scoped_permission_requires_request_name() {
    let policy = builtin();
    let attrs = Attributes::builder()
        .service(SOUND_SENSOR_API)
        .method("GetSoundLevel")
        .token(true, read_under_foo())
        .build();

    assert!(check(&policy, &attrs).await.unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn test_invalid_token_is_unauthenticated() {
    let policy = builtin();
    let attrs = Attributes::builder()
        .service(SOUND_SENSOR_API)
        .method("GetSoundLevel")
        .request(json!({ "name": "foo/testsoundsensor" }))
        .token(false, read_under_foo())
        .build();

    assert!(check(&policy, &attrs).await.unwrap_err().is_unauthenticated());
}

#[tokio::test]
async fn test_anonymous_call_is_unauthenticated() {
    let policy = builtin();
    let attrs = Attributes::builder()
        .service(SOUND_SENSOR_API)
        .method("GetSoundLevel")
        .build();

    assert!(check(&policy, &attrs).await.unwrap_err().is_unauthenticated());
}

#[tokio::test]
async fn test_certificate_without_permissions_is_permission_denied() {
    let policy = builtin();
    let attrs = Attributes::builder()
        .service(SOUND_SENSOR_API)
        .method("GetSoundLevel")
        .certificate(true)
        .build();

    assert!(check(&policy, &attrs).await.unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn test_health_checks_are_public() {
    let policy = builtin();
    let attrs = Attributes::builder()
        .service("grpc.health.v1.Health")
        .method("Check")
        .build();

    let decision = check(&policy, &attrs).await.unwrap();
    assert_eq!(decision.decided_by, "data.grpc.health.v1.Health.allow");
}

#[tokio::test]
async fn test_superuser_reaches_protocol_default() {
    let policy = builtin();
    let root = claims(vec![PermissionAssignment::global(permission::SUPERUSER)]);

    for protocol in [Protocol::Grpc, Protocol::Http] {
        let attrs = Attributes::builder()
            .protocol(protocol)
            .service("acme.unregistered.v1.Api")
            .method("DoAnything")
            .token(true, root.clone())
            .build();

        let decision = check(&policy, &attrs).await.unwrap();
        assert_eq!(
            decision.decided_by,
            format!("data.{}.allow", protocol.default_package())
        );
    }
}

#[tokio::test]
async fn test_scoped_superuser_is_not_honoured() {
    let policy = builtin();
    let scoped_root = claims(vec![PermissionAssignment::scoped(
        permission::SUPERUSER,
        ResourceType::NamedResourcePathPrefix,
        "foo",
    )]);
    let attrs = trait_call("acme.unregistered.v1.Api", "DoAnything", "foo/x", scoped_root);

    assert!(check(&policy, &attrs).await.unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn test_dev_mode_allows_anonymous_calls() {
    let policy = default_policy(&TraitRegistry::builtin(), true).unwrap();

    for protocol in [Protocol::Grpc, Protocol::Http] {
        let attrs = Attributes::builder()
            .protocol(protocol)
            .service("acme.unregistered.v1.Api")
            .method("DoAnything")
            .build();
        assert!(check(&policy, &attrs).await.is_ok());
    }
}

#[tokio::test]
async fn test_custom_registry_and_method_overrides() {
    let mut registry = TraitRegistry::new();
    registry.register("acme.Widget", ["acme.widget.v1.WidgetApi"]);
    registry
        .register_method("acme.widget.v1.WidgetApi", "GetAndReset", Access::Write)
        .unwrap()
        .register_method("acme.widget.v1.WidgetApi", "Ping", Access::Read)
        .unwrap();
    let policy = default_policy(&registry, false).unwrap();
    let reader = claims(vec![PermissionAssignment::global(permission::TRAIT_READ)]);

    let attrs = trait_call("acme.widget.v1.WidgetApi", "GetWidget", "w1", reader.clone());
    assert!(check(&policy, &attrs).await.is_ok());

    let attrs = trait_call("acme.widget.v1.WidgetApi", "Ping", "w1", reader.clone());
    assert!(check(&policy, &attrs).await.is_ok());

    let attrs = trait_call("acme.widget.v1.WidgetApi", "GetAndReset", "w1", reader.clone());
    assert!(check(&policy, &attrs).await.unwrap_err().is_permission_denied());

    // Builtin traits are not part of a custom registry.
    let attrs = trait_call(SOUND_SENSOR_API, "GetSoundLevel", "w1", reader);
    assert!(check(&policy, &attrs).await.unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn test_unrelated_permissions_are_ignored() {
    let policy = builtin();
    let other = claims(vec![
        PermissionAssignment::global("alerts:acknowledge"),
        PermissionAssignment::scoped(permission::TRAIT_READ, ResourceType::Unspecified, "foo"),
    ]);
    let attrs = trait_call(SOUND_SENSOR_API, "GetSoundLevel", "foo/x", other);

    assert!(check(&policy, &attrs).await.unwrap_err().is_permission_denied());
}

#[tokio::test]
async fn test_bracketed_service_cannot_borrow_public_scope() {
    let policy = builtin();

    // Without validation this would expand to `data.grpc.health.v1[_].allow`
    // and pick up the public health rule.
    for service in ["grpc.health.v1[_]", "grpc.health[_][_]", "grpc.health.v1.*"] {
        let attrs = Attributes::builder()
            .service(service)
            .method("GetSoundLevel")
            .build();
        let err = check(&policy, &attrs).await.unwrap_err();
        assert!(matches!(err, AuthzError::InvalidInput(_)), "{service}: {err}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expected {
    Allowed(&'static str),
    PermissionDenied,
    Unauthenticated,
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_policy_under_concurrent_calls() {
    let policy = Arc::new(builtin());
    let sound_sensor_scope = "data.smartcore.bos.soundsensor.v1.SoundSensorApi.allow";

    let scenarios = [
        (
            trait_call(SOUND_SENSOR_API, "GetSoundLevel", "foo/a", read_under_foo()),
            Expected::Allowed(sound_sensor_scope),
        ),
        (
            trait_call(SOUND_SENSOR_API, "GetSoundLevel", "foobar/a", read_under_foo()),
            Expected::PermissionDenied,
        ),
        (
            Attributes::builder()
                .service(SOUND_SENSOR_API)
                .method("GetSoundLevel")
                .request(json!({ "name": "foo/a" }))
                .build(),
            Expected::Unauthenticated,
        ),
        (
            Attributes::builder()
                .service("grpc.health.v1.Health")
                .method("Check")
                .build(),
            Expected::Allowed("data.grpc.health.v1.Health.allow"),
        ),
        (
            trait_call(
                "acme.unregistered.v1.Api",
                "DoAnything",
                "foo/a",
                read_under_foo(),
            ),
            Expected::PermissionDenied,
        ),
    ];

    let mut calls = JoinSet::new();
    for round in 0..40 {
        for (index, (attrs, expected)) in scenarios.iter().enumerate() {
            let policy = Arc::clone(&policy);
            let attrs = attrs.clone();
            let expected = *expected;
            calls.spawn(async move {
                let result = validate(&CallContext::background(), &policy, &attrs).await;
                (round, index, expected, result)
            });
        }
    }

    let mut completed = 0;
    while let Some(joined) = calls.join_next().await {
        let (round, index, expected, result) = joined.unwrap();
        let label = format!("round {round} scenario {index}");
        match (expected, result) {
            (Expected::Allowed(scope), Ok(decision)) => {
                assert_eq!(decision.decided_by, scope, "{label}");
                assert_eq!(decision.queries, [scope], "{label}");
            }
            (Expected::PermissionDenied, Err(err)) => {
                assert!(err.is_permission_denied(), "{label}: {err}");
            }
            (Expected::Unauthenticated, Err(err)) => {
                assert!(err.is_unauthenticated(), "{label}: {err}");
            }
            (expected, other) => panic!("{label}: expected {expected:?}, got {other:?}"),
        }
        completed += 1;
    }
    assert_eq!(completed, 40 * scenarios.len());
}
