//! End-to-end resolution against a mocked secret store.
//!
//! Wires the enabled resolver through the settings factory, the reqwest
//! store adapter and the in-memory cache and event log, with a wiremock
//! server standing in for the config server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use manifold_application::ports::VariableCache;
use manifold_application::{InterpolateOptions, ResolveManifest, ResolverError};
use manifold_domain::{VariableSetId, VariableSpec};
use manifold_infrastructure::{InMemoryEventLog, InMemoryVariableCache, Settings, build_resolver};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST: &str = r"
name: web
properties:
  admin_password: ((admin_password))
instance_groups:
- name: api
  instances: ((/shared/instances))
  jobs:
  - name: server
    properties:
      url: https://((/shared/domain)):((port))/login
      tls: ((server_cert.certificate))
";

struct Env {
    server: MockServer,
    cache: Arc<InMemoryVariableCache>,
    events: Arc<InMemoryEventLog>,
    settings: Settings,
}

async fn env() -> Env {
    let server = MockServer::start().await;
    let settings = Settings::from_yaml(&format!(
        "enabled: true\ndirector_name: bosh\nstore:\n  url: {}\n  timeout_secs: 5\n",
        server.uri()
    ))
    .unwrap();
    Env {
        server,
        cache: Arc::new(InMemoryVariableCache::new()),
        events: Arc::new(InMemoryEventLog::new()),
        settings,
    }
}

async fn stored(server: &MockServer, name: &str, id: &str, value: Value) {
    Mock::given(method("GET"))
        .and(path("/v1/data"))
        .and(query_param("name", name))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": id, "name": name, "value": value}]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn resolves_manifest_and_keeps_raw_properties() {
    let env = env().await;
    stored(&env.server, "/bosh/web/admin_password", "1", json!("hunter2")).await;
    stored(&env.server, "/shared/instances", "2", json!(3)).await;
    stored(&env.server, "/shared/domain", "3", json!("example.com")).await;
    stored(&env.server, "/bosh/web/port", "4", json!(8443)).await;
    stored(
        &env.server,
        "/bosh/web/server_cert",
        "5",
        json!({"certificate": "CERT", "private_key": "KEY"}),
    )
    .await;

    let resolver = build_resolver(&env.settings, env.cache.clone(), env.events.clone()).unwrap();
    let ctx = env.settings.deployment_context("web", VariableSetId(10));
    let raw: Value = serde_yaml::from_str(MANIFEST).unwrap();

    let resolved = ResolveManifest::new(resolver)
        .execute(&raw, &ctx, true)
        .await
        .unwrap();

    assert_eq!(resolved["properties"]["admin_password"], json!("hunter2"));
    assert_eq!(
        resolved["uninterpolated_properties"]["admin_password"],
        json!("((admin_password))")
    );
    assert_eq!(resolved["instance_groups"][0]["instances"], json!(3));
    let job = &resolved["instance_groups"][0]["jobs"][0];
    assert_eq!(job["properties"]["url"], json!("https://example.com:8443/login"));
    assert_eq!(job["properties"]["tls"], json!("CERT"));
    assert_eq!(job["uninterpolated_properties"]["tls"], json!("((server_cert.certificate))"));

    for (name, id) in [
        ("/bosh/web/admin_password", "1"),
        ("/shared/instances", "2"),
        ("/shared/domain", "3"),
        ("/bosh/web/port", "4"),
        ("/bosh/web/server_cert", "5"),
    ] {
        let cached = env.cache.lookup(VariableSetId(10), name).await.unwrap();
        assert_eq!(cached.as_deref(), Some(id));
    }
    assert!(env.events.events().is_empty());
}

#[tokio::test]
async fn second_pass_reads_pinned_ids() {
    let env = env().await;
    stored(&env.server, "/bosh/web/pw", "pinned", json!("first")).await;
    Mock::given(method("GET"))
        .and(path("/v1/data/pinned"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pinned", "name": "/bosh/web/pw", "value": "first"
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let resolver = build_resolver(&env.settings, env.cache.clone(), env.events.clone()).unwrap();
    let ctx = env.settings.deployment_context("web", VariableSetId(10));
    let tree = json!({"pw": "((pw))"});

    let first = resolver.interpolate(&tree, &ctx, &InterpolateOptions::new()).await.unwrap();
    let second = resolver.interpolate(&tree, &ctx, &InterpolateOptions::new()).await.unwrap();

    assert_eq!(first, json!({"pw": "first"}));
    assert_eq!(second, first);
}

#[tokio::test]
async fn generates_declared_variables_and_audits_them() {
    let env = env().await;
    Mock::given(method("POST"))
        .and(path("/v1/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "gen-1", "name": "/bosh/web/db_password", "value": "s3cret"
        })))
        .expect(1)
        .mount(&env.server)
        .await;

    let resolver = build_resolver(&env.settings, env.cache.clone(), env.events.clone()).unwrap();
    let ctx = env
        .settings
        .deployment_context("web", VariableSetId(10))
        .with_task("77", "admin");

    resolver
        .generate_values(&[VariableSpec::new("db_password", "password")], &ctx)
        .await
        .unwrap();

    let events = env.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].object_name, "/bosh/web/db_password");
    assert_eq!(events[0].task.as_deref(), Some("77"));
    assert_eq!(events[0].user.as_deref(), Some("admin"));
    assert_eq!(
        Value::Object(events[0].context.clone()),
        json!({"id": "gen-1", "name": "/bosh/web/db_password"})
    );
}

#[tokio::test]
async fn store_rejection_surfaces_as_generation_error() {
    let env = env().await;
    Mock::given(method("POST"))
        .and(path("/v1/data"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&env.server)
        .await;

    let resolver = build_resolver(&env.settings, env.cache.clone(), env.events.clone()).unwrap();
    let ctx = env.settings.deployment_context("web", VariableSetId(10));

    let err = resolver
        .generate_values(&[VariableSpec::new("cert", "certificate")], &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, ResolverError::Generation(_)));
    assert_eq!(
        err.to_string(),
        "Config Server failed to generate value for '/bosh/web/cert' with type 'certificate'. \
         Error: 'Internal Server Error'"
    );
    assert!(env.events.events()[0].is_error());
    let cached = env.cache.lookup(VariableSetId(10), "/bosh/web/cert").await.unwrap();
    assert_eq!(cached, None);
}
