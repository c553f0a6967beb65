//! Store-backed resolver

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use manifold_domain::placeholder::full_placeholder;
use manifold_domain::{
    DeploymentContext, DomainError, PlaceholderRef, VariableSpec, certificate_parameters, discover,
    validate_variable_name,
};
use serde_json::{Map, Value};

use crate::error::{ResolverError, ResolverResult};
use crate::ports::{EventRecorder, SecretStore, StoreResponse, VariableCache};

use super::generator::GenerationPolicy;
use super::response::{parse_data_response, parse_id_response};
use super::substitute::substitute;
use super::{InterpolateOptions, PropertyOptions, VariableResolver};

/// Resolver that talks to the secret store.
///
/// Values are located through the variable cache first: a cached identifier is
/// fetched by id, anything else by namespaced name, and the identifier found is
/// pinned to the context's variable set.
#[derive(Clone)]
pub struct EnabledResolver {
    store: Arc<dyn SecretStore>,
    cache: Arc<dyn VariableCache>,
    generator: GenerationPolicy,
}

impl EnabledResolver {
    /// Creates a resolver over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn SecretStore>,
        cache: Arc<dyn VariableCache>,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        let generator = GenerationPolicy::new(store.clone(), cache.clone(), events);
        Self {
            store,
            cache,
            generator,
        }
    }

    /// Fetches the value stored under `full_name`, returning the failure line on error.
    async fn fetch_variable(
        &self,
        full_name: &str,
        ctx: &DeploymentContext,
    ) -> Result<Value, String> {
        let cached = self
            .cache
            .lookup(ctx.variable_set, full_name)
            .await
            .map_err(|e| fetch_failure(full_name, &e.to_string()))?;

        if let Some(id) = cached {
            tracing::debug!(name = full_name, id = %id, "fetching cached variable by id");
            return self.fetch_by_id(full_name, &id).await;
        }

        tracing::debug!(name = full_name, "fetching variable by name");
        let response = self
            .store
            .get_by_name(full_name)
            .await
            .map_err(|e| fetch_failure(full_name, &e.to_string()))?;
        check_status(full_name, &response)?;

        let fetched =
            parse_data_response(&response.body).map_err(|cause| fetch_failure(full_name, &cause))?;

        let winner = self
            .cache
            .record(ctx.variable_set, full_name, &fetched.id)
            .await
            .map_err(|e| fetch_failure(full_name, &e.to_string()))?;

        if winner == fetched.id {
            Ok(fetched.value)
        } else {
            tracing::debug!(
                name = full_name,
                id = %winner,
                "another writer pinned the variable first"
            );
            self.fetch_by_id(full_name, &winner).await
        }
    }

    async fn fetch_by_id(&self, full_name: &str, id: &str) -> Result<Value, String> {
        let response = self
            .store
            .get_by_id(id)
            .await
            .map_err(|e| fetch_failure(full_name, &e.to_string()))?;
        check_status(full_name, &response)?;

        parse_id_response(&response.body)
            .map(|fetched| fetched.value)
            .map_err(|cause| fetch_failure(full_name, &cause))
    }

    async fn name_exists(&self, full_name: &str) -> ResolverResult<bool> {
        let response = self
            .store
            .get_by_name(full_name)
            .await
            .map_err(|e| ResolverError::Fetch(fetch_failure(full_name, &e.to_string())))?;

        if response.is_not_found() {
            return Ok(false);
        }
        if !response.is_success() {
            return Err(ResolverError::Fetch(fetch_failure(
                full_name,
                &http_code(response.status),
            )));
        }
        Ok(true)
    }
}

#[async_trait]
impl VariableResolver for EnabledResolver {
    async fn interpolate(
        &self,
        tree: &Value,
        ctx: &DeploymentContext,
        options: &InterpolateOptions,
    ) -> ResolverResult<Value> {
        let occurrences = discover(tree, &options.subtrees_to_ignore);
        if occurrences.is_empty() {
            return Ok(tree.clone());
        }

        let mut seen = HashSet::new();
        let mut references = Vec::new();
        let mut syntax_errors: Vec<DomainError> = Vec::new();
        for occurrence in &occurrences {
            if !seen.insert(occurrence.body.as_str()) {
                continue;
            }
            match PlaceholderRef::parse(&occurrence.body) {
                Ok(reference) => references.push((occurrence.body.as_str(), reference)),
                Err(error) => syntax_errors.push(error),
            }
        }
        if !syntax_errors.is_empty() {
            return Err(ResolverError::aggregated_syntax(&syntax_errors));
        }

        if options.must_be_absolute_name
            && let Some((_, reference)) = references.iter().find(|(_, r)| !r.is_absolute())
        {
            return Err(ResolverError::AbsoluteNameRequired(reference.name.clone()));
        }

        let mut names: Vec<String> = Vec::new();
        for (_, reference) in &references {
            let full_name = ctx.namespaced(&reference.name);
            if !names.contains(&full_name) {
                names.push(full_name);
            }
        }

        let results = join_all(names.iter().map(|name| self.fetch_variable(name, ctx))).await;

        let mut failures = Vec::new();
        let mut fetched: HashMap<&str, Value> = HashMap::new();
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(value) => {
                    fetched.insert(name.as_str(), value);
                }
                Err(failure) => failures.push(failure),
            }
        }

        let mut resolved = HashMap::new();
        for (body, reference) in &references {
            let namespaced = PlaceholderRef {
                name: ctx.namespaced(&reference.name),
                ..reference.clone()
            };
            let Some(value) = fetched.get(namespaced.name.as_str()) else {
                continue;
            };
            match descend(value, &namespaced) {
                Ok(found) => {
                    resolved.insert((*body).to_string(), found.clone());
                }
                Err(failure) => {
                    if !failures.contains(&failure) {
                        failures.push(failure);
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(ResolverError::aggregated_fetch(&failures));
        }

        tracing::debug!(
            variables = names.len(),
            occurrences = occurrences.len(),
            "interpolated placeholders"
        );
        Ok(substitute(tree, &occurrences, &resolved))
    }

    async fn prepare_and_get_property(
        &self,
        value: Option<&Value>,
        default: Option<&Value>,
        variable_type: Option<&str>,
        ctx: &DeploymentContext,
        options: &PropertyOptions,
    ) -> ResolverResult<Option<Value>> {
        let Some(value) = value else {
            return Ok(default.cloned());
        };
        let Some(body) = value.as_str().and_then(full_placeholder) else {
            return Ok(Some(value.clone()));
        };

        let reference = PlaceholderRef::parse(body)?;
        if options.must_be_absolute_name && !reference.is_absolute() {
            return Err(ResolverError::AbsoluteNameRequired(reference.name));
        }

        let full_name = ctx.namespaced(&reference.name);
        if self.name_exists(&full_name).await? {
            return Ok(Some(value.clone()));
        }

        if let Some(default) = default {
            return Ok(Some(default.clone()));
        }

        match variable_type {
            Some(variable_type) if !reference.suppress_generation => {
                let parameters = if variable_type == manifold_domain::CERTIFICATE_TYPE {
                    certificate_parameters(&options.dns_record_names)
                } else {
                    Map::new()
                };
                self.generator
                    .generate(&reference.name, variable_type, parameters, ctx)
                    .await?;
            }
            _ => {
                tracing::debug!(name = %full_name, "variable not found and not generated");
            }
        }

        Ok(Some(value.clone()))
    }

    async fn generate_values(
        &self,
        variables: &[VariableSpec],
        ctx: &DeploymentContext,
    ) -> ResolverResult<()> {
        let syntax_errors: Vec<DomainError> = variables
            .iter()
            .filter_map(|variable| validate_variable_name(&variable.name).err())
            .collect();
        if !syntax_errors.is_empty() {
            return Err(ResolverError::aggregated_syntax(&syntax_errors));
        }

        for variable in variables {
            self.generator
                .generate(
                    &variable.name,
                    &variable.variable_type,
                    variable.options.clone().unwrap_or_default(),
                    ctx,
                )
                .await?;
        }
        Ok(())
    }
}

fn fetch_failure(full_name: &str, cause: &str) -> String {
    format!("Failed to fetch variable '{full_name}' from config server: {cause}")
}

fn check_status(full_name: &str, response: &StoreResponse) -> Result<(), String> {
    if response.is_not_found() {
        return Err(format!(
            "Failed to find variable '{full_name}' from config server: HTTP code '404'"
        ));
    }
    if !response.is_success() {
        return Err(fetch_failure(full_name, &http_code(response.status)));
    }
    Ok(())
}

fn http_code(status: u16) -> String {
    format!("HTTP code '{status}'")
}

/// Walks the reference's sub-path into a fetched value. The reference name must
/// already be namespaced. A missing key fails naming the deepest parent found.
fn descend<'a>(value: &'a Value, reference: &PlaceholderRef) -> Result<&'a Value, String> {
    let mut current = value;
    for (depth, key) in reference.sub_path.iter().enumerate() {
        let Some(child) = current.as_object().and_then(|object| object.get(key)) else {
            let parent = reference.dotted_prefix(depth);
            return Err(fetch_failure(
                &reference.name,
                &format!("Expected parent '{parent}' hash to have key '{key}'"),
            ));
        };
        current = child;
    }
    Ok(current)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::significant_drop_tightening,
    clippy::too_many_lines
)]
mod tests {
    use super::*;
    use crate::ports::{CacheError, EventError, StoreError};
    use manifold_domain::{AuditEvent, GenerationRequest, IgnorePattern, VariableSetId};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    const DIRECTOR: &str = "smurf_director_name";
    const DEPLOYMENT: &str = "deployment_name";
    const SET: VariableSetId = VariableSetId(2000);
    const NO_OPTIONS: PropertyOptions = PropertyOptions {
        dns_record_names: Vec::new(),
        must_be_absolute_name: false,
    };

    fn ns(name: &str) -> String {
        format!("/{DIRECTOR}/{DEPLOYMENT}/{name}")
    }

    fn ctx() -> DeploymentContext {
        DeploymentContext::new(DIRECTOR, DEPLOYMENT, SET).with_task("42", "user")
    }

    fn data(id: impl Into<Value>, name: &str, value: Value) -> StoreResponse {
        let entry = json!({"id": id.into(), "name": name, "value": value});
        StoreResponse::ok(json!({ "data": [entry] }).to_string())
    }

    #[derive(Default)]
    struct FakeStore {
        by_name: Mutex<HashMap<String, StoreResponse>>,
        by_id: Mutex<HashMap<String, StoreResponse>>,
        generated: Mutex<Vec<GenerationRequest>>,
        generate_answers: Mutex<Vec<StoreResponse>>,
        name_calls: Mutex<Vec<String>>,
        id_calls: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn with_name(self, name: &str, response: StoreResponse) -> Self {
            self.by_name.lock().unwrap().insert(name.into(), response);
            self
        }

        fn with_id(self, id: &str, response: StoreResponse) -> Self {
            self.by_id.lock().unwrap().insert(id.into(), response);
            self
        }

        fn answering_generation(self, answers: Vec<StoreResponse>) -> Self {
            *self.generate_answers.lock().unwrap() = answers;
            self
        }

        fn store_calls(&self) -> usize {
            self.name_calls.lock().unwrap().len()
                + self.id_calls.lock().unwrap().len()
                + self.generated.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SecretStore for FakeStore {
        async fn get_by_name(&self, name: &str) -> Result<StoreResponse, StoreError> {
            self.name_calls.lock().expect("Lock poisoned").push(name.into());
            Ok(self
                .by_name
                .lock()
                .expect("Lock poisoned")
                .get(name)
                .cloned()
                .unwrap_or_else(|| StoreResponse::new(404, "")))
        }

        async fn get_by_id(&self, id: &str) -> Result<StoreResponse, StoreError> {
            self.id_calls.lock().expect("Lock poisoned").push(id.into());
            Ok(self
                .by_id
                .lock()
                .expect("Lock poisoned")
                .get(id)
                .cloned()
                .unwrap_or_else(|| StoreResponse::new(404, "")))
        }

        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<StoreResponse, StoreError> {
            self.generated.lock().expect("Lock poisoned").push(request.clone());
            let mut answers = self.generate_answers.lock().expect("Lock poisoned");
            if answers.is_empty() {
                return Ok(StoreResponse::ok(r#"{"id": "some_id1"}"#));
            }
            Ok(answers.remove(0))
        }
    }

    #[derive(Default)]
    struct FakeCache {
        entries: Mutex<HashMap<(VariableSetId, String), String>>,
    }

    impl FakeCache {
        fn with_entry(self, set: VariableSetId, name: &str, id: &str) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert((set, name.into()), id.into());
            self
        }

        fn get(&self, set: VariableSetId, name: &str) -> Option<String> {
            self.entries.lock().unwrap().get(&(set, name.into())).cloned()
        }
    }

    #[async_trait]
    impl VariableCache for FakeCache {
        async fn lookup(
            &self,
            set: VariableSetId,
            name: &str,
        ) -> Result<Option<String>, CacheError> {
            Ok(self.get(set, name))
        }

        async fn insert(
            &self,
            set: VariableSetId,
            name: &str,
            id: &str,
        ) -> Result<(), CacheError> {
            let mut entries = self.entries.lock().expect("Lock poisoned");
            let key = (set, name.to_string());
            if entries.contains_key(&key) {
                return Err(CacheError::AlreadyExists {
                    variable_set: set,
                    name: name.into(),
                });
            }
            entries.insert(key, id.into());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeEvents {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl EventRecorder for FakeEvents {
        async fn record(&self, event: AuditEvent) -> Result<(), EventError> {
            self.events.lock().expect("Lock poisoned").push(event);
            Ok(())
        }
    }

    struct Harness {
        store: Arc<FakeStore>,
        cache: Arc<FakeCache>,
        events: Arc<FakeEvents>,
        resolver: EnabledResolver,
    }

    fn harness(store: FakeStore, cache: FakeCache) -> Harness {
        let store = Arc::new(store);
        let cache = Arc::new(cache);
        let events = Arc::new(FakeEvents::default());
        let resolver = EnabledResolver::new(store.clone(), cache.clone(), events.clone());
        Harness {
            store,
            cache,
            events,
            resolver,
        }
    }

    fn stored(store: FakeStore, id: impl Into<Value>, name: &str, value: Value) -> FakeStore {
        let full_name = ns(name);
        let response = data(id, &full_name, value);
        store.with_name(&full_name, response)
    }

    fn manifest_store() -> FakeStore {
        let store = FakeStore::default();
        let store = stored(store, "1", "nil_placeholder", Value::Null);
        let store = stored(store, "2", "empty_placeholder", json!(""));
        let store = stored(store, "3", "integer_placeholder", json!(123));
        let store = stored(store, "5", "job_placeholder", json!("test2"));
        let store = stored(store, "6", "env_placeholder", json!("test3"));
        stored(
            store,
            "7",
            "cert_placeholder",
            json!({"ca": "ca_value", "private_key": "abc123"}),
        )
    }

    async fn interpolate(h: &Harness, tree: &Value) -> ResolverResult<Value> {
        h.resolver
            .interpolate(tree, &ctx(), &InterpolateOptions::new())
            .await
    }

    #[tokio::test]
    async fn test_replaces_every_placeholder() {
        let h = harness(manifest_store(), FakeCache::default());
        let manifest = json!({
            "name": DEPLOYMENT,
            "properties": {
                "name": "((integer_placeholder))",
                "nil_allowed": "((nil_placeholder))",
                "empty_allowed": "((empty_placeholder))"
            },
            "instance_groups": {
                "name": "bla",
                "jobs": [{"name": "test_job", "properties": {"job_prop": "((job_placeholder))"}}]
            },
            "resource_pools": [{"env": {"env_prop": "((env_placeholder))"}}],
            "cert": "((cert_placeholder))"
        });

        let result = interpolate(&h, &manifest).await.unwrap();

        assert_eq!(
            result,
            json!({
                "name": DEPLOYMENT,
                "properties": {"name": 123, "nil_allowed": null, "empty_allowed": ""},
                "instance_groups": {
                    "name": "bla",
                    "jobs": [{"name": "test_job", "properties": {"job_prop": "test2"}}]
                },
                "resource_pools": [{"env": {"env_prop": "test3"}}],
                "cert": {"ca": "ca_value", "private_key": "abc123"}
            })
        );
        assert_eq!(h.cache.get(SET, &ns("cert_placeholder")), Some("7".into()));
    }

    #[tokio::test]
    async fn test_tree_without_placeholders_is_copied() {
        let h = harness(FakeStore::default(), FakeCache::default());
        let manifest = json!({"name": "plain", "list": [1, "two"]});

        let result = interpolate(&h, &manifest).await.unwrap();

        assert_eq!(result, manifest);
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_embedded_placeholders_render_textually() {
        let h = harness(manifest_store(), FakeCache::default());
        let manifest = json!({
            "url": "db://((job_placeholder)):((integer_placeholder))/((nil_placeholder))",
            "cert": "pem ((cert_placeholder))"
        });

        let result = interpolate(&h, &manifest).await.unwrap();

        assert_eq!(
            result,
            json!({
                "url": "db://test2:123/",
                "cert": r#"pem {"ca":"ca_value","private_key":"abc123"}"#
            })
        );
    }

    #[tokio::test]
    async fn test_duplicate_names_fetched_once() {
        let h = harness(manifest_store(), FakeCache::default());
        let manifest = json!({
            "a": "((integer_placeholder))",
            "b": ["((integer_placeholder))", "((!integer_placeholder))"],
            "c": "x ((integer_placeholder))"
        });

        let result = interpolate(&h, &manifest).await.unwrap();

        assert_eq!(result, json!({"a": 123, "b": [123, 123], "c": "x 123"}));
        assert_eq!(
            *h.store.name_calls.lock().unwrap(),
            vec![ns("integer_placeholder")]
        );
    }

    #[tokio::test]
    async fn test_bang_prefix_is_stripped() {
        let h = harness(manifest_store(), FakeCache::default());
        let manifest = json!({"properties": {"name": "((!integer_placeholder))"}});

        let result = interpolate(&h, &manifest).await.unwrap();

        assert_eq!(result, json!({"properties": {"name": 123}}));
    }

    #[tokio::test]
    async fn test_ignored_subtrees_are_left_alone() {
        let store = FakeStore::default();
        let store = stored(store, 1, "release_1_placeholder", json!("release_1"));
        let store = stored(store, 2, "release_2_version_placeholder", json!("v2"));
        let store = stored(store, 3, "job_name", json!("spring_server"));
        let h = harness(store, FakeCache::default());

        let manifest = json!({
            "releases": [
                {"name": "((release_1_placeholder))", "version": "v1"},
                {"name": "release_2", "version": "((release_2_version_placeholder))"}
            ],
            "instance_groups": [{
                "name": "logs",
                "env": {"smurf": "((smurf_placeholder))"},
                "jobs": [
                    {
                        "name": "mysql",
                        "properties": {
                            "foo": "((foo_place_holder))",
                            "bar": {"smurf": "((smurf_placeholder))"}
                        }
                    },
                    {"name": "((job_name))"}
                ],
                "properties": {"a": ["123", 45, "((secret_name))"]}
            }],
            "properties": {"global_property": "((something))"},
            "resource_pools": [
                {"name": "resource_pool_name", "env": {"f": "((f_placeholder))"}}
            ]
        });

        let ignored = vec![
            IgnorePattern::new().key("properties"),
            IgnorePattern::new()
                .key("instance_groups")
                .any_index()
                .key("properties"),
            IgnorePattern::new()
                .key("instance_groups")
                .any_index()
                .key("jobs")
                .any_index()
                .key("properties"),
            IgnorePattern::new()
                .key("instance_groups")
                .any_index()
                .key("jobs")
                .any_index()
                .key("consumes")
                .any_key()
                .key("properties"),
            IgnorePattern::new().key("instance_groups").any_index().key("env"),
            IgnorePattern::new().key("resource_pools").any_index().key("env"),
            IgnorePattern::new().key("name"),
        ];

        let options = InterpolateOptions::new().ignoring(ignored);
        let result = h
            .resolver
            .interpolate(&manifest, &ctx(), &options)
            .await
            .unwrap();

        let mut expected = manifest.clone();
        expected["releases"][0]["name"] = json!("release_1");
        expected["releases"][1]["version"] = json!("v2");
        expected["instance_groups"][0]["jobs"][1]["name"] = json!("spring_server");
        assert_eq!(result, expected);
        assert_eq!(h.store.name_calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_responses_are_aggregated() {
        let body = |value: Value| StoreResponse::ok(value.to_string());
        let store = FakeStore::default()
            .with_name("/bad1", StoreResponse::ok("Invalid JSON response"))
            .with_name("/bad2", body(json!({"data": "Not Array"})))
            .with_name("/bad3", body(json!({"data": []})))
            .with_name(
                "/bad4",
                body(json!({"data": [{"name": "name exists", "value": "value exists"}]})),
            )
            .with_name(
                "/bad5",
                body(json!({"data": [{"id": "id exists", "name": "name exists"}]})),
            );
        let h = harness(store, FakeCache::default());
        let manifest = json!({
            "name": DEPLOYMENT,
            "properties": {
                "p1": "((/bad1))",
                "p2": "((/bad2))",
                "p3": "((/bad3))",
                "p4": "((/bad4))",
                "p5": "((/bad5))"
            }
        });

        let err = interpolate(&h, &manifest).await.unwrap_err();

        assert!(matches!(err, ResolverError::Fetch(_)));
        let line = |name: &str, cause: &str| {
            format!("- Failed to fetch variable '{name}' from config server: {cause}")
        };
        assert_eq!(
            err.to_string(),
            [
                line("/bad1", "Invalid JSON response"),
                line("/bad2", "Expected data to be an array"),
                line("/bad3", "Expected data to be non empty array"),
                line("/bad4", "Expected data[0] to have key 'id'"),
                line("/bad5", "Expected data[0] to have key 'value'"),
            ]
            .join("\n")
        );
        assert!(h.cache.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_forbidden_variables() {
        let store =
            manifest_store().with_name(&ns("forbidden"), StoreResponse::new(403, ""));
        let h = harness(store, FakeCache::default());
        let manifest = json!({
            "ok": "((integer_placeholder))",
            "missing": "((missing_placeholder))",
            "forbidden": "((forbidden))"
        });

        let err = interpolate(&h, &manifest).await.unwrap_err().to_string();

        assert!(err.contains(&format!(
            "- Failed to find variable '{}' from config server: HTTP code '404'",
            ns("missing_placeholder")
        )));
        assert!(err.contains(&format!(
            "- Failed to fetch variable '{}' from config server: HTTP code '403'",
            ns("forbidden")
        )));
        assert!(h.store.generated.lock().unwrap().is_empty());
    }

    fn nested_store() -> FakeStore {
        FakeStore::default().with_name(
            "/nested_placeholder",
            data("some_id", "/nested_placeholder", json!({"x": {"y": {"z": "gold"}}})),
        )
    }

    #[tokio::test]
    async fn test_dot_syntax_descends_into_value() {
        let h = harness(nested_store(), FakeCache::default());
        let manifest = json!({
            "nest1": "((/nested_placeholder.x))",
            "nest2": "((/nested_placeholder.x.y))",
            "nest3": "((/nested_placeholder.x.y.z))"
        });

        let result = interpolate(&h, &manifest).await.unwrap();

        assert_eq!(
            result,
            json!({"nest1": {"y": {"z": "gold"}}, "nest2": {"z": "gold"}, "nest3": "gold"})
        );
        assert_eq!(
            *h.store.name_calls.lock().unwrap(),
            vec!["/nested_placeholder".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dot_syntax_missing_keys_name_deepest_parent() {
        let h = harness(nested_store(), FakeCache::default());
        let manifest = json!({
            "properties": {
                "p1": "((/nested_placeholder.a))",
                "p2": "((/nested_placeholder.x.y.a))",
                "p3": "((/nested_placeholder.x.a.y))",
                "p4": "((/nested_placeholder.a.b))"
            }
        });

        let err = interpolate(&h, &manifest).await.unwrap_err();

        let line = |parent: &str| {
            format!(
                "- Failed to fetch variable '/nested_placeholder' from config server: \
                 Expected parent '{parent}' hash to have key 'a'"
            )
        };
        assert_eq!(
            err.to_string(),
            [
                line("/nested_placeholder"),
                line("/nested_placeholder.x.y"),
                line("/nested_placeholder.x"),
            ]
            .join("\n")
        );
    }

    #[tokio::test]
    async fn test_syntax_errors_abort_before_network() {
        let h = harness(manifest_store(), FakeCache::default());

        let err = interpolate(&h, &json!({"bad_nest": "((nested_placeholder..x))"}))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Placeholder name 'nested_placeholder..x' syntax error: \
             Must not contain consecutive dots"
        );

        let manifest = json!({
            "a": "((I am an invalid name &%^))",
            "b": "((x..y))",
            "c": "((integer_placeholder))"
        });
        let err = interpolate(&h, &manifest).await.unwrap_err();
        assert!(
            matches!(&err, ResolverError::IncorrectNameSyntax(m) if m.lines().count() == 2)
        );
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_absolute_names_required() {
        let h = harness(manifest_store(), FakeCache::default());
        let options = InterpolateOptions::new().absolute_names_only();

        let err = h
            .resolver
            .interpolate(&json!({"a": "((integer_placeholder))"}), &ctx(), &options)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Names must be absolute path: integer_placeholder"
        );
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_cached_variable_fetched_by_id() {
        let bare = json!({"id": "cfg-svr-id", "name": "/boo", "value": "var_val"});
        let bare = StoreResponse::ok(bare.to_string());
        let store = FakeStore::default().with_id("cfg-svr-id", bare);
        let cache = FakeCache::default().with_entry(SET, "/boo", "cfg-svr-id");
        let h = harness(store, cache);

        let result = interpolate(&h, &json!({"key": "((/boo))"})).await.unwrap();

        assert_eq!(result, json!({"key": "var_val"}));
        assert_eq!(
            *h.store.id_calls.lock().unwrap(),
            vec!["cfg-svr-id".to_string()]
        );
        assert!(h.store.name_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_variable_set_is_consulted() {
        let bare = StoreResponse::ok(json!({"id": "cfg-svr-id", "value": "var_val"}).to_string());
        let store = FakeStore::default().with_id("cfg-svr-id", bare);
        let cache = FakeCache::default()
            .with_entry(VariableSetId(1500), "/boo", "unused id")
            .with_entry(SET, "/boo", "cfg-svr-id");
        let h = harness(store, cache);
        let latest = DeploymentContext::new(DIRECTOR, DEPLOYMENT, VariableSetId(1500));

        h.resolver
            .interpolate(
                &json!({"key": "((/boo))"}),
                &latest.for_variable_set(SET),
                &InterpolateOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            *h.store.id_calls.lock().unwrap(),
            vec!["cfg-svr-id".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fetch_by_name_pins_id_to_set() {
        let store =
            FakeStore::default().with_name("/boo", data("cfg-svr-id", "/boo", json!("var_val")));
        let h = harness(store, FakeCache::default());

        interpolate(&h, &json!({"key": "((/boo))"})).await.unwrap();

        assert_eq!(h.cache.get(SET, "/boo"), Some("cfg-svr-id".into()));
        assert_eq!(h.cache.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_cache_race_fetches_winner_by_id() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct RacingCache;

        #[async_trait]
        impl VariableCache for RacingCache {
            async fn lookup(
                &self,
                _: VariableSetId,
                _: &str,
            ) -> Result<Option<String>, CacheError> {
                static CALLS: AtomicUsize = AtomicUsize::new(0);
                let call = CALLS.fetch_add(1, Ordering::SeqCst);
                Ok((call > 0).then(|| "winner-id".to_string()))
            }

            async fn insert(
                &self,
                set: VariableSetId,
                name: &str,
                _: &str,
            ) -> Result<(), CacheError> {
                Err(CacheError::AlreadyExists {
                    variable_set: set,
                    name: name.into(),
                })
            }
        }

        let winner = json!({"id": "winner-id", "value": "fresh"});
        let store = Arc::new(
            FakeStore::default()
                .with_name("/boo", data("loser-id", "/boo", json!("stale")))
                .with_id("winner-id", StoreResponse::ok(winner.to_string())),
        );
        let resolver = EnabledResolver::new(
            store.clone(),
            Arc::new(RacingCache),
            Arc::new(FakeEvents::default()),
        );

        let result = resolver
            .interpolate(
                &json!({"key": "((/boo))"}),
                &ctx(),
                &InterpolateOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(result, json!({"key": "fresh"}));
        assert_eq!(*store.id_calls.lock().unwrap(), vec!["winner-id".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_id_failures_are_aggregated() {
        let store = FakeStore::default()
            .with_id("gone", StoreResponse::new(500, ""))
            .with_id("junk", StoreResponse::ok(r#"{"id": "junk"}"#));
        let cache = FakeCache::default()
            .with_entry(SET, "/a", "gone")
            .with_entry(SET, "/b", "junk");
        let h = harness(store, cache);

        let err = interpolate(&h, &json!({"a": "((/a))", "b": "((/b))"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::Fetch(_)));
        assert_eq!(
            err.to_string(),
            [
                "- Failed to fetch variable '/a' from config server: HTTP code '500'",
                "- Failed to fetch variable '/b' from config server: \
                 Expected response to have key 'value'",
            ]
            .join("\n")
        );
        assert_eq!(*h.store.id_calls.lock().unwrap(), vec!["gone", "junk"]);
        assert!(h.store.name_calls.lock().unwrap().is_empty());
    }

    async fn property(
        h: &Harness,
        value: Option<Value>,
        default: Option<Value>,
        variable_type: Option<&str>,
        options: &PropertyOptions,
    ) -> ResolverResult<Option<Value>> {
        h.resolver
            .prepare_and_get_property(
                value.as_ref(),
                default.as_ref(),
                variable_type,
                &ctx(),
                options,
            )
            .await
    }

    #[tokio::test]
    async fn test_property_without_value_returns_default() {
        let h = harness(FakeStore::default(), FakeCache::default());

        let default = Some(json!("my_default_value"));
        let result = property(&h, None, default, Some("some_type"), &NO_OPTIONS)
            .await
            .unwrap();

        assert_eq!(result, Some(json!("my_default_value")));
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_property_not_a_full_placeholder_is_returned() {
        let h = harness(FakeStore::default(), FakeCache::default());

        for raw in [
            "my_smurf",
            "((my_smurf",
            "my_smurf))",
            "((my_smurf))((vroom))",
            "((my_smurf)) i am happy",
            "this is ((smurf_1)) this is ((smurf_2))",
        ] {
            let default = Some(json!("d"));
            let result = property(&h, Some(json!(raw)), default, Some("whatever"), &NO_OPTIONS)
                .await
                .unwrap();
            assert_eq!(result, Some(json!(raw)));
        }
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_property_invalid_syntax() {
        let h = harness(FakeStore::default(), FakeCache::default());

        let value = Some(json!("((invalid name $%$^))"));
        let err = property(&h, value, None, None, &NO_OPTIONS)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolverError::IncorrectNameSyntax(_)));
    }

    #[tokio::test]
    async fn test_property_relative_name_rejected_before_lookup() {
        let h = harness(manifest_store(), FakeCache::default());
        let options = PropertyOptions {
            must_be_absolute_name: true,
            ..PropertyOptions::default()
        };

        let value = Some(json!("((integer_placeholder))"));
        let err = property(&h, value, Some(json!("d")), Some("password"), &options)
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            ResolverError::AbsoluteNameRequired(name) if name == "integer_placeholder"
        ));
        assert_eq!(h.store.store_calls(), 0);

        let absolute = property(&h, Some(json!("((/abs))")), None, None, &options)
            .await
            .unwrap();
        assert_eq!(absolute, Some(json!("((/abs))")));
    }

    #[tokio::test]
    async fn test_property_store_error() {
        let store = FakeStore::default().with_name(&ns("my_smurf"), StoreResponse::new(403, ""));
        let h = harness(store, FakeCache::default());

        let value = Some(json!("((my_smurf))"));
        let err = property(&h, value, Some(json!("d")), None, &NO_OPTIONS)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to fetch variable '/smurf_director_name/deployment_name/my_smurf' \
             from config server: HTTP code '403'"
        );
    }

    #[tokio::test]
    async fn test_property_found_is_returned_as_is() {
        let response = data("whateverid", "whatevername", json!("hello"));
        let store = FakeStore::default().with_name(&ns("my_smurf"), response);
        let h = harness(store, FakeCache::default());

        for raw in ["((my_smurf))", "((!my_smurf))"] {
            let result = property(&h, Some(json!(raw)), Some(json!("d")), None, &NO_OPTIONS)
                .await
                .unwrap();
            assert_eq!(result, Some(json!(raw)));
        }
    }

    #[tokio::test]
    async fn test_property_not_found_uses_default() {
        let h = harness(FakeStore::default(), FakeCache::default());

        for raw in ["((my_smurf))", "((!my_smurf))"] {
            for variable_type in [None, Some("some_type"), Some("password")] {
                let default = Some(json!("my_default_value"));
                let result = property(&h, Some(json!(raw)), default, variable_type, &NO_OPTIONS)
                    .await
                    .unwrap();
                assert_eq!(result, Some(json!("my_default_value")));
            }
        }
        assert!(h.store.generated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_property_not_found_generates_when_typed() {
        let store = FakeStore::default().answering_generation(vec![StoreResponse::ok(
            json!({"id": 858, "name": ns("my_smurf"), "value": "abc"}).to_string(),
        )]);
        let h = harness(store, FakeCache::default());

        let value = Some(json!("((my_smurf))"));
        let result = property(&h, value, None, Some("any-type-you-like"), &NO_OPTIONS)
            .await
            .unwrap();

        assert_eq!(result, Some(json!("((my_smurf))")));
        assert_eq!(h.cache.get(SET, &ns("my_smurf")), Some("858".into()));
        let events = h.events.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].object_name, ns("my_smurf"));
        assert_eq!(
            Value::Object(events[0].context.clone()),
            json!({"id": 858, "name": ns("my_smurf")})
        );
    }

    #[tokio::test]
    async fn test_property_certificate_uses_dns_names() {
        let h = harness(FakeStore::default(), FakeCache::default());
        let options = PropertyOptions {
            dns_record_names: vec![
                "*.fake-name1.network-a.simple.bosh".into(),
                "*.fake-name1.network-b.simple.bosh".into(),
            ],
            must_be_absolute_name: false,
        };

        for raw in ["((my_smurf))", "((my_smurf.ca))", "((my_smurf.ca.fingerprint))"] {
            let result = property(&h, Some(json!(raw)), None, Some("certificate"), &options)
                .await
                .unwrap();
            assert_eq!(result, Some(json!(raw)));
        }

        let generated = h.store.generated.lock().unwrap();
        assert_eq!(generated.len(), 3);
        assert_eq!(generated[0].name, ns("my_smurf"));
        assert_eq!(
            Value::Object(generated[0].parameters.clone()),
            json!({
                "common_name": "*.fake-name1.network-a.simple.bosh",
                "alternative_names": [
                    "*.fake-name1.network-a.simple.bosh",
                    "*.fake-name1.network-b.simple.bosh"
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_property_generation_failure() {
        let rejection = StoreResponse::new(403, "").with_reason("There was a problem.");
        let store = FakeStore::default().answering_generation(vec![rejection]);
        let h = harness(store, FakeCache::default());

        let value = Some(json!("((my_smurf))"));
        let err = property(&h, value, None, Some("any-type-you-like"), &NO_OPTIONS)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!(
                "Config Server failed to generate value for '{}' with type 'any-type-you-like'. \
                 Error: 'There was a problem.'",
                ns("my_smurf")
            )
        );
        assert!(h.events.events.lock().unwrap()[0].is_error());
    }

    #[tokio::test]
    async fn test_property_bang_or_untyped_is_not_generated() {
        let h = harness(FakeStore::default(), FakeCache::default());

        let bang = property(&h, Some(json!("((!my_smurf))")), None, Some("password"), &NO_OPTIONS)
            .await
            .unwrap();
        let untyped = property(&h, Some(json!("((my_smurf))")), None, None, &NO_OPTIONS)
            .await
            .unwrap();

        assert_eq!(bang, Some(json!("((!my_smurf))")));
        assert_eq!(untyped, Some(json!("((my_smurf))")));
        assert!(h.store.generated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_values_rejects_bad_names() {
        let h = harness(FakeStore::default(), FakeCache::default());

        for name in ["p*laceholder_a", "placeholder_a/", "", " ", "((vroom))"] {
            let variables = vec![VariableSpec::new(name, "password")];
            let err = h.resolver.generate_values(&variables, &ctx()).await.unwrap_err();
            assert!(matches!(err, ResolverError::IncorrectNameSyntax(_)), "{name:?}");
        }

        let mixed = vec![
            VariableSpec::new("good", "password"),
            VariableSpec::new("bad/", "password"),
        ];
        assert!(h.resolver.generate_values(&mixed, &ctx()).await.is_err());
        assert_eq!(h.store.store_calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_values_in_order() {
        let answer = |value: Value| StoreResponse::ok(value.to_string());
        let store = FakeStore::default().answering_generation(vec![
            answer(json!({"id": 1, "name": ns("placeholder_a"), "value": "abc"})),
            answer(json!({"id": 2, "name": ns("placeholder_b"), "value": "my_cert_value"})),
            answer(json!({"id": 3, "name": "/placeholder_c", "value": "value_3"})),
        ]);
        let h = harness(store, FakeCache::default());
        let as_map = |value: Value| value.as_object().cloned().unwrap();
        let variables = vec![
            VariableSpec::new("placeholder_a", "password"),
            VariableSpec::new("placeholder_b", "certificate").with_options(as_map(json!({
                "ca": "my_ca",
                "common_name": "bosh.io",
                "alternative_names": ["a.bosh.io", "b.bosh.io"]
            }))),
            VariableSpec::new("/placeholder_c", "gold")
                .with_options(as_map(json!({"need": "luck"}))),
        ];

        h.resolver.generate_values(&variables, &ctx()).await.unwrap();

        let generated = h.store.generated.lock().unwrap();
        let sent: Vec<Value> = generated
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect();
        assert_eq!(
            sent,
            vec![
                json!({"name": ns("placeholder_a"), "type": "password", "parameters": {}}),
                json!({
                    "name": ns("placeholder_b"),
                    "type": "certificate",
                    "parameters": {
                        "ca": ns("my_ca"),
                        "common_name": "bosh.io",
                        "alternative_names": ["a.bosh.io", "b.bosh.io"]
                    }
                }),
                json!({"name": "/placeholder_c", "type": "gold", "parameters": {"need": "luck"}}),
            ]
        );

        assert_eq!(h.cache.get(SET, &ns("placeholder_a")), Some("1".into()));
        assert_eq!(h.cache.get(SET, &ns("placeholder_b")), Some("2".into()));
        assert_eq!(h.cache.get(SET, "/placeholder_c"), Some("3".into()));

        let events = h.events.events.lock().unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.object_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                ns("placeholder_a").as_str(),
                ns("placeholder_b").as_str(),
                "/placeholder_c"
            ]
        );
        assert_eq!(
            Value::Object(events[2].context.clone()),
            json!({"id": 3, "name": "/placeholder_c"})
        );
    }

    #[tokio::test]
    async fn test_generate_values_stops_at_first_failure() {
        let store = FakeStore::default().answering_generation(vec![
            StoreResponse::ok("NOT JSON"),
            StoreResponse::ok(r#"{"id": "never"}"#),
        ]);
        let h = harness(store, FakeCache::default());
        let variables = vec![
            VariableSpec::new("a", "password"),
            VariableSpec::new("b", "password"),
        ];

        let err = h.resolver.generate_values(&variables, &ctx()).await.unwrap_err();

        assert!(matches!(err, ResolverError::Generation(_)));
        assert_eq!(h.store.generated.lock().unwrap().len(), 1);
    }
}
