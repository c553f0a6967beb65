//! Generation policy
//!
//! Asks the store to create missing variables, caches the new identifiers and
//! keeps an audit trail of every attempt.

use std::sync::Arc;

use manifold_domain::{AuditEvent, DeploymentContext, GenerationRequest};
use serde_json::{Map, Value};

use crate::error::{ResolverError, ResolverResult};
use crate::ports::{EventRecorder, SecretStore, VariableCache};

use super::response::{GenerationBodyError, parse_generation_response};

/// Creates variable values through the secret store.
#[derive(Clone)]
pub struct GenerationPolicy {
    store: Arc<dyn SecretStore>,
    cache: Arc<dyn VariableCache>,
    events: Arc<dyn EventRecorder>,
}

impl GenerationPolicy {
    /// Creates a policy over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn SecretStore>,
        cache: Arc<dyn VariableCache>,
        events: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            store,
            cache,
            events,
        }
    }

    /// Generates a value for `name` and returns its store identifier.
    ///
    /// The identifier is recorded in the variable cache under the context's
    /// variable set, and a `create variable` event is recorded whether or not
    /// generation succeeds.
    ///
    /// # Errors
    /// [`ResolverError::Generation`] when the store rejects the request or
    /// answers with something other than a JSON object carrying an `id`.
    pub async fn generate(
        &self,
        name: &str,
        variable_type: &str,
        parameters: Map<String, Value>,
        ctx: &DeploymentContext,
    ) -> ResolverResult<String> {
        let request = GenerationRequest::build(ctx, name, variable_type, parameters);
        let full_name = request.name.as_str();

        tracing::debug!(name = full_name, variable_type, "requesting value generation");

        let response = match self.store.generate(&request).await {
            Ok(response) => response,
            Err(error) => {
                let message = rejected_message(full_name, variable_type, &error.to_string());
                tracing::error!("{message}");
                return Err(self.fail(ctx, full_name, message).await);
            }
        };

        if !response.is_success() {
            let message = rejected_message(full_name, variable_type, &response.failure_reason());
            tracing::error!("{message}");
            return Err(self.fail(ctx, full_name, message).await);
        }

        let generated = match parse_generation_response(&response.body) {
            Ok(generated) => generated,
            Err(GenerationBodyError::NotJson) => {
                let message = format!(
                    "Config Server returned a NON-JSON body while generating value for \
                     '{full_name}' with type '{variable_type}'"
                );
                return Err(self.fail(ctx, full_name, message).await);
            }
            Err(GenerationBodyError::MissingId) => {
                let message = format!(
                    "Config Server returned a body without an 'id' while generating value for \
                     '{full_name}' with type '{variable_type}'"
                );
                return Err(self.fail(ctx, full_name, message).await);
            }
        };

        let id = self
            .cache
            .record(ctx.variable_set, full_name, &generated.id)
            .await?;

        self.events
            .record(AuditEvent::variable_created(ctx, full_name).with_context(generated.context))
            .await?;

        tracing::info!(name = full_name, variable_type, id = %id, "generated variable");
        Ok(id)
    }

    /// Records the failure event and builds the error to raise.
    async fn fail(
        &self,
        ctx: &DeploymentContext,
        full_name: &str,
        message: String,
    ) -> ResolverError {
        let event = AuditEvent::variable_created(ctx, full_name).with_error(message.clone());
        if let Err(error) = self.events.record(event).await {
            tracing::warn!(name = full_name, %error, "could not record generation failure event");
        }
        ResolverError::Generation(message)
    }
}

fn rejected_message(full_name: &str, variable_type: &str, reason: &str) -> String {
    format!(
        "Config Server failed to generate value for '{full_name}' with type '{variable_type}'. \
         Error: '{reason}'"
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::significant_drop_tightening
)]
mod tests {
    use super::*;
    use crate::ports::{CacheError, EventError, StoreError, StoreResponse};
    use async_trait::async_trait;
    use manifold_domain::VariableSetId;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct ScriptedStore {
        answer: StoreResponse,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl SecretStore for ScriptedStore {
        async fn get_by_name(&self, _: &str) -> Result<StoreResponse, StoreError> {
            Err(StoreError::Other("unexpected fetch".into()))
        }

        async fn get_by_id(&self, _: &str) -> Result<StoreResponse, StoreError> {
            Err(StoreError::Other("unexpected fetch".into()))
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<StoreResponse, StoreError> {
            self.requests.lock().expect("Lock poisoned").push(request.clone());
            Ok(self.answer.clone())
        }
    }

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<(VariableSetId, String), String>>,
    }

    #[async_trait]
    impl VariableCache for MapCache {
        async fn lookup(
            &self,
            set: VariableSetId,
            name: &str,
        ) -> Result<Option<String>, CacheError> {
            let entries = self.entries.lock().expect("Lock poisoned");
            Ok(entries.get(&(set, name.to_string())).cloned())
        }

        async fn insert(&self, set: VariableSetId, name: &str, id: &str) -> Result<(), CacheError> {
            let mut entries = self.entries.lock().expect("Lock poisoned");
            entries.insert((set, name.to_string()), id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct EventLog {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl EventRecorder for EventLog {
        async fn record(&self, event: AuditEvent) -> Result<(), EventError> {
            self.events.lock().expect("Lock poisoned").push(event);
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<ScriptedStore>,
        cache: Arc<MapCache>,
        events: Arc<EventLog>,
        policy: GenerationPolicy,
    }

    fn fixture(answer: StoreResponse) -> Fixture {
        let store = Arc::new(ScriptedStore {
            answer,
            requests: Mutex::new(Vec::new()),
        });
        let cache = Arc::new(MapCache::default());
        let events = Arc::new(EventLog::default());
        let policy = GenerationPolicy::new(store.clone(), cache.clone(), events.clone());
        Fixture {
            store,
            cache,
            events,
            policy,
        }
    }

    fn ctx() -> DeploymentContext {
        DeploymentContext::new("smurf_director_name", "deployment_name", VariableSetId(2000))
            .with_task("42", "user")
    }

    const FULL_NAME: &str = "/smurf_director_name/deployment_name/my_smurf";

    #[tokio::test]
    async fn test_generate_caches_and_records_event() {
        let body = json!({"id": 858, "name": FULL_NAME, "value": "abc"}).to_string();
        let f = fixture(StoreResponse::ok(body));

        let id = f
            .policy
            .generate("my_smurf", "any-type-you-like", Map::new(), &ctx())
            .await
            .unwrap();

        assert_eq!(id, "858");
        assert_eq!(
            f.cache.lookup(VariableSetId(2000), FULL_NAME).await.unwrap(),
            Some("858".to_string())
        );

        let requests = f.store.requests.lock().unwrap();
        assert_eq!(requests[0].name, FULL_NAME);
        assert_eq!(requests[0].variable_type, "any-type-you-like");
        assert!(requests[0].parameters.is_empty());

        let events = f.events.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user.as_deref(), Some("user"));
        assert_eq!(events[0].action, "create");
        assert_eq!(events[0].object_type, "variable");
        assert_eq!(events[0].object_name, FULL_NAME);
        assert_eq!(events[0].task.as_deref(), Some("42"));
        assert_eq!(events[0].deployment.as_deref(), Some("deployment_name"));
        assert_eq!(events[0].instance, None);
        assert_eq!(
            Value::Object(events[0].context.clone()),
            json!({"id": 858, "name": FULL_NAME})
        );
    }

    #[tokio::test]
    async fn test_rejected_generation_records_error_event() {
        let f = fixture(StoreResponse::new(403, "").with_reason("There was a problem."));

        let err = f
            .policy
            .generate("my_smurf", "any-type-you-like", Map::new(), &ctx())
            .await
            .unwrap_err();

        let expected = format!(
            "Config Server failed to generate value for '{FULL_NAME}' with type \
             'any-type-you-like'. Error: 'There was a problem.'"
        );
        assert!(matches!(&err, ResolverError::Generation(m) if *m == expected));

        let events = f.events.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].error.as_deref(), Some(expected.as_str()));
        assert!(events[0].context.is_empty());
        assert!(f.cache.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_json_answer() {
        let f = fixture(StoreResponse::ok("NOT JSON!!!"));

        let err = f
            .policy
            .generate("placeholder_a", "password", Map::new(), &ctx())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Config Server returned a NON-JSON body while generating value for \
             '/smurf_director_name/deployment_name/placeholder_a' with type 'password'"
        );
        assert!(f.events.events.lock().unwrap()[0].is_error());
    }

    #[tokio::test]
    async fn test_certificate_ca_is_namespaced() {
        let f = fixture(StoreResponse::ok(r#"{"id": "some_id2"}"#));
        let parameters = json!({"ca": "my_ca", "common_name": "bosh.io"})
            .as_object()
            .cloned()
            .unwrap();

        f.policy
            .generate("placeholder_b", "certificate", parameters, &ctx())
            .await
            .unwrap();

        let requests = f.store.requests.lock().unwrap();
        assert_eq!(
            requests[0].parameters["ca"],
            json!("/smurf_director_name/deployment_name/my_ca")
        );
    }

    #[tokio::test]
    async fn test_lost_cache_race_returns_winner_id() {
        struct TakenCache;

        #[async_trait]
        impl VariableCache for TakenCache {
            async fn lookup(
                &self,
                _: VariableSetId,
                _: &str,
            ) -> Result<Option<String>, CacheError> {
                Ok(Some("winner".into()))
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

        let store = Arc::new(ScriptedStore {
            answer: StoreResponse::ok(r#"{"id": "loser"}"#),
            requests: Mutex::new(Vec::new()),
        });
        let policy = GenerationPolicy::new(
            store,
            Arc::new(TakenCache),
            Arc::new(EventLog::default()),
        );

        let id = policy
            .generate("my_smurf", "password", Map::new(), &ctx())
            .await
            .unwrap();

        assert_eq!(id, "winner");
    }
}
