//! Resolver used when no secret store is configured

use async_trait::async_trait;
use manifold_domain::{DeploymentContext, VariableSpec};
use serde_json::Value;

use crate::error::ResolverResult;

use super::{InterpolateOptions, PropertyOptions, VariableResolver};

/// Leaves placeholders untouched and never reaches a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledResolver;

#[async_trait]
impl VariableResolver for DisabledResolver {
    async fn interpolate(
        &self,
        tree: &Value,
        _ctx: &DeploymentContext,
        _options: &InterpolateOptions,
    ) -> ResolverResult<Value> {
        Ok(tree.clone())
    }

    async fn prepare_and_get_property(
        &self,
        value: Option<&Value>,
        default: Option<&Value>,
        _variable_type: Option<&str>,
        _ctx: &DeploymentContext,
        _options: &PropertyOptions,
    ) -> ResolverResult<Option<Value>> {
        Ok(value.or(default).cloned())
    }

    async fn generate_values(
        &self,
        _variables: &[VariableSpec],
        _ctx: &DeploymentContext,
    ) -> ResolverResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use manifold_domain::VariableSetId;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx() -> DeploymentContext {
        DeploymentContext::new("director", "deployment_name", VariableSetId(1))
    }

    #[tokio::test]
    async fn test_interpolate_returns_equal_copy() {
        let resolver: Arc<dyn VariableResolver> = Arc::new(DisabledResolver);
        let manifest = json!({"name": "((not_touched))", "list": ["((a)) and ((b))", 1]});

        let result = resolver
            .interpolate(&manifest, &ctx(), &InterpolateOptions::new().absolute_names_only())
            .await
            .unwrap();

        assert_eq!(result, manifest);
    }

    #[tokio::test]
    async fn test_property_prefers_value_then_default() {
        let resolver = DisabledResolver;
        let options = PropertyOptions {
            dns_record_names: vec!["whatever".into()],
            must_be_absolute_name: true,
        };
        let provided = json!("provided prop");
        let default = json!("default value is here");

        let with_value = resolver
            .prepare_and_get_property(Some(&provided), Some(&default), None, &ctx(), &options)
            .await
            .unwrap();
        let without_value = resolver
            .prepare_and_get_property(
                None,
                Some(&default),
                None,
                &ctx(),
                &PropertyOptions::default(),
            )
            .await
            .unwrap();
        let nothing = resolver
            .prepare_and_get_property(None, None, Some("password"), &ctx(), &options)
            .await
            .unwrap();

        assert_eq!(with_value, Some(provided));
        assert_eq!(without_value, Some(default));
        assert_eq!(nothing, None);
    }

    #[tokio::test]
    async fn test_generate_values_accepts_anything() {
        let variables = vec![VariableSpec::new("((not a valid name))", "password")];

        assert!(DisabledResolver.generate_values(&variables, &ctx()).await.is_ok());
    }
}
