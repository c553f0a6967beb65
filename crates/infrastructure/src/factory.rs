//! Resolver construction from settings.

use std::sync::Arc;

use manifold_application::ports::{EventRecorder, VariableCache};
use manifold_application::variable_resolver::{
    DisabledResolver, EnabledResolver, VariableResolver,
};

use crate::adapters::HttpSecretStore;
use crate::settings::{Settings, SettingsError};

/// Builds the resolver selected by `settings.enabled`.
///
/// The enabled resolver talks to an [`HttpSecretStore`] at `store.url`; the
/// disabled one never touches the store, cache or event recorder.
///
/// # Errors
///
/// Returns an error if the resolver is enabled and the store URL is missing
/// or invalid.
pub fn build_resolver(
    settings: &Settings,
    cache: Arc<dyn VariableCache>,
    events: Arc<dyn EventRecorder>,
) -> Result<Arc<dyn VariableResolver>, SettingsError> {
    if !settings.enabled {
        tracing::info!("variable resolution disabled");
        return Ok(Arc::new(DisabledResolver));
    }

    let url = settings
        .store
        .url
        .as_deref()
        .ok_or(SettingsError::MissingStoreUrl)?;
    let store = HttpSecretStore::new(url, settings.store.timeout())
        .map_err(|e| SettingsError::Store(e.to_string()))?;

    tracing::info!(store = %store.base_url(), "variable resolution enabled");
    Ok(Arc::new(EnabledResolver::new(Arc::new(store), cache, events)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryEventLog, InMemoryVariableCache};
    use manifold_application::variable_resolver::InterpolateOptions;
    use manifold_domain::{DeploymentContext, VariableSetId};
    use serde_json::json;

    fn build(settings: &Settings) -> Result<Arc<dyn VariableResolver>, SettingsError> {
        build_resolver(
            settings,
            Arc::new(InMemoryVariableCache::new()),
            Arc::new(InMemoryEventLog::new()),
        )
    }

    #[tokio::test]
    async fn test_disabled_by_default() {
        let resolver = build(&Settings::default()).unwrap();
        let tree = json!({"password": "((pw))"});
        let ctx = DeploymentContext::new("d", "dep", VariableSetId(1));

        let result = resolver
            .interpolate(&tree, &ctx, &InterpolateOptions::new())
            .await
            .unwrap();

        assert_eq!(result, tree);
    }

    #[test]
    fn test_enabled_requires_store_url() {
        let settings = Settings {
            enabled: true,
            ..Settings::default()
        };

        assert!(matches!(build(&settings), Err(SettingsError::MissingStoreUrl)));
    }

    #[test]
    fn test_enabled_rejects_bad_url() {
        let mut settings = Settings {
            enabled: true,
            ..Settings::default()
        };
        settings.store.url = Some("::nope".into());

        assert!(matches!(build(&settings), Err(SettingsError::Store(_))));
    }

    #[test]
    fn test_enabled_with_url() {
        let mut settings = Settings {
            enabled: true,
            ..Settings::default()
        };
        settings.store.url = Some("http://127.0.0.1:8080".into());

        assert!(build(&settings).is_ok());
    }
}
