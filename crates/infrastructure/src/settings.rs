//! Resolver settings.
//!
//! Settings come from an optional YAML file and `MANIFOLD__*` environment
//! variables, the latter taking precedence:
//!
//! ```yaml
//! enabled: true
//! director_name: my-director
//! store:
//!   url: https://config-server.internal:8080
//!   timeout_secs: 30
//! ```
//!
//! `MANIFOLD__STORE__URL=https://...` overrides `store.url`.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use manifold_domain::{DeploymentContext, VariableSetId};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "MANIFOLD";

const ENV_SEPARATOR: &str = "__";

/// Errors while loading settings or building collaborators from them.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The configuration sources could not be read or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The resolver is enabled but no store URL was given.
    #[error("store.url is required when the resolver is enabled")]
    MissingStoreUrl,

    /// The store client could not be created.
    #[error("store client error: {0}")]
    Store(String),
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Whether placeholders are resolved against the store.
    #[serde(default)]
    pub enabled: bool,
    /// Director name used to namespace relative variable names.
    #[serde(default)]
    pub director_name: String,
    /// Secret store connection settings.
    #[serde(default)]
    pub store: StoreSettings,
}

/// Secret store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreSettings {
    /// Base URL of the store.
    #[serde(default)]
    pub url: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl StoreSettings {
    /// Request timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Loads settings from `path` (if given and present) and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value has the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(false));
        }
        builder = builder.add_source(environment());

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parses settings from YAML text, still letting the environment override it.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid YAML for these settings.
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Builds the context for resolving a deployment against a variable set.
    #[must_use]
    pub fn deployment_context(
        &self,
        deployment_name: &str,
        variable_set: VariableSetId,
    ) -> DeploymentContext {
        DeploymentContext::new(&self.director_name, deployment_name, variable_set)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
