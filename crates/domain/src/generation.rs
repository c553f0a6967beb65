//! Value generation requests
//!
//! Types describing what the secret store should create when a referenced
//! variable does not exist yet.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::deployment::{DeploymentContext, is_absolute};

/// Variable type whose `ca` parameter refers to another variable.
pub const CERTIFICATE_TYPE: &str = "certificate";

/// A variable declared by a deployment, to be generated up front.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableSpec {
    /// Variable name, relative or absolute.
    pub name: String,

    /// Store type, e.g. `password` or `certificate`.
    #[serde(rename = "type")]
    pub variable_type: String,

    /// Type-specific generation parameters.
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
}

impl VariableSpec {
    /// Declares a variable without generation options.
    #[must_use]
    pub fn new(name: impl Into<String>, variable_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variable_type: variable_type.into(),
            options: None,
        }
    }

    /// Sets the generation options.
    #[must_use]
    pub fn with_options(mut self, options: Map<String, Value>) -> Self {
        self.options = Some(options);
        self
    }
}

/// Body of a store generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Namespaced variable name.
    pub name: String,

    /// Store type.
    #[serde(rename = "type")]
    pub variable_type: String,

    /// Type-specific parameters, with cross references already namespaced.
    pub parameters: Map<String, Value>,
}

impl GenerationRequest {
    /// Builds the request for `name` in the given deployment.
    ///
    /// The name is namespaced. For certificates, a relative `ca` parameter is
    /// namespaced the same way; an absolute one is passed through.
    #[must_use]
    pub fn build(
        ctx: &DeploymentContext,
        name: &str,
        variable_type: &str,
        mut parameters: Map<String, Value>,
    ) -> Self {
        if variable_type == CERTIFICATE_TYPE
            && let Some(Value::String(ca)) = parameters.get_mut("ca")
            && !is_absolute(ca)
        {
            *ca = ctx.namespaced(ca);
        }

        Self {
            name: ctx.namespaced(name),
            variable_type: variable_type.to_string(),
            parameters,
        }
    }
}

/// Builds certificate parameters from the DNS names an instance group answers to.
///
/// The first name becomes the common name; all of them become alternative names.
/// Returns empty parameters when there are no names.
#[must_use]
pub fn certificate_parameters(dns_record_names: &[String]) -> Map<String, Value> {
    let mut parameters = Map::new();
    if let Some(common_name) = dns_record_names.first() {
        parameters.insert("common_name".into(), Value::String(common_name.clone()));
        parameters.insert(
            "alternative_names".into(),
            Value::Array(dns_record_names.iter().cloned().map(Value::String).collect()),
        );
    }
    parameters
}
