//! Deployment context and variable namespacing

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Identifier of one generation of a deployment's variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSetId(pub i64);

impl fmt::Display for VariableSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the engine needs to know about the deployment being resolved.
///
/// The variable set is chosen by the deployment lifecycle: normally the
/// deployment's current set, but callers may pin an older one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentContext {
    /// Name of the director owning the deployment.
    pub director_name: String,

    /// Name of the deployment.
    pub deployment_name: String,

    /// Variable set that cache lookups and writes are scoped to.
    pub variable_set: VariableSetId,

    /// Task driving this resolution, for audit events.
    #[serde(default)]
    pub task_id: Option<String>,

    /// User who started the task, for audit events.
    #[serde(default)]
    pub user: Option<String>,
}

impl DeploymentContext {
    /// Creates a context without task information.
    #[must_use]
    pub fn new(
        director_name: impl Into<String>,
        deployment_name: impl Into<String>,
        variable_set: VariableSetId,
    ) -> Self {
        Self {
            director_name: director_name.into(),
            deployment_name: deployment_name.into(),
            variable_set,
            task_id: None,
            user: None,
        }
    }

    /// Attaches the task and user that audit events are correlated to.
    #[must_use]
    pub fn with_task(mut self, task_id: impl Into<String>, user: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self.user = Some(user.into());
        self
    }

    /// Returns the same context scoped to another variable set.
    #[must_use]
    pub fn for_variable_set(&self, variable_set: VariableSetId) -> Self {
        Self {
            variable_set,
            ..self.clone()
        }
    }

    /// Returns the store key for a variable name.
    ///
    /// Absolute names (starting with `/`) are used as-is; relative names are
    /// prefixed with the director and deployment names.
    ///
    /// ```
    /// use manifold_domain::deployment::{DeploymentContext, VariableSetId};
    ///
    /// let ctx = DeploymentContext::new("director", "cf", VariableSetId(1));
    /// assert_eq!(ctx.namespaced("db_password"), "/director/cf/db_password");
    /// assert_eq!(ctx.namespaced("/shared/ca"), "/shared/ca");
    /// ```
    #[must_use]
    pub fn namespaced(&self, name: &str) -> String {
        if is_absolute(name) {
            name.to_string()
        } else {
            format!("/{}/{}/{name}", self.director_name, self.deployment_name)
        }
    }
}

/// Returns true if the variable name is absolute.
#[must_use]
pub fn is_absolute(name: &str) -> bool {
    name.starts_with('/')
}

/// Validates a declared variable name before it is sent to the store.
///
/// # Errors
///
/// Returns [`DomainError::InvalidVariableName`] for empty names, names with
/// characters outside `[A-Za-z0-9_-/]`, and names ending in `/`.
pub fn validate_variable_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::variable_name(name, "Must not be empty"));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/'))
    {
        return Err(DomainError::variable_name(
            name,
            "Must only contain alphanumerics, underscores, dashes or forward slashes",
        ));
    }

    if name.ends_with('/') {
        return Err(DomainError::variable_name(
            name,
            "Must not end with a forward slash",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> DeploymentContext {
        DeploymentContext::new("smurf_director_name", "deployment_name", VariableSetId(2000))
    }

    #[test]
    fn test_namespaced_relative_name() {
        assert_eq!(
            ctx().namespaced("my_smurf"),
            "/smurf_director_name/deployment_name/my_smurf"
        );
    }

    #[test]
    fn test_namespaced_absolute_name() {
        assert_eq!(ctx().namespaced("/placeholder_c"), "/placeholder_c");
    }

    #[test]
    fn test_for_variable_set_keeps_names() {
        let pinned = ctx().with_task("42", "user").for_variable_set(VariableSetId(1500));
        assert_eq!(pinned.variable_set, VariableSetId(1500));
        assert_eq!(pinned.deployment_name, "deployment_name");
        assert_eq!(pinned.task_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_valid_variable_names() {
        for name in ["placeholder_a", "/placeholder_c", "a-b/c_d", "X9"] {
            assert!(validate_variable_name(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn test_invalid_variable_names() {
        for name in ["p*laceholder_a", "placeholder_a/", "", " ", "((vroom))", "a.b"] {
            assert!(
                matches!(
                    validate_variable_name(name),
                    Err(DomainError::InvalidVariableName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }
}
