//! Audit events

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::deployment::DeploymentContext;

/// Action recorded when a variable value is created.
pub const CREATE_ACTION: &str = "create";

/// Object type recorded for variable events.
pub const VARIABLE_OBJECT_TYPE: &str = "variable";

/// One audit record, handed to the event-recording collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// User that started the task.
    pub user: Option<String>,
    /// What happened, e.g. `create`.
    pub action: String,
    /// Kind of object acted upon, e.g. `variable`.
    pub object_type: String,
    /// Name of the object acted upon.
    pub object_name: String,
    /// Task the action belongs to.
    pub task: Option<String>,
    /// Deployment the action belongs to.
    pub deployment: Option<String>,
    /// Instance the action belongs to, if any.
    pub instance: Option<String>,
    /// Free-form details.
    pub context: Map<String, Value>,
    /// Error message when the action failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// A `create variable` event for `object_name`, correlated to the context's task
    /// and deployment.
    #[must_use]
    pub fn variable_created(ctx: &DeploymentContext, object_name: impl Into<String>) -> Self {
        Self {
            user: ctx.user.clone(),
            action: CREATE_ACTION.to_string(),
            object_type: VARIABLE_OBJECT_TYPE.to_string(),
            object_name: object_name.into(),
            task: ctx.task_id.clone(),
            deployment: Some(ctx.deployment_name.clone()),
            instance: None,
            context: Map::new(),
            error: None,
        }
    }

    /// Sets the context details.
    #[must_use]
    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Marks the event as failed.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true if the event records a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
