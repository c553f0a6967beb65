//! Event recorder port

use async_trait::async_trait;
use manifold_domain::AuditEvent;

/// Errors that can occur while recording events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// The event backend failed.
    #[error("event backend error: {0}")]
    Backend(String),
}

/// Writes audit events to the deployment's event log.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    /// Records one event.
    async fn record(&self, event: AuditEvent) -> Result<(), EventError>;
}
