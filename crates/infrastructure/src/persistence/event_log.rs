//! In-memory audit event log.

use async_trait::async_trait;
use manifold_application::ports::{EventError, EventRecorder};
use manifold_domain::AuditEvent;
use parking_lot::RwLock;

/// Keeps audit events in memory and mirrors them to the tracing output.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<AuditEvent>>,
}

impl InMemoryEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }
}

#[async_trait]
impl EventRecorder for InMemoryEventLog {
    async fn record(&self, event: AuditEvent) -> Result<(), EventError> {
        if event.is_error() {
            tracing::warn!(
                action = %event.action,
                object_type = %event.object_type,
                object_name = %event.object_name,
                error = event.error.as_deref().unwrap_or_default(),
                "audit event"
            );
        } else {
            tracing::info!(
                action = %event.action,
                object_type = %event.object_type,
                object_name = %event.object_name,
                "audit event"
            );
        }
        self.events.write().push(event);
        Ok(())
    }
}
