//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the interpolation engine and the
//! systems it collaborates with: the secret store, the variable cache
//! persistence and the audit event recorder. Each port is a trait implemented
//! by adapters in the infrastructure layer.

mod event_recorder;
mod secret_store;
mod variable_cache;

pub use event_recorder::{EventError, EventRecorder};
pub use secret_store::{SecretStore, StoreError, StoreResponse};
pub use variable_cache::{CacheError, VariableCache};
