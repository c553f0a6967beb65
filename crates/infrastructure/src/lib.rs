//! Manifold Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, settings loading and the
//! resolver factory.

pub mod adapters;
pub mod factory;
pub mod persistence;
pub mod settings;
pub mod telemetry;

pub use adapters::HttpSecretStore;
pub use factory::build_resolver;
pub use persistence::{InMemoryEventLog, InMemoryVariableCache};
pub use settings::{Settings, SettingsError, StoreSettings};
pub use telemetry::init_tracing;
