//! Manifold Application - Resolver ports and use cases
//!
//! This crate defines the ports the interpolation engine talks through
//! (secret store, variable cache, audit events), the `VariableResolver`
//! contract with its enabled and disabled implementations, and the
//! manifest resolution use case.

pub mod error;
pub mod ports;
pub mod use_cases;
pub mod variable_resolver;

pub use error::{ResolverError, ResolverResult};
pub use ports::{
    CacheError, EventError, EventRecorder, SecretStore, StoreError, StoreResponse, VariableCache,
};
pub use use_cases::{ResolveManifest, UNINTERPOLATED_PROPERTIES, shadow_ignore_patterns};
pub use variable_resolver::{
    DisabledResolver, EnabledResolver, FetchedVariable, GeneratedVariable, GenerationPolicy,
    InterpolateOptions, PropertyOptions, VariableResolver,
};
