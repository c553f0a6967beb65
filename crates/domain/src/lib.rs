//! Manifold Domain - Core interpolation types
//!
//! This crate defines the domain model of the manifest interpolation engine:
//! manifest tree paths and ignore patterns, the placeholder grammar, deployment
//! namespacing, generation requests and audit events.
//! All types here are pure Rust with no I/O dependencies.

pub mod deployment;
pub mod error;
pub mod event;
pub mod generation;
pub mod placeholder;
pub mod tree;

pub use deployment::{DeploymentContext, VariableSetId, is_absolute, validate_variable_name};
pub use error::{DomainError, DomainResult};
pub use event::AuditEvent;
pub use generation::{CERTIFICATE_TYPE, GenerationRequest, VariableSpec, certificate_parameters};
pub use placeholder::{PlaceholderRef, PlaceholderToken, full_placeholder, scan_placeholders};
pub use tree::{IgnorePattern, Occurrence, PathSegment, SegmentMatcher, TreePath, discover};
