//! Manifest tree navigation
//!
//! A manifest is held as a [`serde_json::Value`]. This module addresses positions
//! inside it ([`TreePath`]), prunes regions of it ([`IgnorePattern`]) and discovers
//! the placeholder tokens it contains ([`discover`]).

mod ignore;
mod path;
mod walker;

pub use ignore::{IgnorePattern, SegmentMatcher};
pub use path::{PathSegment, TreePath};
pub use walker::{Occurrence, discover};
