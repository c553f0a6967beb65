//! Application use cases (business logic orchestration).

mod resolve_manifest;

pub use resolve_manifest::*;
