//! Placeholder grammar
//!
//! Manifests reference external variables with `((name))` tokens. A token body
//! may carry a leading `!` that suppresses generation, and a dotted sub-path
//! that descends into a structured value:
//!
//! ```text
//! ((!db_credentials.admin.password))
//!   | '------------' '------------'
//!   |     name          sub-path
//!   suppress generation
//! ```

mod reference;
mod scanner;

pub use reference::PlaceholderRef;
pub use scanner::{CLOSE_MARKER, OPEN_MARKER, PlaceholderToken, full_placeholder, scan_placeholders};
