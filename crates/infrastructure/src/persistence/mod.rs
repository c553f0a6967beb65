//! In-process persistence adapters.

mod event_log;
mod memory_cache;

pub use event_log::InMemoryEventLog;
pub use memory_cache::InMemoryVariableCache;
