//! In-memory variable cache.

use std::collections::HashMap;

use async_trait::async_trait;
use manifold_application::ports::{CacheError, VariableCache};
use manifold_domain::VariableSetId;
use parking_lot::Mutex;

/// Variable cache held in process memory.
///
/// Entries are unique per `(variable set, name)`; a second insert for the same
/// pair fails with [`CacheError::AlreadyExists`] and leaves the first id in place.
#[derive(Debug, Default)]
pub struct InMemoryVariableCache {
    entries: Mutex<HashMap<(VariableSetId, String), String>>,
}

impl InMemoryVariableCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VariableCache for InMemoryVariableCache {
    async fn lookup(
        &self,
        variable_set: VariableSetId,
        name: &str,
    ) -> Result<Option<String>, CacheError> {
        Ok(self
            .entries
            .lock()
            .get(&(variable_set, name.to_string()))
            .cloned())
    }

    async fn insert(
        &self,
        variable_set: VariableSetId,
        name: &str,
        external_id: &str,
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        let key = (variable_set, name.to_string());
        if entries.contains_key(&key) {
            return Err(CacheError::AlreadyExists {
                variable_set,
                name: name.to_string(),
            });
        }
        entries.insert(key, external_id.to_string());
        Ok(())
    }
}
