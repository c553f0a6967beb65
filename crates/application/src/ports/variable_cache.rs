//! Variable cache port
//!
//! Defines the interface for the persisted `(variable set, name) -> store id`
//! mapping consulted before any store request.

use async_trait::async_trait;
use manifold_domain::VariableSetId;

/// Errors that can occur during cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Another writer already stored an entry for this pair.
    #[error("variable '{name}' already recorded in variable set {variable_set}")]
    AlreadyExists {
        /// Variable set of the conflicting entry.
        variable_set: VariableSetId,
        /// Variable name of the conflicting entry.
        name: String,
    },

    /// The persistence backend failed.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Repository trait for the variable cache.
///
/// Entries are unique per `(variable set, name)`, created lazily, and never
/// updated or deleted by the engine.
#[async_trait]
pub trait VariableCache: Send + Sync {
    /// Returns the store id recorded for `name` in `variable_set`.
    async fn lookup(
        &self,
        variable_set: VariableSetId,
        name: &str,
    ) -> Result<Option<String>, CacheError>;

    /// Inserts a new entry.
    ///
    /// # Errors
    /// Returns [`CacheError::AlreadyExists`] if the pair is already present.
    async fn insert(
        &self,
        variable_set: VariableSetId,
        name: &str,
        external_id: &str,
    ) -> Result<(), CacheError>;

    /// Records an entry, resolving insert races.
    ///
    /// If another writer won the race for the same pair, the winner's entry is
    /// re-read and returned instead of failing. The returned id is the one
    /// every caller will observe from now on.
    async fn record(
        &self,
        variable_set: VariableSetId,
        name: &str,
        external_id: &str,
    ) -> Result<String, CacheError> {
        match self.insert(variable_set, name, external_id).await {
            Ok(()) => Ok(external_id.to_string()),
            Err(CacheError::AlreadyExists { .. }) => {
                tracing::debug!(%variable_set, name, "cache entry already recorded, re-reading");
                self.lookup(variable_set, name).await?.ok_or_else(|| {
                    CacheError::Backend(format!(
                        "entry for '{name}' in variable set {variable_set} conflicted \
                         but could not be read back"
                    ))
                })
            }
            Err(error) => Err(error),
        }
    }
}
