//! Secret store port
//!
//! Defines the interface for reaching the external secret/credential store.

use async_trait::async_trait;
use manifold_domain::GenerationRequest;

/// Raw answer of the secret store.
///
/// Status handling and body validation are the engine's job, so the port
/// hands back what the store said without interpreting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    /// HTTP status code.
    pub status: u16,

    /// Reason phrase accompanying the status, if any.
    pub reason: Option<String>,

    /// Response body, verbatim.
    pub body: String,
}

impl StoreResponse {
    /// Creates a response with the given status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: None,
            body: body.into(),
        }
    }

    /// Creates a `200` response.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// Sets the reason phrase.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Returns true for `404 Not Found`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Human-readable explanation of a failed response.
    #[must_use]
    pub fn failure_reason(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| format!("HTTP code '{}'", self.status))
    }
}

/// Errors that prevent a request from getting any answer from the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store URL could not be built.
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request timed out.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Access to the external secret store.
///
/// Requests are point-to-point; implementations must not retry.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches a variable by its (namespaced or absolute) name.
    ///
    /// A successful body looks like `{"data": [{"id", "name", "value"}, ...]}`.
    async fn get_by_name(&self, name: &str) -> Result<StoreResponse, StoreError>;

    /// Fetches a variable by its opaque store identifier.
    async fn get_by_id(&self, id: &str) -> Result<StoreResponse, StoreError>;

    /// Asks the store to generate a value.
    ///
    /// A successful body is an object with an `id` field.
    async fn generate(&self, request: &GenerationRequest) -> Result<StoreResponse, StoreError>;
}
