//! Application error types

use manifold_domain::DomainError;
use thiserror::Error;

use crate::ports::{CacheError, EventError};

/// Errors raised while resolving or generating variables.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// One or more placeholder or variable names are malformed.
    #[error("{0}")]
    IncorrectNameSyntax(String),

    /// A relative name was used where only absolute names are accepted.
    #[error("Names must be absolute path: {0}")]
    AbsoluteNameRequired(String),

    /// One or more variables could not be fetched. The message lists every failure.
    #[error("{0}")]
    Fetch(String),

    /// The store rejected or mis-answered a generation request.
    #[error("{0}")]
    Generation(String),

    /// The variable cache failed.
    #[error("variable cache error: {0}")]
    Cache(#[from] CacheError),

    /// An audit event could not be recorded.
    #[error("event recording error: {0}")]
    Events(#[from] EventError),
}

impl From<DomainError> for ResolverError {
    fn from(error: DomainError) -> Self {
        Self::IncorrectNameSyntax(error.to_string())
    }
}

impl ResolverError {
    /// Combines several per-name failures into one fetch error, one `- ` line each.
    #[must_use]
    pub fn aggregated_fetch(failures: &[String]) -> Self {
        Self::Fetch(
            failures
                .iter()
                .map(|failure| format!("- {failure}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    /// Combines several syntax errors into one, one `- ` line each when there is more than one.
    #[must_use]
    pub fn aggregated_syntax(errors: &[DomainError]) -> Self {
        match errors {
            [single] => single.clone().into(),
            _ => Self::IncorrectNameSyntax(
                errors
                    .iter()
                    .map(|error| format!("- {error}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }
}

/// Result type alias for resolver operations.
pub type ResolverResult<T> = Result<T, ResolverError>;
