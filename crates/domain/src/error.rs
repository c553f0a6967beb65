//! Domain error types

use thiserror::Error;

/// Domain-level errors that can occur while validating placeholders and variable names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A placeholder token does not follow the placeholder grammar.
    #[error("Placeholder name '{name}' syntax error: {reason}")]
    InvalidPlaceholder {
        /// The offending token body, verbatim.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A declared variable name cannot be used as a store key.
    #[error("Variable name '{name}' syntax error: {reason}")]
    InvalidVariableName {
        /// The offending variable name, verbatim.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl DomainError {
    pub(crate) fn placeholder(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPlaceholder {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn variable_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVariableName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
