//! Error types.
//!
//! Configuration problems are caught when a table is registered and never
//! surface per request. Storage errors are passed through as the backend's
//! own error type.

use thiserror::Error;

/// Table registration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("column at position {position} has no name; alias it in the base query")]
    UnnamedColumn { position: usize },

    #[error("column at position {position} has an empty name")]
    EmptyName { position: usize },

    #[error("column '{name}' is declared more than once")]
    DuplicateColumn { name: String },

    #[error("column '{name}' is of an unknown type; cast or annotate it")]
    UnknownType { name: String },

    #[error("table has no columns")]
    NoColumns,
}

/// Errors from introspecting a base query.
#[derive(Debug, Error)]
pub enum IntrospectError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to describe base query")]
    Backend(#[source] E),
}

/// Execution errors from the in-memory backend.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid regular expression: {0}")]
    InvalidPattern(#[from] regex::Error),
}
