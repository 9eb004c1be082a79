//! Query error types
//!
//! Defines all error conditions that can occur while building, parsing and
//! evaluating a query. Every variant is terminal for the evaluation it
//! occurs in and names the offending identifier or construct.

use crate::query::identifier::IdentifierKind;
use thiserror::Error;

/// Errors that can occur during query operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Query text could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A name does not satisfy identifier rules
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// A name was declared more than once anywhere in the query
    #[error("Duplicate identifier: '{0}' is already declared")]
    DuplicateIdentifier(String),

    /// A referenced name was never declared before its use
    #[error("Unknown identifier: '{0}'")]
    UnknownIdentifier(String),

    /// A referenced name is declared, but with the wrong kind
    #[error("Invalid reference: '{name}' is declared as {found}, expected {expected}")]
    InvalidReference {
        name: String,
        expected: IdentifierKind,
        found: IdentifierKind,
    },

    /// A value was read before the aggregation engine bound it
    #[error("Unbound value: '{0}' has not been computed yet")]
    UnboundValue(String),

    /// Structurally invalid query element
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Query evaluation failed
    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
