//! Input error types
//!
//! Errors raised while loading a data point series from a file or reader.

use thiserror::Error;

/// Errors that can occur while reading input series
#[derive(Error, Debug)]
pub enum InputError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A row lacks a required column
    #[error("Line {line}: missing column {column}")]
    MissingColumn { line: usize, column: usize },

    /// A timestamp cell could not be parsed
    #[error("Line {line}: could not parse timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    /// The file extension does not name a known input format
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for input operations
pub type InputResult<T> = Result<T, InputError>;
