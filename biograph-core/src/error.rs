//! Error types for biograph-core

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
///
/// These are the structural failures that abort an operation. Per-record
/// problems (malformed rows, invalid CURIEs, missing slots) never surface
/// here; they flow into the [`crate::report::ErrorAggregator`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Format code not recognized by any Source/Sink
    #[error("Unrecognized format: {0}")]
    UnknownFormat(String),

    /// Invalid configuration for a Source, Sink, or Transformer
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// CURIE prefix not present in the prefix map
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// No base IRI matches during strict contraction
    #[error("No contraction for IRI: {0}")]
    NoContraction(String),

    /// A graph-only operation was requested in streaming mode
    #[error("Operation requires a populated graph store: {0}")]
    StreamingUnsupportedOperation(String),

    /// Strict clique merge found incompatible categories in one clique
    #[error("Clique contains incompatible categories: {0}")]
    CliqueConflict(String),

    /// External cancel signal observed between records
    #[error("Transform cancelled")]
    Cancelled,

    /// I/O failure opening or reading inputs, or writing outputs
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error (serde_json)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database client failure (connection, auth, query)
    #[error("Database error: {0}")]
    Database(String),

    /// Database request exceeded its per-operation timeout; transient
    #[error("Database request timed out: {0}")]
    DatabaseTimeout(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an unknown-format error
    pub fn unknown_format(msg: impl Into<String>) -> Self {
        Error::UnknownFormat(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// True for transient failures a caller may retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::DatabaseTimeout(_))
    }
}
