//! Error types for biograph-vocab

use thiserror::Error;

/// Vocabulary lookup errors
#[derive(Error, Debug)]
pub enum VocabError {
    /// Requested model version is not in the catalogue
    #[error("Unknown Biolink Model version: {0}")]
    UnknownVersion(String),
}
