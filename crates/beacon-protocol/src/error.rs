//! Error types for beacon identity parsing and record decoding

use thiserror::Error;

/// Errors that can occur while parsing identities or decoding records
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Proximity UUID string is not a valid UUID
    #[error("invalid proximity UUID: {0:?}")]
    InvalidUuid(String),

    /// Record has the wrong number of bytes
    #[error("invalid record length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
