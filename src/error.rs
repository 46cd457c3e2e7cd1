//! Error types shared by the statistics pipeline and its collaborators.
//!
//! Missing data is never an error: aggregation, merging and lookups return
//! `None` for an untested `(subject, operation, size)`.

use crate::EntryKey;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for benchmark pipeline operations.
pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// A compared baseline has an average duration that cannot anchor a
    /// percentage change (zero, negative or non-finite).
    #[error("invalid baseline for {key}: average duration {average} ms")]
    InvalidBaseline { key: EntryKey, average: f64 },

    /// An input document is missing fields or carries out-of-range values.
    #[error("malformed input at {path}: {reason}")]
    MalformedInput { path: String, reason: String },

    /// A configuration parameter is out of range.
    #[error("invalid configuration parameter '{parameter}': {reason}")]
    InvalidConfig { parameter: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BenchError {
    pub(crate) fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        BenchError::MalformedInput {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BenchError::Io {
            path: path.into(),
            source,
        }
    }
}
