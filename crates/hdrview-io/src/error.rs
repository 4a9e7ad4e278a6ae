//! Error types for I/O operations.
//!
//! Failures on one source are recoverable at the call boundary: a caller
//! walking many files can log the error and move on to the next one.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// I/O operation error.
#[derive(Debug, Error)]
pub enum IoError {
    /// Source could not be opened or read.
    #[error("source unavailable: {}: {reason}", path.display())]
    SourceUnavailable {
        /// Path of the source.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Source layout that cannot be streamed scanline by scanline.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Output could not be created or written.
    #[error("write failed: {}: {reason}", path.display())]
    WriteFailure {
        /// Target path.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// Corrupted or truncated data inside an opened source.
    #[error("decode error: {0}")]
    Decode(String),

    /// Caller-supplied argument out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A scanline before the reader position was requested.
    #[error("scanline {requested} requested after scanline {current} was consumed")]
    OutOfOrderRead {
        /// Requested row.
        requested: u32,
        /// Row the reader is positioned past.
        current: u32,
    },

    /// Output would not fit in the configured memory budget.
    #[error("resample needs {required} bytes, budget is {budget} bytes")]
    MemoryBudget {
        /// Bytes needed.
        required: u64,
        /// Bytes allowed.
        budget: u64,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl IoError {
    /// Builds a [`IoError::SourceUnavailable`] for `path`.
    pub fn source_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::SourceUnavailable { path: path.into(), reason: reason.to_string() }
    }

    /// Builds a [`IoError::WriteFailure`] for `path`.
    pub fn write_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WriteFailure { path: path.into(), reason: reason.to_string() }
    }
}

/// Result type for I/O operations.
pub type IoResult<T> = Result<T, IoError>;
