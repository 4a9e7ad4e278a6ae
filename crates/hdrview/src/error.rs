//! Error type for the preview pipeline.

use hdrview_compute::ComputeError;
use hdrview_io::IoError;
use thiserror::Error;

/// Any failure from decoding, tone mapping or writing.
#[derive(Debug, Error)]
pub enum Error {
    /// Source, codec or output failure.
    #[error(transparent)]
    Io(#[from] IoError),

    /// Backend or kernel failure.
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl Error {
    /// True when the device or driver failed rather than the input.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, Self::Compute(e) if e.is_backend_failure())
    }
}

/// Result alias for the preview pipeline.
pub type Result<T> = std::result::Result<T, Error>;
