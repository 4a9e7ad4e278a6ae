//! Tone-mapping kernel dispatch for HDR previews.
//!
//! A small, fixed library of per-sample programs (gamma, exposure and the
//! combination) compiled once against a compute backend and applied to
//! interleaved `f32` buffers.
//!
//! # Architecture
//!
//! ```text
//! KernelDispatcher (registry of compiled programs)
//!     └── Backend (CPU or wgpu)
//!             └── KernelBackend trait
//!                     ├── CpuBackend  (rayon)
//!                     └── WgpuBackend (WGSL compute shaders)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hdrview_compute::{KernelDispatcher, Backend};
//!
//! let dispatcher = KernelDispatcher::new(Backend::Auto)?;
//! let graded = dispatcher.apply("apply_exposure_gamma", &pixels, &[0.5, 1.0 / 2.2])?;
//! ```

pub mod backend;
pub mod config;
pub mod dispatcher;
pub mod kernel;
mod shaders;

pub use backend::{Backend, BackendInfo, describe_backends, detect_backends};
pub use config::DispatcherBuilder;
pub use dispatcher::{DispatcherState, KernelDispatcher};
pub use kernel::{KernelDescriptor, builtin_kernels};

use thiserror::Error;

/// Kernel dispatch errors
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("Failed to create device: {0}")]
    DeviceCreation(String),

    #[error("Failed to compile kernel '{kernel}': {log}")]
    ShaderCompilation { kernel: String, log: String },

    #[error("Device transfer failed: {0}")]
    Transfer(String),

    #[error("Kernel not found: {0}")]
    KernelNotFound(String),

    #[error("Kernel '{kernel}' takes {expected} parameter(s), got {actual}")]
    InvalidParams { kernel: String, expected: usize, actual: usize },

    #[error("Buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Compute operation failed: {0}")]
    OperationFailed(String),
}

impl ComputeError {
    /// True for errors raised by the device or driver rather than by the
    /// caller's arguments.
    pub fn is_backend_failure(&self) -> bool {
        !matches!(self, Self::KernelNotFound(_) | Self::InvalidParams { .. })
    }
}

pub type ComputeResult<T> = Result<T, ComputeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_errors_are_not_backend_failures() {
        assert!(!ComputeError::KernelNotFound("x".into()).is_backend_failure());
        let err = ComputeError::InvalidParams { kernel: "apply_gamma".into(), expected: 1, actual: 2 };
        assert!(!err.is_backend_failure());
        assert_eq!(err.to_string(), "Kernel 'apply_gamma' takes 1 parameter(s), got 2");
        assert!(ComputeError::NoAdapter.is_backend_failure());
        assert!(ComputeError::Transfer("map".into()).is_backend_failure());
    }
}
