//! Compute backends for tone-mapping kernels.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher<B: KernelBackend>
//!     +-- CpuBackend  (rayon parallelization)
//!     +-- WgpuBackend (Vulkan/Metal/DX12)
//! ```
//!
//! A backend turns a [`KernelDescriptor`] into an opaque program handle
//! once, then executes that handle against any number of buffers.

mod cpu_backend;
mod detect;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

pub(crate) use cpu_backend::CpuBackend;
pub use detect::{BackendInfo, describe_backends, detect_backends};

#[cfg(feature = "wgpu")]
pub(crate) use wgpu_backend::WgpuBackend;

use crate::ComputeResult;
use crate::kernel::KernelDescriptor;

/// Available compute backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Auto-select best available (wgpu > CPU).
    #[default]
    Auto,
    /// CPU backend using rayon for parallelization.
    Cpu,
    /// wgpu backend (Vulkan/Metal/DX12).
    Wgpu,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Auto => true,
            Self::Cpu => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuBackend::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Wgpu => "wgpu",
        }
    }

    /// Parses `cpu`, `wgpu`/`gpu` or `auto` (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "cpu" => Some(Self::Cpu),
            "wgpu" | "gpu" => Some(Self::Wgpu),
            _ => None,
        }
    }
}

/// Compiles and runs per-sample kernels on one device.
///
/// Internal seam between the dispatcher and the devices; callers pick a
/// device through [`Backend`].
///
/// `execute` never writes into the caller's slice: the result is always a
/// fresh buffer of the same length, so a failure cannot leave the input
/// half-processed.
pub(crate) trait KernelBackend: Send + Sync {
    /// Backend-specific compiled program.
    type Program: Send + Sync;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Builds a program from its descriptor.
    fn compile(&self, kernel: &KernelDescriptor) -> ComputeResult<Self::Program>;

    /// Applies `program` to every sample in `samples`.
    ///
    /// `params` has already been validated against the descriptor.
    fn execute(&self, program: &Self::Program, samples: &[f32], params: &[f32]) -> ComputeResult<Vec<f32>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse() {
        assert_eq!(Backend::from_name("CPU"), Some(Backend::Cpu));
        assert_eq!(Backend::from_name(" gpu "), Some(Backend::Wgpu));
        assert_eq!(Backend::from_name("auto"), Some(Backend::Auto));
        assert_eq!(Backend::from_name("cuda"), None);
        assert_eq!(Backend::default(), Backend::Auto);
    }

    #[test]
    fn cpu_always_available() {
        assert!(Backend::Cpu.is_available());
        assert!(Backend::Auto.is_available());
        #[cfg(not(feature = "wgpu"))]
        assert!(!Backend::Wgpu.is_available());
    }
}
