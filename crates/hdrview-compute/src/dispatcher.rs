//! Named kernel registry bound to one backend.
//!
//! # Example
//!
//! ```ignore
//! use hdrview_compute::{KernelDispatcher, Backend};
//!
//! let dispatcher = KernelDispatcher::new(Backend::Cpu)?;
//! let bright = dispatcher.apply_exposure(&pixels, 1.0)?;
//! let display = dispatcher.apply_gamma(&bright, 1.0 / 2.2)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use tracing::{debug, trace};

#[cfg(feature = "wgpu")]
use crate::backend::WgpuBackend;
use crate::backend::{Backend, CpuBackend, KernelBackend};
use crate::kernel::{self, KernelDescriptor};
use crate::{ComputeError, ComputeResult};

/// Lifecycle of a dispatcher.
///
/// Construction either yields a ready dispatcher or an error; there is no
/// observable half-built state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Device open and every kernel compiled.
    Ready,
    /// Construction failed; no dispatcher exists.
    Failed,
}

impl DispatcherState {
    /// State reached by a construction attempt.
    pub fn of(result: &ComputeResult<KernelDispatcher>) -> Self {
        match result {
            Ok(_) => Self::Ready,
            Err(_) => Self::Failed,
        }
    }
}

/// Registry of compiled programs on a single backend.
pub(crate) struct Dispatcher<B: KernelBackend> {
    backend: B,
    programs: HashMap<&'static str, (KernelDescriptor, B::Program)>,
    // One round trip at a time on the device.
    lock: Mutex<()>,
}

impl<B: KernelBackend> Dispatcher<B> {
    pub(crate) fn compile(backend: B, kernels: &[KernelDescriptor]) -> ComputeResult<Self> {
        let mut programs = HashMap::with_capacity(kernels.len());
        for kernel in kernels {
            let program = backend.compile(kernel)?;
            programs.insert(kernel.name, (*kernel, program));
        }
        debug!(backend = backend.name(), kernels = programs.len(), "Kernel registry compiled");
        Ok(Self { backend, programs, lock: Mutex::new(()) })
    }

    fn apply(&self, name: &str, samples: &[f32], params: &[f32]) -> ComputeResult<Vec<f32>> {
        let (kernel, program) = self
            .programs
            .get(name)
            .ok_or_else(|| ComputeError::KernelNotFound(name.to_string()))?;
        kernel.validate(params)?;

        let _guard = self
            .lock
            .lock()
            .map_err(|_| ComputeError::OperationFailed("dispatcher lock poisoned".into()))?;

        trace!(kernel = name, samples = samples.len(), ?params, "Applying kernel");
        let out = self.backend.execute(program, samples, params)?;
        if out.len() != samples.len() {
            return Err(ComputeError::BufferSizeMismatch { expected: samples.len(), actual: out.len() });
        }
        Ok(out)
    }

    fn kernel_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.programs.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Backend-erased dispatcher.
pub(crate) enum AnyDispatcher {
    Cpu(Dispatcher<CpuBackend>),
    #[cfg(feature = "wgpu")]
    Wgpu(Dispatcher<WgpuBackend>),
}

impl AnyDispatcher {
    pub(crate) fn create(backend: Backend, kernels: &[KernelDescriptor]) -> ComputeResult<Self> {
        match backend {
            Backend::Auto => {
                let best = backend.resolve();
                debug!(backend = best.name(), "Auto-selected backend");
                match Self::create(best, kernels) {
                    Err(e) if best != Backend::Cpu => {
                        debug!(error = %e, "Best backend failed, falling back to CPU");
                        Self::create(Backend::Cpu, kernels)
                    }
                    other => other,
                }
            }
            Backend::Cpu => Ok(Self::Cpu(Dispatcher::compile(CpuBackend::new(), kernels)?)),
            #[cfg(feature = "wgpu")]
            Backend::Wgpu => Ok(Self::Wgpu(Dispatcher::compile(WgpuBackend::new()?, kernels)?)),
            #[cfg(not(feature = "wgpu"))]
            Backend::Wgpu => Err(ComputeError::BackendNotAvailable("wgpu feature not enabled".into())),
        }
    }
}

/// Applies named tone-mapping kernels to sample buffers.
///
/// Every kernel runs once per sample, alpha included. Results are returned
/// in a new buffer of the same length; the input is never handed back
/// unmodified on failure.
///
/// `KernelDispatcher` is `Send + Sync`. Calls from several threads are
/// serialized.
pub struct KernelDispatcher {
    inner: AnyDispatcher,
}

impl KernelDispatcher {
    /// Opens `backend` and compiles the built-in kernel library.
    ///
    /// Any device, compile or transfer failure aborts construction.
    pub fn new(backend: Backend) -> ComputeResult<Self> {
        Self::with_kernels(backend, kernel::builtin_kernels())
    }

    /// Best available backend.
    pub fn auto() -> ComputeResult<Self> {
        Self::new(Backend::Auto)
    }

    pub(crate) fn with_kernels(backend: Backend, kernels: &[KernelDescriptor]) -> ComputeResult<Self> {
        Ok(Self { inner: AnyDispatcher::create(backend, kernels)? })
    }

    /// Always [`DispatcherState::Ready`] for a constructed value.
    pub fn state(&self) -> DispatcherState {
        DispatcherState::Ready
    }

    /// Name of the backend actually in use.
    pub fn backend_name(&self) -> &'static str {
        match &self.inner {
            AnyDispatcher::Cpu(d) => d.backend.name(),
            #[cfg(feature = "wgpu")]
            AnyDispatcher::Wgpu(d) => d.backend.name(),
        }
    }

    /// Registered kernel names, sorted.
    pub fn kernels(&self) -> Vec<&'static str> {
        match &self.inner {
            AnyDispatcher::Cpu(d) => d.kernel_names(),
            #[cfg(feature = "wgpu")]
            AnyDispatcher::Wgpu(d) => d.kernel_names(),
        }
    }

    /// Runs kernel `name` over `samples`.
    ///
    /// # Errors
    ///
    /// - [`ComputeError::KernelNotFound`] for an unregistered name
    /// - [`ComputeError::InvalidParams`] when `params` has the wrong length
    /// - any backend failure from the device round trip
    pub fn apply(&self, name: &str, samples: &[f32], params: &[f32]) -> ComputeResult<Vec<f32>> {
        match &self.inner {
            AnyDispatcher::Cpu(d) => d.apply(name, samples, params),
            #[cfg(feature = "wgpu")]
            AnyDispatcher::Wgpu(d) => d.apply(name, samples, params),
        }
    }

    /// `v^inv_gamma` per sample.
    pub fn apply_gamma(&self, samples: &[f32], inv_gamma: f32) -> ComputeResult<Vec<f32>> {
        self.apply(kernel::APPLY_GAMMA.name, samples, &[inv_gamma])
    }

    /// `v * 2^exposure` per sample.
    pub fn apply_exposure(&self, samples: &[f32], exposure: f32) -> ComputeResult<Vec<f32>> {
        self.apply(kernel::APPLY_EXPOSURE.name, samples, &[exposure])
    }

    /// `(v * 2^exposure)^inv_gamma` per sample.
    pub fn apply_exposure_gamma(&self, samples: &[f32], exposure: f32, inv_gamma: f32) -> ComputeResult<Vec<f32>> {
        self.apply(kernel::APPLY_EXPOSURE_GAMMA.name, samples, &[exposure, inv_gamma])
    }
}

impl fmt::Debug for KernelDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelDispatcher")
            .field("backend", &self.backend_name())
            .field("kernels", &self.kernels())
            .finish()
    }
}
