//! Dispatcher configuration.
//!
//! ```ignore
//! use hdrview_compute::{DispatcherBuilder, Backend};
//!
//! let dispatcher = DispatcherBuilder::new()
//!     .backend(Backend::Cpu)
//!     .build()?;
//! ```
//!
//! With [`Backend::Auto`] the `HDRVIEW_BACKEND` environment variable
//! (`cpu`, `wgpu` or `auto`) picks the backend.

use tracing::warn;

use crate::ComputeResult;
use crate::backend::Backend;
use crate::dispatcher::KernelDispatcher;
use crate::kernel::{KernelDescriptor, builtin_kernels};

/// Environment variable overriding [`Backend::Auto`].
pub const BACKEND_ENV: &str = "HDRVIEW_BACKEND";

/// Builder for [`KernelDispatcher`].
#[derive(Debug, Clone)]
pub struct DispatcherBuilder {
    backend: Backend,
    kernels: Vec<KernelDescriptor>,
    use_env: bool,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            kernels: builtin_kernels().to_vec(),
            use_env: true,
        }
    }
}

impl DispatcherBuilder {
    /// Auto backend, built-in kernels, environment honoured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a specific backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Register an extra kernel. A descriptor with an existing name
    /// replaces the earlier one.
    pub fn kernel(mut self, kernel: KernelDescriptor) -> Self {
        self.kernels.retain(|k| k.name != kernel.name);
        self.kernels.push(kernel);
        self
    }

    /// Ignore `HDRVIEW_BACKEND`.
    pub fn ignore_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Backend that [`build`](Self::build) will open.
    pub fn resolved_backend(&self) -> Backend {
        if self.backend != Backend::Auto || !self.use_env {
            return self.backend;
        }
        match std::env::var(BACKEND_ENV) {
            Ok(value) => Backend::from_name(&value).unwrap_or_else(|| {
                warn!(value = %value, "Unknown {}, using auto", BACKEND_ENV);
                Backend::Auto
            }),
            Err(_) => Backend::Auto,
        }
    }

    /// Open the backend and compile every registered kernel.
    pub fn build(self) -> ComputeResult<KernelDispatcher> {
        KernelDispatcher::with_kernels(self.resolved_backend(), &self.kernels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn halve(v: f32, _: &[f32]) -> f32 {
        v * 0.5
    }

    const HALVE: KernelDescriptor = KernelDescriptor {
        name: "halve",
        params: &[],
        wgsl: "",
        sample: halve,
    };

    #[test]
    fn explicit_backend_wins() {
        let builder = DispatcherBuilder::new().backend(Backend::Cpu);
        assert_eq!(builder.resolved_backend(), Backend::Cpu);
        assert_eq!(DispatcherBuilder::new().ignore_env().resolved_backend(), Backend::Auto);
    }

    #[test]
    fn extra_kernel_registered() {
        let d = DispatcherBuilder::new().backend(Backend::Cpu).kernel(HALVE).build().unwrap();
        assert_eq!(d.kernels().len(), 4);
        assert_eq!(d.apply("halve", &[2.0, 4.0], &[]).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn same_name_replaces() {
        let builder = DispatcherBuilder::new().kernel(HALVE).kernel(HALVE);
        assert_eq!(builder.kernels.len(), 4);
    }
}
