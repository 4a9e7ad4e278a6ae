//! CPU backend using rayon for parallelization.

use rayon::prelude::*;
use tracing::trace;

use super::KernelBackend;
use crate::kernel::{KernelDescriptor, SampleFn};
use crate::{ComputeError, ComputeResult};

/// Samples per rayon task; tiny buffers are not worth splitting.
const CHUNK: usize = 4096;

/// Compiled CPU program: the descriptor's sample function.
#[derive(Debug, Clone, Copy)]
pub struct CpuProgram {
    kernel: &'static str,
    sample: SampleFn,
}

/// CPU backend.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    available_memory: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        // Get system RAM (fallback to 4GB if detection fails)
        let available_memory = sys_info::mem_info()
            .map(|m| m.avail * 1024)
            .unwrap_or(4 * 1024 * 1024 * 1024);
        Self { available_memory }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelBackend for CpuBackend {
    type Program = CpuProgram;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn compile(&self, kernel: &KernelDescriptor) -> ComputeResult<CpuProgram> {
        Ok(CpuProgram { kernel: kernel.name, sample: kernel.sample })
    }

    fn execute(&self, program: &CpuProgram, samples: &[f32], params: &[f32]) -> ComputeResult<Vec<f32>> {
        let bytes = std::mem::size_of_val(samples) as u64;
        if bytes > self.available_memory {
            return Err(ComputeError::OperationFailed(format!(
                "{} needs {} bytes, {} available",
                program.kernel, bytes, self.available_memory
            )));
        }

        trace!(kernel = program.kernel, samples = samples.len(), "CPU dispatch");
        let sample = program.sample;
        let mut out = samples.to_vec();
        out.par_chunks_mut(CHUNK).for_each(|chunk| {
            for v in chunk {
                *v = sample(*v, params);
            }
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{APPLY_EXPOSURE, APPLY_GAMMA};
    use approx::assert_relative_eq;

    #[test]
    fn exposure_on_large_buffer() {
        let backend = CpuBackend::new();
        let program = backend.compile(&APPLY_EXPOSURE).unwrap();
        let input: Vec<f32> = (0..10_000).map(|i| i as f32).collect();
        let out = backend.execute(&program, &input, &[1.0]).unwrap();
        assert_eq!(out.len(), input.len());
        assert_relative_eq!(out[9_999], 19_998.0);
        // Input untouched.
        assert_eq!(input[1], 1.0);
    }

    #[test]
    fn empty_buffer() {
        let backend = CpuBackend::new();
        let program = backend.compile(&APPLY_GAMMA).unwrap();
        assert!(backend.execute(&program, &[], &[0.5]).unwrap().is_empty());
        assert_eq!(program.kernel, "apply_gamma");
    }
}
