//! Kernel library and parameter descriptors.
//!
//! Each kernel is a per-sample map `v -> f(v, params)`. The descriptor
//! carries both renditions (WGSL for GPU backends, a plain function for the
//! CPU backend) and the names of the parameters it expects, which are
//! checked before anything touches a device.

use crate::shaders;
use crate::{ComputeError, ComputeResult};

/// Per-sample CPU implementation of a kernel.
pub type SampleFn = fn(f32, &[f32]) -> f32;

/// Static description of a tone-mapping kernel.
#[derive(Debug, Clone, Copy)]
pub struct KernelDescriptor {
    /// Registry name, e.g. `apply_gamma`.
    pub name: &'static str,
    /// Parameter names in upload order.
    pub params: &'static [&'static str],
    /// WGSL compute shader with a `main` entry point.
    pub wgsl: &'static str,
    /// CPU rendition of the same map.
    pub sample: SampleFn,
}

impl KernelDescriptor {
    /// Number of scalar parameters.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Rejects a parameter list of the wrong length.
    pub fn validate(&self, params: &[f32]) -> ComputeResult<()> {
        if params.len() != self.params.len() {
            return Err(ComputeError::InvalidParams {
                kernel: self.name.to_string(),
                expected: self.params.len(),
                actual: params.len(),
            });
        }
        Ok(())
    }
}

/// `v^inv_gamma`
pub const APPLY_GAMMA: KernelDescriptor = KernelDescriptor {
    name: "apply_gamma",
    params: &["inv_gamma"],
    wgsl: shaders::APPLY_GAMMA,
    sample: gamma,
};

/// `v * 2^exposure`
pub const APPLY_EXPOSURE: KernelDescriptor = KernelDescriptor {
    name: "apply_exposure",
    params: &["exposure"],
    wgsl: shaders::APPLY_EXPOSURE,
    sample: exposure,
};

/// `(v * 2^exposure)^inv_gamma`
pub const APPLY_EXPOSURE_GAMMA: KernelDescriptor = KernelDescriptor {
    name: "apply_exposure_gamma",
    params: &["exposure", "inv_gamma"],
    wgsl: shaders::APPLY_EXPOSURE_GAMMA,
    sample: exposure_gamma,
};

static BUILTIN: [KernelDescriptor; 3] = [APPLY_GAMMA, APPLY_EXPOSURE, APPLY_EXPOSURE_GAMMA];

/// The fixed library compiled by every dispatcher.
pub fn builtin_kernels() -> &'static [KernelDescriptor] {
    &BUILTIN
}

// Negative bases are undefined in WGSL `pow`; here they give NaN.
fn gamma(v: f32, p: &[f32]) -> f32 {
    v.powf(p[0])
}

fn exposure(v: f32, p: &[f32]) -> f32 {
    v * p[0].exp2()
}

fn exposure_gamma(v: f32, p: &[f32]) -> f32 {
    (v * p[0].exp2()).powf(p[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn library_names_are_unique() {
        let names: Vec<_> = builtin_kernels().iter().map(|k| k.name).collect();
        assert_eq!(names, ["apply_gamma", "apply_exposure", "apply_exposure_gamma"]);
    }

    #[test]
    fn sample_maps() {
        assert_relative_eq!((APPLY_GAMMA.sample)(0.25, &[0.5]), 0.5);
        assert_relative_eq!((APPLY_EXPOSURE.sample)(0.25, &[2.0]), 1.0);
        assert_relative_eq!((APPLY_EXPOSURE_GAMMA.sample)(0.5, &[1.0, 0.5]), 1.0);
    }

    #[test]
    fn validate_counts_params() {
        assert!(APPLY_EXPOSURE_GAMMA.validate(&[0.0, 1.0]).is_ok());
        let err = APPLY_GAMMA.validate(&[]).unwrap_err();
        assert!(matches!(err, ComputeError::InvalidParams { expected: 1, actual: 0, .. }));
    }
}
