//! Dispatcher behaviour across backends.

use std::sync::Arc;

use approx::assert_relative_eq;
use hdrview_compute::{Backend, ComputeError, DispatcherBuilder, KernelDispatcher};

fn pixels(n: usize) -> Vec<f32> {
    (0..n).map(|i| 0.01 + (i % 97) as f32 / 50.0).collect()
}

#[test]
fn test_gamma_inverse_cpu() {
    let d = KernelDispatcher::new(Backend::Cpu).unwrap();
    let px = pixels(1000);
    for g in [2.2f32, 0.45, 1.0, 3.0] {
        let encoded = d.apply_gamma(&px, g).unwrap();
        let decoded = d.apply_gamma(&encoded, 1.0 / g).unwrap();
        for (a, b) in px.iter().zip(&decoded) {
            assert_relative_eq!(a, b, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_alpha_is_mapped_too() {
    let d = KernelDispatcher::new(Backend::Cpu).unwrap();
    let rgba = [0.5, 0.5, 0.5, 1.0];
    let out = d.apply_exposure(&rgba, 1.0).unwrap();
    assert_eq!(out, vec![1.0, 1.0, 1.0, 2.0]);
}

#[test]
fn test_unregistered_kernel_never_returns_input() {
    let d = KernelDispatcher::new(Backend::Cpu).unwrap();
    let result = d.apply("apply_contrast", &[0.25; 12], &[1.2]);
    assert!(matches!(result, Err(ComputeError::KernelNotFound(_))));
}

#[test]
fn test_wrong_param_count() {
    let d = KernelDispatcher::new(Backend::Cpu).unwrap();
    let err = d.apply("apply_gamma", &[0.25], &[1.0, 2.0]).unwrap_err();
    assert!(matches!(err, ComputeError::InvalidParams { expected: 1, actual: 2, .. }));
    assert!(!err.is_backend_failure());
}

#[test]
fn test_shared_across_threads() {
    let d = Arc::new(KernelDispatcher::new(Backend::Cpu).unwrap());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let d = Arc::clone(&d);
            std::thread::spawn(move || d.apply_exposure(&[1.0; 64], i as f32).unwrap())
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        let out = h.join().unwrap();
        assert_relative_eq!(out[63], 2f32.powi(i as i32));
    }
}

#[test]
fn test_auto_never_fails() {
    let d = DispatcherBuilder::new().ignore_env().build().unwrap();
    let out = d.apply_gamma(&[0.25], 0.5).unwrap();
    assert_relative_eq!(out[0], 0.5, max_relative = 1e-5);
}

#[cfg(not(feature = "wgpu"))]
#[test]
fn test_wgpu_requires_feature() {
    let err = KernelDispatcher::new(Backend::Wgpu).unwrap_err();
    assert!(matches!(err, ComputeError::BackendNotAvailable(_)));
    assert!(err.is_backend_failure());
}

#[cfg(feature = "wgpu")]
mod gpu {
    use super::*;
    use hdrview_compute::KernelDescriptor;

    fn noop(v: f32, _: &[f32]) -> f32 {
        v
    }

    #[test]
    fn test_gpu_matches_cpu() {
        if !Backend::Wgpu.is_available() {
            return;
        }
        let gpu = KernelDispatcher::new(Backend::Wgpu).unwrap();
        let cpu = KernelDispatcher::new(Backend::Cpu).unwrap();
        let px = pixels(100_000);
        let a = gpu.apply_exposure_gamma(&px, 0.75, 1.0 / 2.2).unwrap();
        let b = cpu.apply_exposure_gamma(&px, 0.75, 1.0 / 2.2).unwrap();
        assert_eq!(a.len(), px.len());
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(x, y, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_bad_wgsl_fails_construction() {
        if !Backend::Wgpu.is_available() {
            return;
        }
        let broken = KernelDescriptor {
            name: "broken",
            params: &[],
            wgsl: "fn main( {",
            sample: noop,
        };
        let err = DispatcherBuilder::new().backend(Backend::Wgpu).kernel(broken).build().unwrap_err();
        assert!(matches!(err, ComputeError::ShaderCompilation { ref kernel, .. } if kernel == "broken"));
    }
}
