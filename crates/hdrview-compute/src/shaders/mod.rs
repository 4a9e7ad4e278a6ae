//! WGSL sources for the tone-mapping kernels.

// Shared bindings:
//   0: samples, modified in place
//   1: kernel parameters
//   2: dims = (sample_count, param_count, row_stride, 0)
// Large buffers are dispatched as a 2-D grid of 256-wide groups.

/// `v^inv_gamma`
pub const APPLY_GAMMA: &str = r#"
@group(0) @binding(0) var<storage, read_write> samples: array<f32>;
@group(0) @binding(1) var<storage, read> params: array<f32>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x + id.y * dims.z;
    if i >= dims.x { return; }

    samples[i] = pow(samples[i], params[0]);
}
"#;

/// `v * 2^exposure`
pub const APPLY_EXPOSURE: &str = r#"
@group(0) @binding(0) var<storage, read_write> samples: array<f32>;
@group(0) @binding(1) var<storage, read> params: array<f32>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x + id.y * dims.z;
    if i >= dims.x { return; }

    samples[i] = samples[i] * exp2(params[0]);
}
"#;

/// `(v * 2^exposure)^inv_gamma`
pub const APPLY_EXPOSURE_GAMMA: &str = r#"
@group(0) @binding(0) var<storage, read_write> samples: array<f32>;
@group(0) @binding(1) var<storage, read> params: array<f32>;
@group(0) @binding(2) var<uniform> dims: vec4<u32>;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x + id.y * dims.z;
    if i >= dims.x { return; }

    let exposed = samples[i] * exp2(params[0]);
    samples[i] = pow(exposed, params[1]);
}
"#;
