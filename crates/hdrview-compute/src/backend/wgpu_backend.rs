//! wgpu backend implementation.
//!
//! Each kernel becomes one compute pipeline. A call uploads the samples and
//! parameters, dispatches one invocation per sample and reads the result
//! back through a staging buffer.
//!
//! A call needs the sample buffer twice on the device (storage plus
//! staging). Calls that would exceed the estimated VRAM, or
//! `HDRVIEW_GPU_MEMORY_MB` when set, fail before anything is allocated.

use std::ops::Deref;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, trace};
use wgpu::util::DeviceExt;

use super::KernelBackend;
use crate::kernel::KernelDescriptor;
use crate::{ComputeError, ComputeResult};

const WORKGROUP_SIZE: u32 = 256;

/// Dimensions uniform: [sample_count, param_count, row_stride, 0]
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DimsUniform {
    dims: [u32; 4],
}

/// Transient device buffer, destroyed when dropped.
struct DeviceBuffer(wgpu::Buffer);

impl DeviceBuffer {
    fn init(device: &wgpu::Device, label: &str, contents: &[u8], usage: wgpu::BufferUsages) -> Self {
        Self(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage,
        }))
    }

    fn staging(device: &wgpu::Device, size: u64) -> Self {
        Self(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        }))
    }
}

impl Deref for DeviceBuffer {
    type Target = wgpu::Buffer;

    fn deref(&self) -> &wgpu::Buffer {
        &self.0
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

/// Compiled compute pipeline for one kernel.
pub struct WgpuProgram {
    kernel: &'static str,
    pipeline: wgpu::ComputePipeline,
}

/// wgpu compute backend.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    max_binding_bytes: u64,
    max_groups: u32,
    available_memory: u64,
}

impl WgpuBackend {
    fn instance() -> wgpu::Instance {
        wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        })
    }

    async fn adapter(instance: &wgpu::Instance) -> Option<wgpu::Adapter> {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
    }

    /// Adapter a new backend would open, if any.
    pub fn adapter_info() -> Option<wgpu::AdapterInfo> {
        pollster::block_on(async { Self::adapter(&Self::instance()).await.map(|a| a.get_info()) })
    }

    /// Check if wgpu is available.
    pub fn is_available() -> bool {
        Self::adapter_info().is_some()
    }

    /// Create the device and queue.
    pub fn new() -> ComputeResult<Self> {
        pollster::block_on(Self::new_async())
    }

    /// Create the device and queue asynchronously.
    pub async fn new_async() -> ComputeResult<Self> {
        let instance = Self::instance();
        let adapter = Self::adapter(&instance).await.ok_or(ComputeError::NoAdapter)?;

        let adapter_limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("hdrview_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter_limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| ComputeError::DeviceCreation(e.to_string()))?;

        let info = adapter.get_info();
        let available_memory = estimate_vram(&info, adapter_limits.max_buffer_size);
        debug!(
            adapter = %info.name,
            backend = ?info.backend,
            vram_mb = available_memory >> 20,
            "wgpu device ready"
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            max_binding_bytes: (adapter_limits.max_storage_buffer_binding_size as u64)
                .min(adapter_limits.max_buffer_size),
            max_groups: adapter_limits.max_compute_workgroups_per_dimension,
            available_memory,
        })
    }

    fn dispatch_and_wait(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
    }

    fn download(&self, staging: &DeviceBuffer, len: usize) -> ComputeResult<Vec<f32>> {
        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| ComputeError::Transfer(e.to_string()))?
            .map_err(|e| ComputeError::Transfer(e.to_string()))?;

        let result = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, f32>(&data).to_vec()
        };
        staging.unmap();

        if result.len() != len {
            return Err(ComputeError::BufferSizeMismatch { expected: len, actual: result.len() });
        }
        Ok(result)
    }
}

impl KernelBackend for WgpuBackend {
    type Program = WgpuProgram;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn compile(&self, kernel: &KernelDescriptor) -> ComputeResult<WgpuProgram> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(kernel.name),
            source: wgpu::ShaderSource::Wgsl(kernel.wgsl.into()),
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(kernel.name),
            layout: None, // Auto layout
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ComputeError::ShaderCompilation {
                kernel: kernel.name.to_string(),
                log: err.to_string(),
            });
        }

        trace!(kernel = kernel.name, "Compiled compute pipeline");
        Ok(WgpuProgram { kernel: kernel.name, pipeline })
    }

    fn execute(&self, program: &WgpuProgram, samples: &[f32], params: &[f32]) -> ComputeResult<Vec<f32>> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let len = samples.len();
        let size = std::mem::size_of_val(samples) as u64;
        if size > self.max_binding_bytes {
            return Err(ComputeError::OperationFailed(format!(
                "{} samples exceed the device binding limit of {} bytes",
                len, self.max_binding_bytes
            )));
        }
        check_device_memory(len, 2 * size, self.available_memory)?;
        let count = u32::try_from(len)
            .map_err(|_| ComputeError::OperationFailed(format!("{} samples exceed u32 indexing", len)))?;
        let (groups_x, groups_y) = workgroups(count, self.max_groups);

        // Storage bindings must not be empty.
        let param_data: &[f32] = if params.is_empty() { &[0.0] } else { params };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let data_buf = DeviceBuffer::init(
            &self.device,
            "samples",
            bytemuck::cast_slice(samples),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        );
        let params_buf = DeviceBuffer::init(
            &self.device,
            "params",
            bytemuck::cast_slice(param_data),
            wgpu::BufferUsages::STORAGE,
        );
        let dims = DimsUniform { dims: [count, params.len() as u32, groups_x * WORKGROUP_SIZE, 0] };
        let dims_buf = DeviceBuffer::init(
            &self.device,
            "dims",
            bytemuck::bytes_of(&dims),
            wgpu::BufferUsages::UNIFORM,
        );
        let staging = DeviceBuffer::staging(&self.device, size);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(program.kernel),
            layout: &program.pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: data_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: params_buf.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: dims_buf.as_entire_binding() },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(program.kernel),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(program.kernel),
                timestamp_writes: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        encoder.copy_buffer_to_buffer(&data_buf, 0, &staging, 0, size);
        self.dispatch_and_wait(encoder);

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ComputeError::OperationFailed(format!("{}: {}", program.kernel, err)));
        }

        trace!(kernel = program.kernel, samples = len, groups_x, groups_y, "wgpu dispatch");
        self.download(&staging, len)
    }
}

/// Splits `count` invocations into a grid no wider than `max_groups`.
fn workgroups(count: u32, max_groups: u32) -> (u32, u32) {
    let total = count.div_ceil(WORKGROUP_SIZE);
    let max_groups = max_groups.max(1);
    if total <= max_groups {
        (total, 1)
    } else {
        (max_groups, total.div_ceil(max_groups))
    }
}

/// Fails when `required` device bytes exceed the VRAM estimate.
fn check_device_memory(samples: usize, required: u64, available: u64) -> ComputeResult<()> {
    if required > available {
        return Err(ComputeError::OperationFailed(format!(
            "{} samples need {} MB of device memory, {} MB available",
            samples,
            required.div_ceil(1 << 20),
            available >> 20
        )));
    }
    Ok(())
}

fn estimate_vram(info: &wgpu::AdapterInfo, max_buffer_bytes: u64) -> u64 {
    // Check env override
    if let Some(mb) = std::env::var("HDRVIEW_GPU_MEMORY_MB")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return mb.saturating_mul(1024 * 1024);
    }

    let from_buffer = max_buffer_bytes.saturating_mul(2);
    let estimated = match info.device_type {
        wgpu::DeviceType::DiscreteGpu => from_buffer.clamp(2u64 << 30, 24u64 << 30),
        wgpu::DeviceType::IntegratedGpu => from_buffer.clamp(512u64 << 20, 4u64 << 30),
        wgpu::DeviceType::VirtualGpu => from_buffer.clamp(1u64 << 30, 8u64 << 30),
        _ => from_buffer.clamp(256u64 << 20, 2u64 << 30),
    };

    // 80% safe margin
    estimated.saturating_mul(80) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_dispatch_is_one_row() {
        assert_eq!(workgroups(1, 65535), (1, 1));
        assert_eq!(workgroups(256, 65535), (1, 1));
        assert_eq!(workgroups(257, 65535), (2, 1));
    }

    #[test]
    fn large_dispatch_wraps() {
        let count = 65536 * 256;
        let (x, y) = workgroups(count, 65535);
        assert_eq!((x, y), (65535, 2));
        assert!(x as u64 * y as u64 * WORKGROUP_SIZE as u64 >= count as u64);
    }

    #[test]
    fn oversized_calls_are_refused() {
        let mb = 1u64 << 20;
        assert!(check_device_memory(1024, 8 * mb, 8 * mb).is_ok());
        let err = check_device_memory(1 << 20, 8 * mb + 1, 8 * mb).unwrap_err();
        assert!(matches!(err, ComputeError::OperationFailed(_)));
        assert!(err.to_string().contains("9 MB of device memory, 8 MB available"));
    }

    #[test]
    fn gpu_round_trip() {
        if !WgpuBackend::is_available() {
            return;
        }
        let backend = WgpuBackend::new().unwrap();
        let program = backend.compile(&crate::kernel::APPLY_EXPOSURE).unwrap();
        let out = backend.execute(&program, &[0.25, 0.5, 1.0], &[1.0]).unwrap();
        for (a, b) in out.iter().zip([0.5f32, 1.0, 2.0]) {
            approx::assert_relative_eq!(*a, b, max_relative = 1e-6);
        }
    }
}
