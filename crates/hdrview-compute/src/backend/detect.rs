//! Device discovery and `Backend::Auto` resolution.
//!
//! The wgpu entry names the adapter the driver would hand out. Software
//! adapters (llvmpipe, WARP) rank below the rayon CPU path, so `Auto` only
//! leaves the CPU for real hardware.

use super::Backend;

/// Rank of the rayon CPU path.
const CPU_RANK: u32 = 10;

/// One compute path this build can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    pub backend: Backend,
    /// Whether a dispatcher can be opened on it.
    pub available: bool,
    /// Adapter name and type, or the CPU thread count.
    pub device: String,
    /// `Auto` picks the highest available rank.
    pub rank: u32,
}

impl BackendInfo {
    fn cpu() -> Self {
        Self {
            backend: Backend::Cpu,
            available: true,
            device: format!("{} rayon threads", rayon::current_num_threads()),
            rank: CPU_RANK,
        }
    }

    #[cfg(feature = "wgpu")]
    fn wgpu() -> Self {
        match super::WgpuBackend::adapter_info() {
            Some(info) => Self {
                backend: Backend::Wgpu,
                available: true,
                device: format!("{} ({:?}, {:?})", info.name, info.device_type, info.backend),
                rank: adapter_rank(info.device_type),
            },
            None => Self { backend: Backend::Wgpu, available: false, device: "no adapter".into(), rank: 0 },
        }
    }

    #[cfg(not(feature = "wgpu"))]
    fn wgpu() -> Self {
        Self { backend: Backend::Wgpu, available: false, device: "not compiled in".into(), rank: 0 }
    }
}

#[cfg(feature = "wgpu")]
fn adapter_rank(device_type: wgpu::DeviceType) -> u32 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => 100,
        wgpu::DeviceType::IntegratedGpu => 60,
        wgpu::DeviceType::VirtualGpu => 40,
        wgpu::DeviceType::Cpu | wgpu::DeviceType::Other => CPU_RANK / 2,
    }
}

/// Every backend with its device, highest rank first.
pub fn detect_backends() -> Vec<BackendInfo> {
    let mut backends = vec![BackendInfo::cpu(), BackendInfo::wgpu()];
    backends.sort_by(|a, b| b.rank.cmp(&a.rank));
    backends
}

/// Highest-ranked available entry; CPU when none is.
fn best_of(backends: &[BackendInfo]) -> Backend {
    backends
        .iter()
        .filter(|b| b.available)
        .max_by_key(|b| b.rank)
        .map(|b| b.backend)
        .unwrap_or(Backend::Cpu)
}

impl Backend {
    /// Concrete backend `self` stands for. Only `Auto` queries the devices.
    pub fn resolve(self) -> Backend {
        match self {
            Self::Auto => best_of(&detect_backends()),
            other => other,
        }
    }
}

/// Table of backends for `--list-backends` style output.
///
/// The entry `Auto` would pick is marked with `*`.
pub fn describe_backends() -> String {
    format_table(&detect_backends())
}

fn format_table(backends: &[BackendInfo]) -> String {
    let best = best_of(backends);
    backends
        .iter()
        .map(|info| {
            let mark = if info.available && info.backend == best { '*' } else { ' ' };
            let status = if info.available { "ready" } else { "missing" };
            format!("{} {:<5} {:<8} {}\n", mark, info.backend.name(), status, info.device)
        })
        .collect()
}
