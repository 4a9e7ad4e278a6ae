//! Memory budgeting for resampling.
//!
//! # Environment Variables
//!
//! - `HDRVIEW_MEM_MB` - Explicit memory limit in megabytes
//! - `HDRVIEW_RAM_PCT` - Maximum RAM as percentage (10-95)

use std::env;
use std::sync::OnceLock;

use crate::{IoError, IoResult};

/// Default share of system RAM available to the pipeline.
pub const SAFE_MEMORY_FRACTION: f64 = 0.80;

/// Share of available memory one resample may claim.
pub const RESAMPLE_FRACTION: f64 = 0.50;

static SYSTEM_MEMORY: OnceLock<u64> = OnceLock::new();

/// Total system RAM in bytes (8 GB if it cannot be queried).
pub fn system_memory() -> u64 {
    *SYSTEM_MEMORY.get_or_init(|| {
        sys_info::mem_info()
            .map(|m| m.total * 1024)
            .unwrap_or(8 * 1024 * 1024 * 1024)
    })
}

/// RAM available to the pipeline, honouring environment overrides.
///
/// Priority:
/// 1. `HDRVIEW_MEM_MB`
/// 2. `HDRVIEW_RAM_PCT` of system RAM
/// 3. 80% of system RAM
pub fn available_memory() -> u64 {
    if let Some(mb) = env_u64("HDRVIEW_MEM_MB") {
        return mb * 1024 * 1024;
    }
    let pct = env_u64("HDRVIEW_RAM_PCT")
        .unwrap_or((SAFE_MEMORY_FRACTION * 100.0) as u64)
        .clamp(10, 95);
    system_memory() * pct / 100
}

/// Bytes a single resample may allocate.
pub fn resample_budget() -> u64 {
    (available_memory() as f64 * RESAMPLE_FRACTION) as u64
}

/// Bytes held by `width * height * channels` f32 samples.
#[inline]
pub fn image_memory(width: u32, height: u32, channels: u32) -> u64 {
    (width as u64) * (height as u64) * (channels as u64) * 4
}

/// Fails with [`IoError::MemoryBudget`] when `required` exceeds `budget`.
pub fn check_budget(required: u64, budget: u64) -> IoResult<()> {
    if required > budget {
        return Err(IoError::MemoryBudget { required, budget });
    }
    Ok(())
}

/// Format bytes as human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 * 1024 {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    } else if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_fraction_of_available() {
        let total = system_memory();
        assert!(total > 0);
        assert!(resample_budget() <= available_memory());
    }

    #[test]
    fn budget_check() {
        assert!(check_budget(10, 10).is_ok());
        assert!(matches!(
            check_budget(11, 10),
            Err(IoError::MemoryBudget { required: 11, budget: 10 })
        ));
    }

    #[test]
    fn image_memory_counts_f32() {
        assert_eq!(image_memory(1024, 1024, 4), 16 * 1024 * 1024);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1500), "1 KB");
        assert_eq!(format_bytes(1_500_000), "1.4 MB");
        assert_eq!(format_bytes(1_500_000_000), "1.40 GB");
    }
}
