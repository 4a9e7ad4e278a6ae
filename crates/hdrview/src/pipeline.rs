//! Resample, tone-map and write in one call.
//!
//! # Configuration
//!
//! ```ignore
//! use hdrview::{PreviewConfig, PreviewPipeline, Backend};
//!
//! let config = PreviewConfig::new(800)
//!     .exposure(-0.5)
//!     .gamma(2.2)
//!     .backend(Backend::Cpu);
//! let pipeline = PreviewPipeline::new(config)?;
//! for (src, dst) in jobs {
//!     pipeline.run(src, dst)?;
//! }
//! ```

use std::path::Path;

use hdrview_compute::Backend;
use hdrview_io::{DynamicRangeInfo, IoError, Resampler};
use tracing::debug;

use crate::tone::ToneMapper;
use crate::{Result, write_image};

/// Default preview width in pixels.
pub const DEFAULT_TARGET_WIDTH: u32 = 1024;
/// Default display gamma.
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Settings for [`PreviewPipeline`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Output width; height follows the source aspect ratio.
    pub target_width: u32,
    /// Display gamma; HDR samples are raised to `1 / gamma`.
    pub gamma: f32,
    /// Exposure in stops, applied to HDR sources before gamma.
    pub exposure: f32,
    /// Compute backend for tone mapping.
    pub backend: Backend,
    /// Resampler memory budget in bytes (None = `HDRVIEW_MEM_MB` or a
    /// share of system RAM).
    pub memory_budget: Option<u64>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            gamma: DEFAULT_GAMMA,
            exposure: 0.0,
            backend: Backend::Auto,
            memory_budget: None,
        }
    }
}

impl PreviewConfig {
    /// Defaults with the given output width.
    pub fn new(target_width: u32) -> Self {
        Self { target_width, ..Self::default() }
    }

    /// Set display gamma.
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set exposure in stops.
    pub fn exposure(mut self, stops: f32) -> Self {
        self.exposure = stops;
        self
    }

    /// Set compute backend.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Cap resampler memory.
    pub fn memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.target_width == 0 {
            return Err(IoError::InvalidArgument("target width must be positive".into()).into());
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(IoError::InvalidArgument(format!("gamma must be positive, got {}", self.gamma)).into());
        }
        if !self.exposure.is_finite() {
            return Err(IoError::InvalidArgument(format!("exposure must be finite, got {}", self.exposure)).into());
        }
        Ok(())
    }
}

/// What a [`PreviewPipeline::run`] produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewReport {
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Output channels after alpha compaction.
    pub channels: u32,
    /// Source width.
    pub original_width: u32,
    /// Source height.
    pub original_height: u32,
    /// Present for HDR sources.
    pub dynamic_range: Option<DynamicRangeInfo>,
    /// Whether a tone-mapping kernel ran.
    pub tone_mapped: bool,
    /// Backend used for tone mapping.
    pub backend: &'static str,
}

/// Reusable preview generator.
///
/// HDR sources (by extension) are normalized by the resampler and then
/// graded with the configured exposure and gamma. Display-referred sources
/// such as PNG are written as resampled.
#[derive(Debug)]
pub struct PreviewPipeline {
    config: PreviewConfig,
    resampler: Resampler,
    tone: ToneMapper,
}

impl PreviewPipeline {
    /// Validates `config` and opens the compute backend.
    pub fn new(config: PreviewConfig) -> Result<Self> {
        config.validate()?;
        let tone = ToneMapper::new(config.backend)?;
        Ok(Self::with_tone_mapper(config, tone))
    }

    /// Uses an already-open tone mapper.
    pub fn with_tone_mapper(config: PreviewConfig, tone: ToneMapper) -> Self {
        let mut resampler = Resampler::new(config.target_width);
        if let Some(bytes) = config.memory_budget {
            resampler = resampler.with_memory_budget(bytes);
        }
        Self { config, resampler, tone }
    }

    /// Active configuration.
    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    /// Tone mapper in use.
    pub fn tone_mapper(&self) -> &ToneMapper {
        &self.tone
    }

    /// Builds the preview of `src` and writes it to `dst`.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(&self, src: P, dst: Q) -> Result<PreviewReport> {
        let src = src.as_ref();
        let dst = dst.as_ref();
        self.config.validate()?;

        let preview = self.resampler.resample_path(src)?;
        let width = preview.resized_width();
        let height = preview.resized_height();
        let channels = preview.output_channels();
        debug!(
            src = %src.display(),
            width,
            height,
            channels,
            hdr = preview.dynamic_range.is_some(),
            "Resampled"
        );

        let graded = match preview.dynamic_range {
            Some(_) => self.tone.grade(preview.buffer.samples(), self.config.exposure, self.config.gamma)?,
            None => None,
        };
        let tone_mapped = graded.is_some();
        let pixels = graded.as_deref().unwrap_or(preview.buffer.samples());

        write_image(dst, pixels, width, height, channels)?;
        debug!(dst = %dst.display(), tone_mapped, backend = self.tone.backend_name(), "Preview written");

        Ok(PreviewReport {
            width,
            height,
            channels,
            original_width: preview.original_width,
            original_height: preview.original_height,
            dynamic_range: preview.dynamic_range,
            tone_mapped,
            backend: self.tone.backend_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn config_builder() {
        let c = PreviewConfig::new(320).gamma(2.4).exposure(1.0).backend(Backend::Cpu).memory_budget(1 << 20);
        assert_eq!(c.target_width, 320);
        assert_eq!(c.gamma, 2.4);
        assert_eq!(c.exposure, 1.0);
        assert_eq!(c.backend, Backend::Cpu);
        assert_eq!(c.memory_budget, Some(1 << 20));
        assert_eq!(PreviewConfig::default().target_width, DEFAULT_TARGET_WIDTH);
    }

    #[test]
    fn invalid_config_rejected() {
        for config in [PreviewConfig::new(0), PreviewConfig::new(8).gamma(0.0), PreviewConfig::new(8).exposure(f32::NAN)] {
            let err = PreviewPipeline::new(config.backend(Backend::Cpu)).unwrap_err();
            assert!(matches!(err, Error::Io(IoError::InvalidArgument(_))));
        }
    }
}
