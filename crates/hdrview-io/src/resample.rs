//! Single-pass scanline resampling.
//!
//! The source is read one row at a time and reduced to `target_width`
//! columns by nearest-neighbour sampling, so peak memory is the output
//! buffer plus one source scanline.
//!
//! # Channel policy
//!
//! | Source channels | Output | Notes |
//! |-----------------|--------|-------|
//! | 1 | 4 | luminance broadcast to RGB, alpha `1.0` |
//! | 2 | 4 | other channel broadcast to RGB, named alpha (or 2nd channel) last |
//! | 3, 4 | same | copied |
//! | > 4 | 4 | first three as RGB, named alpha (or channel 3) last |
//!
//! When the source names an alpha channel but every sampled alpha is `1.0`,
//! the alpha channel is dropped after the pass.

use std::path::Path;

use tracing::{debug, trace};

use crate::analysis::{DynamicRangeInfo, analyze};
use crate::memory::{self, check_budget, format_bytes};
use crate::normalize::normalize;
use crate::{Format, ImageBuffer, IoError, IoResult, ScanlineSource, SourceSpec, is_hdr_path, open_source};

/// Resampled image plus the facts about its source.
#[derive(Debug, Clone)]
pub struct ResampledImage {
    /// Output pixels.
    pub buffer: ImageBuffer,
    /// Source width.
    pub original_width: u32,
    /// Source height.
    pub original_height: u32,
    /// Source channel count.
    pub original_channels: u32,
    /// Source names an alpha channel.
    pub original_has_alpha: bool,
    /// Source container format.
    pub format: Format,
    /// Present for HDR sources; measured before normalization.
    pub dynamic_range: Option<DynamicRangeInfo>,
}

impl ResampledImage {
    /// Output keeps an alpha channel.
    pub fn output_has_alpha(&self) -> bool {
        self.buffer.has_alpha()
    }

    /// Output width.
    pub fn resized_width(&self) -> u32 {
        self.buffer.width()
    }

    /// Output height.
    pub fn resized_height(&self) -> u32 {
        self.buffer.height()
    }

    /// Output channel count.
    pub fn output_channels(&self) -> u32 {
        self.buffer.channels()
    }
}

/// Scanline resampler.
///
/// # Example
///
/// ```rust,ignore
/// use hdrview_io::Resampler;
///
/// let preview = Resampler::new(1024).resample_path("render.exr")?;
/// println!("{}x{}", preview.resized_width(), preview.resized_height());
/// ```
#[derive(Debug, Clone)]
pub struct Resampler {
    target_width: u32,
    memory_budget: u64,
}

impl Resampler {
    /// Resampler to `target_width` columns with the default memory budget.
    pub fn new(target_width: u32) -> Self {
        Self { target_width, memory_budget: memory::resample_budget() }
    }

    /// Overrides the memory budget in bytes.
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Target width.
    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    /// Opens `path`, resamples it, and analyzes/normalizes HDR sources.
    ///
    /// HDR classification is by extension (`.exr`, `.hdr`, ...).
    pub fn resample_path<P: AsRef<Path>>(&self, path: P) -> IoResult<ResampledImage> {
        let path = path.as_ref();
        let mut source = open_source(path)?;
        self.resample_source(source.as_mut(), is_hdr_path(path))
    }

    /// Resamples an opened source.
    pub fn resample_source(
        &self,
        source: &mut dyn ScanlineSource,
        hdr: bool,
    ) -> IoResult<ResampledImage> {
        let spec = source.spec().clone();
        if spec.tiled {
            return Err(IoError::UnsupportedFormat("tiled images cannot be read by scanline".into()));
        }
        if self.target_width == 0 {
            return Err(IoError::InvalidArgument("target width must be positive".into()));
        }
        if spec.width == 0 || spec.height == 0 || spec.channels == 0 {
            return Err(IoError::InvalidArgument(format!(
                "empty source {}x{}x{}",
                spec.width, spec.height, spec.channels
            )));
        }
        debug!(
            width = spec.width,
            height = spec.height,
            channels = spec.channels,
            format = ?spec.format,
            "Resampling source"
        );

        let target_width = self.target_width;
        let target_height = (spec.height as f64 / spec.width as f64 * target_width as f64).floor() as u32;
        let layout = ChannelLayout::new(&spec);

        let required = memory::image_memory(target_width, target_height, layout.output_channels)
            + memory::image_memory(spec.width, 1, spec.channels);
        check_budget(required, self.memory_budget)?;
        trace!(required = %format_bytes(required), "Resample allocation");

        let keeps_alpha = layout.alpha.is_some() && layout.output_channels == 4;
        let mut buffer =
            ImageBuffer::zeroed(target_width, target_height, layout.output_channels, keeps_alpha);
        let columns = source_columns(target_width, spec.width, spec.channels);
        let out_channels = layout.output_channels as usize;
        let mut non_white_alpha = false;

        let samples = buffer.samples_mut();
        for (y, out_row) in samples
            .chunks_exact_mut(target_width as usize * out_channels)
            .enumerate()
        {
            let src_row = map_index(y as u32, target_height, spec.height);
            let scanline = source.read_scanline(src_row)?;
            if scanline.len() != spec.scanline_len() {
                return Err(IoError::Decode(format!(
                    "scanline {} has {} samples, expected {}",
                    src_row,
                    scanline.len(),
                    spec.scanline_len()
                )));
            }
            for (out, &offset) in out_row.chunks_exact_mut(out_channels).zip(&columns) {
                let px = &scanline[offset..offset + spec.channels as usize];
                if let Some(alpha) = layout.map_pixel(px, out) {
                    non_white_alpha |= alpha < 1.0;
                }
            }
        }

        if keeps_alpha && !non_white_alpha {
            trace!(width = target_width, height = target_height, "Dropping opaque alpha");
            buffer.strip_alpha();
        }

        let dynamic_range = if hdr {
            let info = analyze(buffer.samples());
            let anchor = normalize(buffer.samples_mut());
            debug!(ratio = info.ratio, stops = info.stops, ?anchor, "Normalized HDR preview");
            Some(info)
        } else {
            None
        };

        debug!(
            width = buffer.width(),
            height = buffer.height(),
            channels = buffer.channels(),
            "Resample complete"
        );

        Ok(ResampledImage {
            buffer,
            original_width: spec.width,
            original_height: spec.height,
            original_channels: spec.channels,
            original_has_alpha: layout.alpha.is_some(),
            format: spec.format,
            dynamic_range,
        })
    }
}

/// Resamples the image at `path` to `target_width` columns.
pub fn resample<P: AsRef<Path>>(path: P, target_width: u32) -> IoResult<ResampledImage> {
    Resampler::new(target_width).resample_path(path)
}

/// Resamples an opened source; `hdr` enables analysis and normalization.
pub fn resample_source(
    source: &mut dyn ScanlineSource,
    target_width: u32,
    hdr: bool,
) -> IoResult<ResampledImage> {
    Resampler::new(target_width).resample_source(source, hdr)
}

/// How source samples land in an output pixel.
#[derive(Debug, Clone, Copy)]
struct ChannelLayout {
    input_channels: usize,
    output_channels: u32,
    /// Index of the named alpha channel in the source.
    alpha: Option<usize>,
}

impl ChannelLayout {
    fn new(spec: &SourceSpec) -> Self {
        let input_channels = spec.channels as usize;
        let output_channels = match input_channels {
            3 | 4 => input_channels as u32,
            _ => 4,
        };
        Self { input_channels, output_channels, alpha: spec.alpha_index() }
    }

    /// Writes one output pixel and returns the sampled alpha, if tracked.
    fn map_pixel(&self, px: &[f32], out: &mut [f32]) -> Option<f32> {
        match self.input_channels {
            1 => {
                out[..3].fill(px[0]);
                out[3] = 1.0;
                None
            }
            2 => {
                let a = self.alpha.unwrap_or(1);
                out[..3].fill(px[1 - a]);
                out[3] = px[a];
                self.alpha.map(|_| px[a])
            }
            3 | 4 => {
                out.copy_from_slice(px);
                self.alpha.map(|i| px[i])
            }
            _ => {
                out[..3].copy_from_slice(&px[..3]);
                out[3] = px[self.alpha.unwrap_or(3)];
                self.alpha.map(|i| px[i])
            }
        }
    }
}

/// Nearest source index for destination index `i` of `dst_len`.
fn map_index(i: u32, dst_len: u32, src_len: u32) -> u32 {
    let mapped = (i as f64 / dst_len as f64 * src_len as f64).round() as u32;
    mapped.min(src_len - 1)
}

/// Sample offset of the source pixel feeding each destination column.
fn source_columns(target_width: u32, width: u32, channels: u32) -> Vec<usize> {
    (0..target_width)
        .map(|x| map_index(x, target_width, width) as usize * channels as usize)
        .collect()
}
