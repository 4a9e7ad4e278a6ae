//! # hdrview
//!
//! Downsampled, tone-mapped previews of large images, HDR included,
//! without ever holding the full-resolution source in memory.
//!
//! ```text
//! source -> resample (scanline stream) -> [HDR] analyze + normalize
//!        -> ToneMapper (CPU / wgpu kernels) -> write_image
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hdrview::{PreviewConfig, PreviewPipeline};
//!
//! let pipeline = PreviewPipeline::new(PreviewConfig::new(1024).gamma(2.2))?;
//! let report = pipeline.run("render.exr", "render_preview.png")?;
//! if let Some(range) = report.dynamic_range {
//!     println!("{}x{}: {}", report.width, report.height, range);
//! }
//! ```
//!
//! The building blocks are available on their own:
//!
//! ```rust,ignore
//! use hdrview::{ToneMapper, resample, write_image};
//!
//! let preview = resample("plate.hdr", 512)?;
//! let mapper = ToneMapper::auto()?;
//! let pixels = mapper.apply_gamma(preview.buffer.samples(), 1.0 / 2.2)?;
//! write_image("plate.jpg", &pixels, preview.resized_width(), preview.resized_height(),
//!             preview.output_channels())?;
//! ```

#![warn(missing_docs)]

mod error;
mod pipeline;
mod tone;

pub use error::{Error, Result};
pub use pipeline::{PreviewConfig, PreviewPipeline, PreviewReport};
pub use tone::ToneMapper;

pub use hdrview_compute::{Backend, ComputeError, KernelDispatcher};
pub use hdrview_io::{DynamicRangeInfo, DynamicRangeQuality, Format, ImageBuffer, IoError, ResampledImage};

use std::path::Path;

/// Streams the image at `path` down to `target_width` columns.
///
/// HDR sources come back normalized with their dynamic range attached.
pub fn resample<P: AsRef<Path>>(path: P, target_width: u32) -> Result<ResampledImage> {
    Ok(hdrview_io::resample(path, target_width)?)
}

/// Encodes interleaved samples to `path`; the format follows the extension.
///
/// Failures are [`IoError::WriteFailure`] wrapped in [`Error::Io`].
pub fn write_image<P: AsRef<Path>>(
    path: P,
    pixels: &[f32],
    width: u32,
    height: u32,
    channels: u32,
) -> Result<()> {
    Ok(hdrview_io::write_image(path, pixels, width, height, channels)?)
}
