//! # hdrview-io
//!
//! Streaming decode, resample and HDR normalization for image previews.
//!
//! A large source image is never materialized: codecs hand out one scanline
//! at a time and the [`Resampler`] keeps only the reduced output buffer.
//! HDR sources (by extension) are analyzed for dynamic range and rescaled
//! against their 99th percentile.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hdrview_io::{resample, write_buffer};
//!
//! let preview = resample("render.exr", 1024)?;
//! if let Some(range) = preview.dynamic_range {
//!     println!("{} [{}]", range, range.quality());
//! }
//! write_buffer("render_preview.png", &preview.buffer)?;
//! ```
//!
//! # Supported Formats
//!
//! | Format | Read | Write | Notes |
//! |--------|------|-------|-------|
//! | EXR | Yes | Yes | scanline files only |
//! | HDR | Yes | Yes | RLE and flat RGBE |
//! | PNG | Yes | Yes | non-interlaced; writes 8-bit |
//! | JPEG | No | Yes | 8-bit |
//!
//! # Feature Flags
//!
//! - `exr` - OpenEXR support (default)
//! - `png` - PNG support (default)
//! - `jpeg` - JPEG output (default)
//! - `hdr` - Radiance HDR support (default)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod buffer;
mod detect;
mod error;
mod source;

pub mod analysis;
pub mod memory;
pub mod normalize;
pub mod resample;

#[cfg(feature = "exr")]
pub mod exr;

#[cfg(feature = "png")]
pub mod png;

#[cfg(feature = "jpeg")]
pub mod jpeg;

#[cfg(feature = "hdr")]
pub mod hdr;

pub use analysis::{DynamicRangeInfo, DynamicRangeQuality, analyze};
pub use buffer::ImageBuffer;
pub use detect::{Format, is_hdr_path};
pub use error::{IoError, IoResult};
pub use normalize::normalize;
pub use resample::{ResampledImage, Resampler, resample, resample_source};
pub use source::{BoxedSource, MemorySource, ScanlineSource, SourceSpec, open_source};

use std::path::Path;

/// Writes `buffer`, choosing the encoder from the extension of `path`.
///
/// # Errors
///
/// [`IoError::WriteFailure`] if the file cannot be created or the format
/// has no encoder.
pub fn write_buffer<P: AsRef<Path>>(path: P, buffer: &ImageBuffer) -> IoResult<()> {
    let path = path.as_ref();
    match Format::from_extension(path) {
        #[cfg(feature = "exr")]
        Format::Exr => exr::write(path, buffer),

        #[cfg(feature = "png")]
        Format::Png => png::write(path, buffer),

        #[cfg(feature = "jpeg")]
        Format::Jpeg => jpeg::write(path, buffer),

        #[cfg(feature = "hdr")]
        Format::Hdr => hdr::write(path, buffer),

        _ => Err(IoError::write_failure(
            path,
            format!(
                "no encoder for extension {:?}",
                path.extension().and_then(|e| e.to_str()).unwrap_or("")
            ),
        )),
    }
}

/// Writes raw interleaved samples to `path`.
///
/// Every failure, including a sample count that does not match
/// `width * height * channels`, is reported as [`IoError::WriteFailure`].
pub fn write_image<P: AsRef<Path>>(
    path: P,
    pixels: &[f32],
    width: u32,
    height: u32,
    channels: u32,
) -> IoResult<()> {
    let path = path.as_ref();
    let has_alpha = channels == 2 || channels == 4;
    ImageBuffer::from_samples(pixels.to_vec(), width, height, channels, has_alpha)
        .and_then(|buffer| write_buffer(path, &buffer))
        .map_err(|e| match e {
            IoError::WriteFailure { .. } => e,
            other => IoError::write_failure(path, other),
        })
}
