//! JPEG output.
//!
//! Previews are written as baseline 8-bit JPEG. JPEG has no alpha, so
//! RGBA buffers lose their 4th channel and luminance buffers are encoded
//! as single-channel luma.

use std::path::Path;

use tracing::trace;

use crate::{ImageBuffer, IoError, IoResult};

/// Default encoder quality.
pub const DEFAULT_QUALITY: u8 = 90;

/// JPEG file writer.
#[derive(Debug, Clone)]
pub struct JpegWriter {
    quality: u8,
}

impl JpegWriter {
    /// Writer with quality 90.
    pub fn new() -> Self {
        Self { quality: DEFAULT_QUALITY }
    }

    /// Sets the quality level, clamped to 1-100.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Encodes `image` into memory.
    pub fn encode(&self, image: &ImageBuffer) -> IoResult<Vec<u8>> {
        use jpeg_encoder::{ColorType, Encoder};

        let (width, height) = dimensions(image)?;
        let bytes = image.to_u8();
        let channels = image.channels() as usize;

        let (color_type, pixels) = match channels {
            1 => (ColorType::Luma, bytes),
            2 => (ColorType::Luma, bytes.chunks_exact(2).map(|px| px[0]).collect()),
            3 => (ColorType::Rgb, bytes),
            4 => (ColorType::Rgb, bytes.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect()),
            n => {
                return Err(IoError::InvalidArgument(format!("unsupported channel count: {}", n)));
            }
        };

        let mut buffer = Vec::new();
        Encoder::new(&mut buffer, self.quality)
            .encode(&pixels, width, height, color_type)
            .map_err(|e: jpeg_encoder::EncodingError| IoError::InvalidArgument(e.to_string()))?;
        Ok(buffer)
    }

    /// Encodes `image` and writes it to `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P, image: &ImageBuffer) -> IoResult<()> {
        let path = path.as_ref();
        let bytes = self.encode(image).map_err(|e| IoError::write_failure(path, e))?;
        std::fs::write(path, &bytes).map_err(|e| IoError::write_failure(path, e))?;
        trace!(width = image.width(), height = image.height(), quality = self.quality, "JPEG written");
        Ok(())
    }
}

impl Default for JpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `image` with the default quality.
pub fn write<P: AsRef<Path>>(path: P, image: &ImageBuffer) -> IoResult<()> {
    JpegWriter::new().write(path, image)
}

fn dimensions(image: &ImageBuffer) -> IoResult<(u16, u16)> {
    let width = u16::try_from(image.width());
    let height = u16::try_from(image.height());
    match (width, height) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(IoError::InvalidArgument(format!(
            "JPEG cannot hold {}x{} pixels",
            image.width(),
            image.height()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_rgba_as_rgb() {
        let image = ImageBuffer::from_samples(vec![0.5; 8 * 8 * 4], 8, 8, 4, true).unwrap();
        let bytes = JpegWriter::new().with_quality(75).encode(&image).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn rejects_oversized_dimensions() {
        let image = ImageBuffer::zeroed(70_000, 1, 3, false);
        assert!(matches!(JpegWriter::new().encode(&image), Err(IoError::InvalidArgument(_))));
    }

    #[test]
    fn write_failure_names_path() {
        let image = ImageBuffer::zeroed(4, 4, 3, false);
        let err = write("/nonexistent-dir/preview.jpg", &image).unwrap_err();
        assert!(matches!(err, IoError::WriteFailure { .. }));
    }
}
