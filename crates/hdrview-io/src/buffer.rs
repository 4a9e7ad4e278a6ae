//! Reduced-resolution pixel buffer.

use crate::{IoError, IoResult};

/// Row-major, channel-interleaved f32 samples.
///
/// `samples.len() == width * height * channels` always holds.
#[derive(Clone, PartialEq)]
pub struct ImageBuffer {
    samples: Vec<f32>,
    width: u32,
    height: u32,
    channels: u32,
    has_alpha: bool,
}

impl ImageBuffer {
    /// Wraps existing samples, checking the length invariant.
    pub fn from_samples(
        samples: Vec<f32>,
        width: u32,
        height: u32,
        channels: u32,
        has_alpha: bool,
    ) -> IoResult<Self> {
        let expected = sample_count(width, height, channels);
        if samples.len() != expected {
            return Err(IoError::InvalidArgument(format!(
                "buffer of {} samples does not match {}x{}x{} ({})",
                samples.len(),
                width,
                height,
                channels,
                expected
            )));
        }
        Ok(Self { samples, width, height, channels, has_alpha })
    }

    /// Zero-filled buffer.
    pub fn zeroed(width: u32, height: u32, channels: u32, has_alpha: bool) -> Self {
        Self {
            samples: vec![0.0; sample_count(width, height, channels)],
            width,
            height,
            channels,
            has_alpha,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Whether the last channel is alpha.
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// Pixel data.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mutable pixel data.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Takes ownership of the samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Replaces the samples with a buffer of identical length.
    pub fn replace_samples(&mut self, samples: Vec<f32>) -> IoResult<()> {
        if samples.len() != self.samples.len() {
            return Err(IoError::InvalidArgument(format!(
                "replacement has {} samples, buffer holds {}",
                samples.len(),
                self.samples.len()
            )));
        }
        self.samples = samples;
        Ok(())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True for a zero-area buffer.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Quantizes to 8 bits, clamping to `[0, 1]`.
    pub fn to_u8(&self) -> Vec<u8> {
        self.samples
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    /// Drops the 4th sample of every pixel, turning RGBA into RGB.
    ///
    /// No-op unless the buffer has 4 channels.
    pub fn strip_alpha(&mut self) {
        if self.channels != 4 {
            return;
        }
        let mut compact = Vec::with_capacity(self.samples.len() / 4 * 3);
        for pixel in self.samples.chunks_exact(4) {
            compact.extend_from_slice(&pixel[..3]);
        }
        self.samples = compact;
        self.channels = 3;
        self.has_alpha = false;
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("channels", &self.channels)
            .field("has_alpha", &self.has_alpha)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}

fn sample_count(width: u32, height: u32, channels: u32) -> usize {
    (width as usize) * (height as usize) * (channels as usize)
}
