//! Scanline source abstraction.
//!
//! A [`ScanlineSource`] is the decoder seam: it reports the layout of an
//! opened image and hands out one row of f32 samples at a time. Rows are
//! requested in non-decreasing order, so sequential codecs never have to
//! seek backwards and never hold more than one decoded row.
//!
//! ```text
//!  open_source(path)
//!      ├── ExrSource   (scanline blocks via `exr`)
//!      ├── HdrSource   (Radiance RGBE, RLE or flat)
//!      ├── PngSource   (row-by-row via `png`)
//!      └── MemorySource (pre-decoded rows, tests and embedding)
//! ```

use std::path::Path;

use crate::{Format, IoError, IoResult};

/// Layout reported by a codec when a source is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSpec {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Samples per pixel in each scanline.
    pub channels: u32,
    /// Channel names in scanline order.
    pub channel_names: Vec<String>,
    /// Tiled layout (cannot be streamed by scanline).
    pub tiled: bool,
    /// Container format.
    pub format: Format,
}

impl SourceSpec {
    /// Spec for an untiled image with the given channel names.
    pub fn new(width: u32, height: u32, channel_names: &[&str], format: Format) -> Self {
        Self {
            width,
            height,
            channels: channel_names.len() as u32,
            channel_names: channel_names.iter().map(|n| n.to_string()).collect(),
            tiled: false,
            format,
        }
    }

    /// Index of the channel named `A` or `Alpha`.
    pub fn alpha_index(&self) -> Option<usize> {
        self.channel_names.iter().position(|n| n == "A" || n == "Alpha")
    }

    /// Whether any channel is alpha.
    pub fn has_alpha(&self) -> bool {
        self.alpha_index().is_some()
    }

    /// Samples in one scanline.
    pub fn scanline_len(&self) -> usize {
        self.width as usize * self.channels as usize
    }
}

/// Streaming image source, read one scanline at a time.
pub trait ScanlineSource: Send {
    /// Layout of the opened image.
    fn spec(&self) -> &SourceSpec;

    /// Returns the samples of source row `row`.
    ///
    /// Requesting the row returned last is allowed; requesting an earlier row
    /// fails with [`IoError::OutOfOrderRead`] for forward-only codecs.
    fn read_scanline(&mut self, row: u32) -> IoResult<&[f32]>;
}

/// Boxed scanline source.
pub type BoxedSource = Box<dyn ScanlineSource>;

/// Opens `path` with the decoder matching its format.
pub fn open_source<P: AsRef<Path>>(path: P) -> IoResult<BoxedSource> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(IoError::source_unavailable(path, "file does not exist"));
    }

    match Format::detect(path) {
        #[cfg(feature = "exr")]
        Format::Exr => Ok(Box::new(crate::exr::ExrSource::open(path)?)),
        #[cfg(feature = "hdr")]
        Format::Hdr => Ok(Box::new(crate::hdr::HdrSource::open(path)?)),
        #[cfg(feature = "png")]
        Format::Png => Ok(Box::new(crate::png::PngSource::open(path)?)),
        other => Err(IoError::UnsupportedFormat(format!(
            "no scanline decoder for {:?} ({})",
            other,
            path.display()
        ))),
    }
}

/// Forward-only row bookkeeping shared by the sequential codecs.
///
/// Holds the most recently decoded row and the index of the next row the
/// underlying decoder will produce.
#[derive(Debug)]
pub(crate) struct RowCursor {
    height: u32,
    next: u32,
    current: Option<u32>,
    pub(crate) row: Vec<f32>,
}

impl RowCursor {
    pub(crate) fn new(height: u32, row_len: usize) -> Self {
        Self { height, next: 0, current: None, row: vec![0.0; row_len] }
    }

    /// Number of rows the decoder must still advance to reach `row`.
    ///
    /// Zero means `row` is already in `self.row`.
    pub(crate) fn rows_to_advance(&self, row: u32) -> IoResult<u32> {
        if row >= self.height {
            return Err(IoError::InvalidArgument(format!(
                "scanline {} out of range (height {})",
                row, self.height
            )));
        }
        match self.current {
            Some(current) if current == row => Ok(0),
            Some(current) if row < current => Err(IoError::OutOfOrderRead { requested: row, current }),
            _ => Ok(row - self.next + 1),
        }
    }

    /// Records that the decoder produced one more row into `self.row`.
    pub(crate) fn advance(&mut self) {
        self.current = Some(self.next);
        self.next += 1;
    }
}

/// Source backed by fully decoded samples.
///
/// Supports arbitrary row order.
#[derive(Debug, Clone)]
pub struct MemorySource {
    spec: SourceSpec,
    samples: Vec<f32>,
}

impl MemorySource {
    /// Wraps interleaved samples laid out as `spec` describes.
    pub fn new(spec: SourceSpec, samples: Vec<f32>) -> IoResult<Self> {
        let expected = spec.scanline_len() * spec.height as usize;
        if samples.len() != expected {
            return Err(IoError::InvalidArgument(format!(
                "memory source has {} samples, spec needs {}",
                samples.len(),
                expected
            )));
        }
        Ok(Self { spec, samples })
    }

    /// Marks the source as tiled.
    pub fn tiled(mut self) -> Self {
        self.spec.tiled = true;
        self
    }
}

impl ScanlineSource for MemorySource {
    fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    fn read_scanline(&mut self, row: u32) -> IoResult<&[f32]> {
        if row >= self.spec.height {
            return Err(IoError::InvalidArgument(format!(
                "scanline {} out of range (height {})",
                row, self.spec.height
            )));
        }
        let len = self.spec.scanline_len();
        let start = row as usize * len;
        Ok(&self.samples[start..start + len])
    }
}
