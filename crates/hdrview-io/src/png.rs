//! PNG format support.
//!
//! Reading streams one row at a time; interlaced files are rejected because
//! their rows only become final after the last pass. Palette and low bit
//! depths are expanded by the decoder, so rows arrive as 8- or 16-bit
//! samples and are scaled to `[0, 1]`.
//!
//! Writing emits 8-bit gray, gray+alpha, RGB or RGBA.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use tracing::{debug, trace};

use crate::source::RowCursor;
use crate::{Format, ImageBuffer, IoError, IoResult, ScanlineSource, SourceSpec};

/// Streaming PNG reader.
pub struct PngSource<R: Read = BufReader<File>> {
    reader: png::Reader<R>,
    spec: SourceSpec,
    cursor: RowCursor,
    sixteen_bit: bool,
}

impl PngSource {
    /// Opens `path` and reads the PNG header.
    pub fn open<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IoError::source_unavailable(path, e))?;
        let source = Self::from_reader(BufReader::new(file))?;
        debug!(
            path = %path.display(),
            width = source.spec.width,
            height = source.spec.height,
            channels = source.spec.channels,
            "Opened PNG source"
        );
        Ok(source)
    }
}

impl<R: Read + Send> PngSource<R> {
    /// Reads the header from an arbitrary reader.
    pub fn from_reader(reader: R) -> IoResult<Self> {
        let mut decoder = png::Decoder::new(reader);
        decoder.set_transformations(png::Transformations::EXPAND);
        let reader = decoder
            .read_info()
            .map_err(|e: png::DecodingError| IoError::Decode(e.to_string()))?;

        let info = reader.info();
        if info.interlaced {
            return Err(IoError::UnsupportedFormat("interlaced PNG".into()));
        }
        let (width, height) = (info.width, info.height);

        let (color_type, bit_depth) = reader.output_color_type();
        let names: &[&str] = match color_type {
            png::ColorType::Grayscale => &["Y"],
            png::ColorType::GrayscaleAlpha => &["Y", "A"],
            png::ColorType::Rgb => &["R", "G", "B"],
            png::ColorType::Rgba => &["R", "G", "B", "A"],
            other => {
                return Err(IoError::UnsupportedFormat(format!("PNG color type {:?}", other)));
            }
        };
        let sixteen_bit = match bit_depth {
            png::BitDepth::Eight => false,
            png::BitDepth::Sixteen => true,
            other => return Err(IoError::UnsupportedFormat(format!("PNG bit depth {:?}", other))),
        };

        let spec = SourceSpec::new(width, height, names, Format::Png);
        Ok(Self {
            reader,
            cursor: RowCursor::new(height, spec.scanline_len()),
            spec,
            sixteen_bit,
        })
    }

    fn decode_next(&mut self) -> IoResult<()> {
        let row = self
            .reader
            .next_row()
            .map_err(|e| IoError::Decode(e.to_string()))?
            .ok_or_else(|| IoError::Decode("PNG ended before last row".into()))?;
        let data = row.data();

        if self.sixteen_bit {
            for (out, bytes) in self.cursor.row.iter_mut().zip(data.chunks_exact(2)) {
                *out = u16::from_be_bytes([bytes[0], bytes[1]]) as f32 / 65535.0;
            }
        } else {
            for (out, &byte) in self.cursor.row.iter_mut().zip(data) {
                *out = byte as f32 / 255.0;
            }
        }
        Ok(())
    }
}

impl<R: Read + Send> ScanlineSource for PngSource<R> {
    fn spec(&self) -> &SourceSpec {
        &self.spec
    }

    fn read_scanline(&mut self, row: u32) -> IoResult<&[f32]> {
        let pending = self.cursor.rows_to_advance(row)?;
        for _ in 0..pending {
            self.decode_next()?;
            self.cursor.advance();
        }
        Ok(&self.cursor.row)
    }
}

/// Writes `image` as an 8-bit PNG, clamping samples to `[0, 1]`.
pub fn write<P: AsRef<Path>>(path: P, image: &ImageBuffer) -> IoResult<()> {
    let path = path.as_ref();
    let color_type = match image.channels() {
        1 => png::ColorType::Grayscale,
        2 => png::ColorType::GrayscaleAlpha,
        3 => png::ColorType::Rgb,
        4 => png::ColorType::Rgba,
        n => return Err(IoError::write_failure(path, format!("unsupported channel count: {}", n))),
    };

    let file = File::create(path).map_err(|e| IoError::write_failure(path, e))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width(), image.height());
    encoder.set_color(color_type);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| IoError::write_failure(path, e))?;
    writer
        .write_image_data(&image.to_u8())
        .map_err(|e| IoError::write_failure(path, e))?;
    writer.finish().map_err(|e| IoError::write_failure(path, e))?;

    trace!(width = image.width(), height = image.height(), "PNG written");
    Ok(())
}
