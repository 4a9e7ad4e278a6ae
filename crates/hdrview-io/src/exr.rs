//! OpenEXR format support.
//!
//! Reading works on the block level of the `exr` crate. A source keeps a
//! window of at most [`WINDOW_ROWS`] rows (rounded out to whole blocks)
//! decoded: when a requested row falls outside it, the file's offset table
//! is consulted and only the chunks overlapping the next window are read
//! and decompressed. Memory stays bounded whatever the file's line order.
//! Only the first layer is read.
//!
//! EXR stores channels sorted by name; sources report them reordered as
//! `R, G, B`, then `Y`, then `A`, then the remaining channels by name.
//!
//! Tiled, deep and subsampled files are rejected with
//! [`IoError::UnsupportedFormat`].

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use exr::block::UncompressedBlock;
use exr::block::chunk::Chunk;
use exr::block::reader::Reader;
use exr::meta::attribute::SampleType;
use exr::meta::{BlockDescription, MetaData};
use half::f16;
use tracing::{debug, trace};

use crate::{Format, ImageBuffer, IoError, IoResult, ScanlineSource, SourceSpec};

const PEDANTIC: bool = false;

/// Rows decoded per window load.
pub const WINDOW_ROWS: usize = 64;

/// Streaming reader for scanline OpenEXR files.
pub struct ExrSource {
    path: PathBuf,
    meta: MetaData,
    spec: SourceSpec,
    /// Output slot of each file channel.
    slots: Vec<usize>,
    /// Decoded blocks sorted by first row.
    window: Vec<DecodedBlock>,
    last_row: Option<u32>,
}

/// Interleaved rows of one scanline block.
struct DecodedBlock {
    start: usize,
    rows: usize,
    samples: Vec<f32>,
}

impl DecodedBlock {
    fn contains(&self, y: usize) -> bool {
        y >= self.start && y < self.start + self.rows
    }

    fn end(&self) -> usize {
        self.start + self.rows
    }

    fn row(&self, y: usize, row_len: usize) -> &[f32] {
        let offset = (y - self.start) * row_len;
        &self.samples[offset..offset + row_len]
    }
}

fn decode_err(e: exr::error::Error) -> IoError {
    IoError::Decode(e.to_string())
}

impl ExrSource {
    /// Opens `path` and reads the header of the first layer.
    pub fn open<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IoError::source_unavailable(path, e))?;
        let reader = Reader::read_from_buffered(BufReader::new(file), PEDANTIC)
            .map_err(|e| IoError::source_unavailable(path, e))?;
        let meta = reader.into_meta_data();

        let header = meta
            .headers
            .first()
            .ok_or_else(|| IoError::Decode("EXR file has no layers".into()))?;
        if header.deep {
            return Err(IoError::UnsupportedFormat("deep EXR".into()));
        }
        let tiled = matches!(header.blocks, BlockDescription::Tiles(_));
        if tiled {
            return Err(IoError::UnsupportedFormat(format!("tiled EXR ({})", path.display())));
        }
        if header.channels.list.iter().any(|c| c.sampling.x() != 1 || c.sampling.y() != 1) {
            return Err(IoError::UnsupportedFormat("subsampled EXR channels".into()));
        }

        let names: Vec<String> =
            header.channels.list.iter().map(|c| c.name.to_string()).collect();
        let order = channel_order(&names);
        let mut slots = vec![0usize; names.len()];
        for (slot, &file_index) in order.iter().enumerate() {
            slots[file_index] = slot;
        }

        let spec = SourceSpec {
            width: header.layer_size.width() as u32,
            height: header.layer_size.height() as u32,
            channels: names.len() as u32,
            channel_names: order.iter().map(|&i| names[i].clone()).collect(),
            tiled,
            format: Format::Exr,
        };
        debug!(
            path = %path.display(),
            width = spec.width,
            height = spec.height,
            channels = ?spec.channel_names,
            line_order = ?header.line_order,
            "Opened EXR source"
        );

        Ok(Self {
            path: path.to_path_buf(),
            meta,
            spec,
            slots,
            window: Vec::new(),
            last_row: None,
        })
    }

    /// Replaces the window with the blocks overlapping `y..y + WINDOW_ROWS`.
    fn load_window(&mut self, y: usize) -> IoResult<()> {
        let file = File::open(&self.path).map_err(|e| IoError::source_unavailable(&self.path, e))?;
        let reader = Reader::read_from_buffered(BufReader::new(file), PEDANTIC).map_err(decode_err)?;

        let last = y + WINDOW_ROWS;
        let chunks = reader
            .filter_chunks(PEDANTIC, |_, _, block| {
                let top = block.pixel_position.y();
                block.layer == 0 && top < last && top + block.pixel_size.height() > y
            })
            .map_err(decode_err)?
            .collect::<exr::error::Result<Vec<Chunk>>>()
            .map_err(decode_err)?;

        self.window.clear();
        for chunk in chunks {
            let block = self.decode_chunk(chunk)?;
            self.window.push(block);
        }
        self.window.sort_by_key(|b| b.start);
        trace!(y, blocks = self.window.len(), rows = self.buffered_rows(), "Loaded EXR window");
        Ok(())
    }

    /// Rows currently held decoded.
    fn buffered_rows(&self) -> usize {
        self.window.iter().map(|b| b.rows).sum()
    }

    fn decode_chunk(&self, chunk: Chunk) -> IoResult<DecodedBlock> {
        let block = UncompressedBlock::decompress_chunk(chunk, &self.meta, PEDANTIC)
            .map_err(decode_err)?;
        let header = &self.meta.headers[0];

        let start = block.index.pixel_position.y();
        let rows = block.index.pixel_size.height();
        let width = self.spec.width as usize;
        let channels = self.spec.channels as usize;
        let mut samples = vec![0.0f32; rows * width * channels];

        let mut half_line: Vec<f16> = Vec::new();
        let mut float_line: Vec<f32> = Vec::new();
        let mut uint_line: Vec<u32> = Vec::new();

        for line in block.lines(&header.channels) {
            let location = &line.location;
            let slot = self.slots[location.channel];
            let y = location.position.y() - start;
            let x0 = location.position.x();
            let count = location.sample_count;
            let base = (y * width + x0) * channels + slot;
            let out = samples[base..].iter_mut().step_by(channels).take(count);

                match header.channels.list[location.channel].sample_type {
                SampleType::F16 => {
                    half_line.resize(count, f16::ZERO);
                    line.read_samples_into_slice(&mut half_line).map_err(decode_err)?;
                    for (o, v) in out.zip(&half_line) {
                        *o = v.to_f32();
                    }
                }
                SampleType::F32 => {
                    float_line.resize(count, 0.0);
                    line.read_samples_into_slice(&mut float_line).map_err(decode_err)?;
                    for (o, v) in out.zip(&float_line) {
                        *o = *v;
                    }
                }
                SampleType::U32 => {
                    uint_line.resize(count, 0);
                    line.read_samples_into_slice(&mut uint_line).map_err(decode_err)?;
                    for (o, v) in out.zip(&uint_line) {
                        *o = *v as f32;
                    }
                }
            }
        }

        trace!(start, rows, "Decoded EXR block");
        Ok(DecodedBlock { start, rows, samples })
    }
}

impl ScanlineSource for ExrSource {
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
        if let Some(current) = self.last_row.filter(|&last| row < last) {
            return Err(IoError::OutOfOrderRead { requested: row, current });
        }
        self.last_row = Some(row);

        let y = row as usize;
        self.window.retain(|b| b.end() > y);
        if !self.window.iter().any(|b| b.contains(y)) {
            self.load_window(y)?;
        }

        let row_len = self.spec.scanline_len();
        match self.window.iter().find(|b| b.contains(y)) {
            Some(block) => Ok(block.row(y, row_len)),
            None => Err(IoError::Decode(format!("EXR scanline {} missing", y))),
        }
    }
}

/// File channel indices in output order.
fn channel_order(names: &[String]) -> Vec<usize> {
    const PRIORITY: [&str; 5] = ["R", "G", "B", "Y", "A"];
    let rank = |name: &str| PRIORITY.iter().position(|p| *p == name).unwrap_or(PRIORITY.len());

    let mut order: Vec<usize> = (0..names.len()).collect();
    order.sort_by(|&a, &b| rank(&names[a]).cmp(&rank(&names[b])).then_with(|| names[a].cmp(&names[b])));
    order
}

/// Writes `image` as a ZIP-compressed f32 RGB or RGBA scanline EXR.
///
/// Single-channel and luminance+alpha buffers are broadcast to RGB.
pub fn write<P: AsRef<Path>>(path: P, image: &ImageBuffer) -> IoResult<()> {
    use exr::compression::Compression;
    use exr::image::{Blocks, Encoding};
    use exr::meta::attribute::LineOrder;
    use exr::prelude::*;

    let path = path.as_ref();
    let width = image.width() as usize;
    let height = image.height() as usize;
    let channels = image.channels() as usize;
    if channels == 0 {
        return Err(IoError::write_failure(path, "buffer has no channels"));
    }
    let samples = image.samples();
    // Scanline blocks keep written files readable by `ExrSource`.
    let encoding = Encoding {
        compression: Compression::ZIP16,
        blocks: Blocks::ScanLines,
        line_order: LineOrder::Increasing,
    };

    let pixel = |pos: Vec2<usize>| -> (f32, f32, f32, f32) {
        let px = &samples[(pos.y() * width + pos.x()) * channels..][..channels];
        match channels {
            1 => (px[0], px[0], px[0], 1.0),
            2 => (px[0], px[0], px[0], px[1]),
            3 => (px[0], px[1], px[2], 1.0),
            _ => (px[0], px[1], px[2], px[3]),
        }
    };

    let result = if channels == 2 || channels >= 4 {
        let layer = Layer::new(
            (width, height),
            LayerAttributes::named("RGBA"),
            encoding,
            SpecificChannels::rgba(|pos: Vec2<usize>| pixel(pos)),
        );
        Image::from_layer(layer).write().to_file(path)
    } else {
        let layer = Layer::new(
            (width, height),
            LayerAttributes::named("RGB"),
            encoding,
            SpecificChannels::rgb(|pos: Vec2<usize>| {
                let (r, g, b, _) = pixel(pos);
                (r, g, b)
            }),
        );
        Image::from_layer(layer).write().to_file(path)
    };
    result.map_err(|e| IoError::write_failure(path, e))?;

    trace!(width, height, channels, "EXR written");
    Ok(())
}
