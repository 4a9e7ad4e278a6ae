//! Radiance HDR (RGBE) format support.
//!
//! Scanlines are decoded one at a time, either new-style RLE or flat RGBE.
//! Only the standard `-Y height +X width` orientation is accepted.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, trace};

use crate::source::RowCursor;
use crate::{Format, ImageBuffer, IoError, IoResult, ScanlineSource, SourceSpec};

const HDR_MAGIC: &str = "#?";
const RLE_MIN_WIDTH: usize = 8;
const RLE_MAX_WIDTH: usize = 0x7fff;

/// Streaming Radiance RGBE reader.
pub struct HdrSource<R = BufReader<File>> {
    reader: R,
    spec: SourceSpec,
    cursor: RowCursor,
    rgbe: Vec<u8>,
    channel: Vec<u8>,
}

impl HdrSource {
    /// Opens `path` and parses the header.
    pub fn open<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| IoError::source_unavailable(path, e))?;
        let source = Self::from_reader(BufReader::new(file))?;
        debug!(
            path = %path.display(),
            width = source.spec.width,
            height = source.spec.height,
            "Opened HDR source"
        );
        Ok(source)
    }
}

impl<R: BufRead + Send> HdrSource<R> {
    /// Parses the header from an arbitrary reader.
    pub fn from_reader(mut reader: R) -> IoResult<Self> {
        let (width, height) = read_header(&mut reader)?;
        let spec = SourceSpec::new(width, height, &["R", "G", "B"], Format::Hdr);
        let w = width as usize;
        Ok(Self {
            reader,
            cursor: RowCursor::new(height, w * 3),
            spec,
            rgbe: vec![0u8; w * 4],
            channel: vec![0u8; w],
        })
    }

    fn decode_next(&mut self) -> IoResult<()> {
        let width = self.spec.width as usize;
        let mut header = [0u8; 4];
        self.reader.read_exact(&mut header).map_err(truncated)?;

        let is_rle = (RLE_MIN_WIDTH..=RLE_MAX_WIDTH).contains(&width)
            && header[0] == 2
            && header[1] == 2
            && header[2] & 0x80 == 0;

        if is_rle {
            decode_rle_scanline(&mut self.reader, width, &mut self.rgbe, &mut self.channel, header)?;
        } else {
            self.rgbe[..4].copy_from_slice(&header);
            self.reader.read_exact(&mut self.rgbe[4..]).map_err(truncated)?;
        }

        for (px, out) in self.rgbe.chunks_exact(4).zip(self.cursor.row.chunks_exact_mut(3)) {
            let (r, g, b) = rgbe_to_f32(px[0], px[1], px[2], px[3]);
            out[0] = r;
            out[1] = g;
            out[2] = b;
        }
        Ok(())
    }
}

impl<R: BufRead + Send> ScanlineSource for HdrSource<R> {
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

/// Writes `image` as RLE RGBE. Alpha and extra channels are dropped.
pub fn write<P: AsRef<Path>>(path: P, image: &ImageBuffer) -> IoResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| IoError::write_failure(path, e))?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, image)
        .and_then(|_| writer.flush())
        .map_err(|e| IoError::write_failure(path, e))?;
    trace!(width = image.width(), height = image.height(), "HDR written");
    Ok(())
}

/// Encodes `image` into any writer.
pub fn write_to<W: Write>(writer: &mut W, image: &ImageBuffer) -> io::Result<()> {
    writeln!(writer, "{}RADIANCE", HDR_MAGIC)?;
    write_header_field(writer, "FORMAT", "32-bit_rle_rgbe")?;
    writeln!(writer)?;
    writeln!(writer, "-Y {} +X {}", image.height(), image.width())?;

    let width = image.width() as usize;
    let channels = image.channels() as usize;
    let use_rle = (RLE_MIN_WIDTH..=RLE_MAX_WIDTH).contains(&width);
    let mut scanline = vec![0u8; width * 4];

    if width == 0 || channels == 0 {
        return Ok(());
    }

    for row in image.samples().chunks_exact(width * channels) {
        for (x, px) in row.chunks_exact(channels).enumerate() {
            let (r, g, b) = if channels >= 3 { (px[0], px[1], px[2]) } else { (px[0], px[0], px[0]) };
            scanline[x * 4..x * 4 + 4].copy_from_slice(&f32_to_rgbe(r, g, b));
        }

        if use_rle {
            writer.write_all(&[2u8, 2u8, (width >> 8) as u8, (width & 0xFF) as u8])?;
            encode_rle_scanline(writer, width, &scanline)?;
        } else {
            writer.write_all(&scanline)?;
        }
    }
    Ok(())
}

fn read_header<R: BufRead>(reader: &mut R) -> IoResult<(u32, u32)> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if !trim_line(&line).starts_with(HDR_MAGIC) {
        return Err(IoError::Decode("HDR magic not found".into()));
    }

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(IoError::Decode("HDR header ended before resolution line".into()));
        }
        let line = trim_line(&line);

        if line.starts_with('+') || line.starts_with('-') {
            return parse_resolution(line);
        }

        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("FORMAT") && !value.contains("rgbe") {
                return Err(IoError::UnsupportedFormat(format!("HDR pixel format {}", value.trim())));
            }
        }
    }
}

fn parse_resolution(line: &str) -> IoResult<(u32, u32)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [y_axis, h, x_axis, w] = parts.as_slice() else {
        return Err(IoError::Decode(format!("invalid HDR resolution line: {line}")));
    };
    if *y_axis != "-Y" || *x_axis != "+X" {
        return Err(IoError::UnsupportedFormat(format!("HDR orientation {line}")));
    }
    let parse = |v: &str| {
        v.parse::<u32>()
            .map_err(|_| IoError::Decode(format!("invalid HDR resolution line: {line}")))
    };
    Ok((parse(*w)?, parse(*h)?))
}

fn decode_rle_scanline<R: Read>(
    reader: &mut R,
    width: usize,
    out: &mut [u8],
    channel: &mut [u8],
    header: [u8; 4],
) -> IoResult<()> {
    let encoded_width = ((header[2] as usize) << 8) | (header[3] as usize);
    if encoded_width != width {
        return Err(IoError::Decode(format!(
            "HDR RLE width mismatch: {encoded_width} != {width}"
        )));
    }

    for c in 0..4 {
        let mut idx = 0usize;
        while idx < width {
            let mut count = [0u8; 1];
            reader.read_exact(&mut count).map_err(truncated)?;
            let count = count[0] as usize;
            let run = if count > 128 { count - 128 } else { count };
            if run == 0 || idx + run > width {
                return Err(IoError::Decode("HDR RLE run overruns scanline".into()));
            }
            if count > 128 {
                let mut value = [0u8; 1];
                reader.read_exact(&mut value).map_err(truncated)?;
                channel[idx..idx + run].fill(value[0]);
            } else {
                reader.read_exact(&mut channel[idx..idx + run]).map_err(truncated)?;
            }
            idx += run;
        }

        for x in 0..width {
            out[x * 4 + c] = channel[x];
        }
    }
    Ok(())
}

fn encode_rle_scanline<W: Write>(writer: &mut W, width: usize, scanline: &[u8]) -> io::Result<()> {
    let mut channel = vec![0u8; width];
    for c in 0..4 {
        for x in 0..width {
            channel[x] = scanline[x * 4 + c];
        }
        writer.write_all(&encode_rle_channel(&channel))?;
    }
    Ok(())
}

fn encode_rle_channel(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0usize;
    while i < data.len() {
        let run = run_length(data, i);
        if run >= 4 {
            out.push((128 + run) as u8);
            out.push(data[i]);
            i += run;
            continue;
        }

        let start = i;
        while i < data.len() && i - start < 128 && run_length(data, i) < 4 {
            i += 1;
        }
        out.push((i - start) as u8);
        out.extend_from_slice(&data[start..i]);
    }
    out
}

fn run_length(data: &[u8], at: usize) -> usize {
    let mut run = 1usize;
    while at + run < data.len() && run < 127 && data[at] == data[at + run] {
        run += 1;
    }
    run
}

fn f32_to_rgbe(r: f32, g: f32, b: f32) -> [u8; 4] {
    let r = r.max(0.0);
    let g = g.max(0.0);
    let b = b.max(0.0);
    let max = r.max(g).max(b);
    if !max.is_finite() || max < 1.0e-32 {
        return [0, 0, 0, 0];
    }

    let (m, e) = frexp(max);
    let scale = m * 256.0 / max;

    [
        (r * scale).clamp(0.0, 255.0) as u8,
        (g * scale).clamp(0.0, 255.0) as u8,
        (b * scale).clamp(0.0, 255.0) as u8,
        (e + 128).clamp(0, 255) as u8,
    ]
}

fn rgbe_to_f32(r: u8, g: u8, b: u8, e: u8) -> (f32, f32, f32) {
    if e == 0 {
        return (0.0, 0.0, 0.0);
    }
    let f = 2.0_f32.powi(e as i32 - 136);
    (r as f32 * f, g as f32 * f, b as f32 * f)
}

fn frexp(x: f32) -> (f32, i32) {
    if x == 0.0 {
        return (0.0, 0);
    }
    let e = x.abs().log2().floor() as i32 + 1;
    (x / 2.0_f32.powi(e), e)
}

fn write_header_field<W: Write>(writer: &mut W, key: &str, value: &str) -> io::Result<()> {
    writeln!(writer, "{}={}", key, value)
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}

fn truncated(e: io::Error) -> IoError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        IoError::Decode("HDR pixel data truncated".into())
    } else {
        IoError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn encode(image: &ImageBuffer) -> Vec<u8> {
        let mut bytes = Vec::new();
        write_to(&mut bytes, image).unwrap();
        bytes
    }

    #[test]
    fn parse_resolution_line() {
        assert_eq!(parse_resolution("-Y 2 +X 3").unwrap(), (3, 2));
        assert!(matches!(parse_resolution("+X 4 -Y 5"), Err(IoError::UnsupportedFormat(_))));
        assert!(matches!(parse_resolution("-Y two +X 3"), Err(IoError::Decode(_))));
    }

    #[test]
    fn rle_scanlines_stream_back() {
        let (width, height) = (16u32, 3u32);
        let data: Vec<f32> = (0..width * height * 3).map(|i| 0.5 + (i / 7) as f32).collect();
        let image = ImageBuffer::from_samples(data.clone(), width, height, 3, false).unwrap();

        let mut source = HdrSource::from_reader(Cursor::new(encode(&image))).unwrap();
        assert_eq!(source.spec().width, width);
        assert_eq!(source.spec().height, height);

        let row = source.read_scanline(2).unwrap();
        let start = (2 * width * 3) as usize;
        for (got, want) in row.iter().zip(&data[start..]) {
            assert_relative_eq!(*got, *want, max_relative = 0.01);
        }
    }

    #[test]
    fn flat_scanlines_for_narrow_images() {
        let image = ImageBuffer::from_samples(vec![1.0, 2.0, 4.0, 0.0, 0.0, 0.0], 2, 1, 3, false).unwrap();
        let mut source = HdrSource::from_reader(Cursor::new(encode(&image))).unwrap();
        let row = source.read_scanline(0).unwrap();
        assert_relative_eq!(row[0], 1.0, max_relative = 0.01);
        assert_relative_eq!(row[2], 4.0, max_relative = 0.01);
        assert_eq!(&row[3..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn backward_read_is_rejected() {
        let image = ImageBuffer::zeroed(8, 4, 3, false);
        let mut source = HdrSource::from_reader(Cursor::new(encode(&image))).unwrap();
        source.read_scanline(3).unwrap();
        assert!(matches!(source.read_scanline(1), Err(IoError::OutOfOrderRead { .. })));
    }

    #[test]
    fn truncated_data_is_decode_error() {
        let image = ImageBuffer::from_samples(vec![1.0; 8 * 2 * 3], 8, 2, 3, false).unwrap();
        let mut bytes = encode(&image);
        bytes.truncate(bytes.len() - 4);
        let mut source = HdrSource::from_reader(Cursor::new(bytes)).unwrap();
        source.read_scanline(0).unwrap();
        assert!(matches!(source.read_scanline(1), Err(IoError::Decode(_))));
    }

    #[test]
    fn rejects_missing_magic() {
        let err = HdrSource::from_reader(Cursor::new(b"P6\n2 2\n".to_vec())).err();
        assert!(matches!(err, Some(IoError::Decode(_))));
    }

    #[test]
    fn rle_channel_encoding() {
        let data = [7u8; 10];
        assert_eq!(encode_rle_channel(&data), vec![138, 7]);
        let data = [1u8, 2, 3];
        assert_eq!(encode_rle_channel(&data), vec![3, 1, 2, 3]);
    }
}
