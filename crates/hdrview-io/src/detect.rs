//! Format detection.
//!
//! The HDR decision is made from the file extension alone; magic bytes are
//! only used to pick a decoder when the extension is missing or wrong.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Image formats known to the preview pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// OpenEXR.
    Exr,
    /// Radiance RGBE.
    Hdr,
    /// PNG.
    Png,
    /// JPEG (write only).
    Jpeg,
    /// Anything else.
    Unknown,
}

impl Format {
    /// Picks a decoder for `path`: extension first, then magic bytes.
    pub fn detect<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::from_extension(path) {
            Format::Unknown => Self::from_magic_bytes(path).unwrap_or(Format::Unknown),
            format => format,
        }
    }

    /// Detects format from file extension only (case-insensitive).
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("exr") => Format::Exr,
            Some("hdr") | Some("pic") | Some("rgbe") => Format::Hdr,
            Some("png") => Format::Png,
            Some("jpg") | Some("jpeg") => Format::Jpeg,
            _ => Format::Unknown,
        }
    }

    /// Reads the first bytes of the file and matches known signatures.
    pub fn from_magic_bytes<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 8];
        let bytes_read = file.read(&mut header)?;
        Ok(Self::from_bytes(&header[..bytes_read]))
    }

    /// Detects format from raw bytes (magic number check).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.len() >= 4 && bytes[0..4] == [0x76, 0x2f, 0x31, 0x01] {
            return Format::Exr;
        }
        if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
            return Format::Png;
        }
        if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
            return Format::Jpeg;
        }
        if bytes.len() >= 2 && bytes[0..2] == [b'#', b'?'] {
            return Format::Hdr;
        }
        Format::Unknown
    }

    /// Typical file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Exr => "exr",
            Format::Hdr => "hdr",
            Format::Png => "png",
            Format::Jpeg => "jpg",
            Format::Unknown => "",
        }
    }

    /// Linear high-dynamic-range container.
    pub fn is_hdr(&self) -> bool {
        matches!(self, Format::Exr | Format::Hdr)
    }
}

/// True when the extension of `path` names an HDR container (`.exr`, `.hdr`, ...).
pub fn is_hdr_path<P: AsRef<Path>>(path: P) -> bool {
    Format::from_extension(path).is_hdr()
}
