//! Slide format detection.
//!
//! - **Aperio SVS**: "Aperio" marker in the first ImageDescription
//! - **Generic Pyramidal TIFF**: any other tiled TIFF
//!
//! Anything that is not TIFF/BigTIFF is rejected before IFD parsing.

use serde::Serialize;

use super::tiff::{ByteOrder, TIFF_HEADER_SIZE};

const APERIO_MARKER: &str = "Aperio";

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SlideFormat {
    /// Aperio SVS (abbreviated JPEG tiles, metadata in ImageDescription)
    AperioSvs,

    /// Standard tiled TIFF with reduced-resolution levels
    GenericTiff,
}

impl SlideFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }
}

/// Classify a parsed TIFF by the ImageDescription of its first IFD.
pub fn detect_format(description: Option<&str>) -> SlideFormat {
    match description {
        Some(d) if d.contains(APERIO_MARKER) => SlideFormat::AperioSvs,
        _ => SlideFormat::GenericTiff,
    }
}

/// Quick check for TIFF or BigTIFF magic and version.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match &bytes[..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };

    matches!(byte_order.read_u16(&bytes[2..4]), 42 | 43)
}
