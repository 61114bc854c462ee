//! JPEG tile encoder.
//!
//! Tiles are encoded once in memory: the encoded size feeds the acceptance
//! policy, and the same bytes are written to disk when the tile is kept.

use std::path::Path;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::TileError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// JPEG Encoder
// =============================================================================

/// Encodes RGB pixels to baseline JPEG at a fixed quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegTileEncoder {
    quality: u8,
}

impl Default for JpegTileEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegTileEncoder {
    /// Quality is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(&self, pixels: &RgbImage) -> Result<Bytes, TileError> {
        let mut output = Vec::new();
        JpegEncoder::new_with_quality(&mut output, self.quality)
            .encode_image(pixels)
            .map_err(|e| TileError::EncodeError {
                message: e.to_string(),
            })?;
        Ok(Bytes::from(output))
    }

    /// Encode and write to `path`, replacing any existing file.
    pub fn save(&self, pixels: &RgbImage, path: &Path) -> Result<(), TileError> {
        let encoded = self.encode(pixels)?;
        write_file(path, &encoded)
    }
}

/// Write already-encoded bytes.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), TileError> {
    std::fs::write(path, bytes).map_err(|source| TileError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

// =============================================================================
// Tests
// =============================================================================
