//! Tile acceptance policy.
//!
//! Two independent filters drop uninformative tiles:
//!
//! - **Background**: a pixel is background when every channel is strictly
//!   above the threshold (bright, unstained glass). A tile is rejected when
//!   the background fraction is strictly above the maximum ratio.
//! - **Encoded size**: nearly uniform tiles compress to almost nothing. A
//!   tile whose JPEG encoding is smaller than the minimum is rejected.
//!
//! The size filter needs the encoded bytes, so evaluation returns them for
//! accepted tiles and the caller writes exactly what was measured.

use bytes::Bytes;
use image::RgbImage;
use serde::Serialize;

use crate::error::TileError;
use crate::tile::JpegTileEncoder;

/// Default per-channel background threshold.
pub const DEFAULT_BACKGROUND_THRESHOLD: u8 = 220;

/// Default maximum tolerated background fraction.
pub const DEFAULT_BACKGROUND_RATIO: f64 = 0.75;

/// Default minimum encoded tile size in KiB.
pub const DEFAULT_MIN_TILE_KB: usize = 5;

// =============================================================================
// Filters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackgroundFilter {
    pub pixel_threshold: u8,
    pub max_ratio: f64,
}

impl Default for BackgroundFilter {
    fn default() -> Self {
        Self {
            pixel_threshold: DEFAULT_BACKGROUND_THRESHOLD,
            max_ratio: DEFAULT_BACKGROUND_RATIO,
        }
    }
}

impl BackgroundFilter {
    /// Fraction of pixels with every channel above the threshold.
    pub fn background_fraction(&self, pixels: &RgbImage) -> f64 {
        let total = pixels.width() as u64 * pixels.height() as u64;
        if total == 0 {
            return 1.0;
        }

        let threshold = self.pixel_threshold;
        let background = pixels
            .pixels()
            .filter(|p| p.0.iter().all(|&c| c > threshold))
            .count() as u64;

        background as f64 / total as f64
    }

    pub fn is_background(&self, pixels: &RgbImage) -> bool {
        self.background_fraction(pixels) > self.max_ratio
    }
}

/// Outcome of evaluating one tile.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Keep the tile; carries its encoded bytes.
    Accept(Bytes),
    RejectBackground { fraction: f64 },
    RejectTooSmall { encoded_bytes: usize },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accept(_))
    }
}

// =============================================================================
// AcceptancePolicy
// =============================================================================

/// Both filters, each optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcceptancePolicy {
    pub background: Option<BackgroundFilter>,
    pub min_encoded_bytes: Option<usize>,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            background: Some(BackgroundFilter::default()),
            min_encoded_bytes: Some(DEFAULT_MIN_TILE_KB * 1024),
        }
    }
}

impl AcceptancePolicy {
    /// Keep every tile.
    pub fn accept_all() -> Self {
        Self {
            background: None,
            min_encoded_bytes: None,
        }
    }

    /// Run the background test, then encode and run the size test.
    pub fn evaluate(
        &self,
        pixels: &RgbImage,
        encoder: &JpegTileEncoder,
    ) -> Result<Decision, TileError> {
        if let Some(filter) = &self.background {
            let fraction = filter.background_fraction(pixels);
            if fraction > filter.max_ratio {
                return Ok(Decision::RejectBackground { fraction });
            }
        }

        let encoded = encoder.encode(pixels)?;
        if let Some(min) = self.min_encoded_bytes {
            if encoded.len() < min {
                return Ok(Decision::RejectTooSmall {
                    encoded_bytes: encoded.len(),
                });
            }
        }

        Ok(Decision::Accept(encoded))
    }

    /// Whether the tile passes both filters.
    pub fn accept(&self, pixels: &RgbImage, encoder: &JpegTileEncoder) -> Result<bool, TileError> {
        Ok(self.evaluate(pixels, encoder)?.is_accepted())
    }
}

// =============================================================================
// Tests
// =============================================================================
