//! Format-agnostic slide access.
//!
//! The tiling engine only talks to slides through [`SlideHandle`], and only
//! obtains handles through a [`SlideOpener`]. Crop workers each open their own
//! handle from the slide path, so handles never need to be shared between
//! tasks.

use std::path::Path;

use async_trait::async_trait;
use image::RgbImage;

use crate::error::SlideError;

/// Background color used for pixels outside the stored image.
pub const BACKGROUND: image::Rgb<u8> = image::Rgb([255, 255, 255]);

// =============================================================================
// SlideHandle Trait
// =============================================================================

/// An opened slide: metadata plus region and thumbnail reads.
#[async_trait]
pub trait SlideHandle: Send + Sync {
    /// Number of native pyramid levels. Level 0 is the highest resolution.
    fn level_count(&self) -> usize;

    /// `(width, height)` of a level, `None` if out of range.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    /// Downsample of a level relative to level 0 (1.0 for level 0).
    fn level_downsample(&self, level: usize) -> Option<f64>;

    /// Objective magnification at which level 0 was scanned.
    ///
    /// Fails with [`SlideError::MissingMagnification`] when the slide does not
    /// record one.
    fn objective_magnification(&self) -> Result<f64, SlideError>;

    /// Read `size` pixels at `level`, starting at `origin` given in level-0
    /// coordinates.
    ///
    /// Pixels outside the level are filled with [`BACKGROUND`].
    async fn read_region(
        &self,
        level: usize,
        origin: (u64, u64),
        size: (u32, u32),
    ) -> Result<RgbImage, SlideError>;

    /// Whole-slide image scaled to exactly `size`.
    async fn thumbnail(&self, size: (u32, u32)) -> Result<RgbImage, SlideError>;
}

/// Opens independent [`SlideHandle`]s from a path.
#[async_trait]
pub trait SlideOpener: Send + Sync {
    type Handle: SlideHandle + 'static;

    async fn open(&self, path: &Path) -> Result<Self::Handle, SlideError>;
}
