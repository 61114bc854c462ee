//! Whole-slide overview image.
//!
//! One low-resolution JPEG per slide, at the overview magnification (5x by
//! default): level-0 dimensions divided by `objective / magnification`.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::debug;

use crate::error::{SlideError, TileError};
use crate::slide::SlideHandle;
use crate::tile::JpegTileEncoder;

/// Default overview magnification.
pub const DEFAULT_OVERVIEW_MAGNIFICATION: f64 = 5.0;

/// File name of the overview inside the slide output directory.
pub const OVERVIEW_FILE_NAME: &str = "Overview.jpg";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverviewGenerator {
    pub magnification: f64,
    pub encoder: JpegTileEncoder,
}

impl Default for OverviewGenerator {
    fn default() -> Self {
        Self {
            magnification: DEFAULT_OVERVIEW_MAGNIFICATION,
            encoder: JpegTileEncoder::default(),
        }
    }
}

impl OverviewGenerator {
    /// Overview size for a slide of `base` dimensions scanned at `objective`.
    ///
    /// Slides scanned below the overview magnification are not upsampled.
    pub fn target_size(&self, base: (u32, u32), objective: f64) -> (u32, u32) {
        let factor = (objective / self.magnification).max(1.0);
        let scale = |d: u32| ((d as f64 / factor) as u32).max(1);
        (scale(base.0), scale(base.1))
    }

    pub async fn generate<S: SlideHandle + ?Sized>(&self, slide: &S) -> Result<RgbImage, SlideError> {
        let objective = slide.objective_magnification()?;
        let base = slide.level_dimensions(0).ok_or(SlideError::InvalidLevel {
            level: 0,
            level_count: slide.level_count(),
        })?;
        let size = self.target_size(base, objective);
        debug!(width = size.0, height = size.1, "Generating overview");
        slide.thumbnail(size).await
    }

    /// Generate the overview and write it as `Overview.jpg` under `output_dir`.
    pub async fn write<S: SlideHandle + ?Sized>(
        &self,
        slide: &S,
        output_dir: &Path,
    ) -> Result<PathBuf, TileError> {
        let thumbnail = self.generate(slide).await?;
        let path = output_dir.join(OVERVIEW_FILE_NAME);

        let encoder = self.encoder;
        let target = path.clone();
        tokio::task::spawn_blocking(move || encoder.save(&thumbnail, &target))
            .await
            .map_err(|e| TileError::Task(e.to_string()))??;

        Ok(path)
    }
}
