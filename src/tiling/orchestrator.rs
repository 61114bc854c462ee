//! Per-slide driver.
//!
//! ```text
//! open ─► overview ─► for each tier: resolve ─┬─► skip
//!                                              └─► plan grid ─► worker pool ─► manifest
//! ```
//!
//! Opening the slide and reading its objective magnification are the only
//! fatal steps. Overview and tier failures are logged and recorded in the
//! report; the remaining tiers still run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{SlideError, TierError, TilingError};
use crate::slide::{SlideHandle, SlideOpener};
use crate::tile::JpegTileEncoder;

use super::grid::TileGrid;
use super::label::slide_label;
use super::manifest::LevelManifest;
use super::overview::OverviewGenerator;
use super::policy::AcceptancePolicy;
use super::pool::{CropWorkerPool, DEFAULT_NUM_WORKERS};
use super::report::{BatchReport, FailedSlide, SlideReport, TierOutcome, TierReport};
use super::resolver::{MagnificationResolver, NativeLevel, TierResolution};
use super::tiers::{format_magnification, CanonicalTier, TierSet};

/// Default output tile side in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

// =============================================================================
// Settings
// =============================================================================

/// Fixed parameters of a tiling run.
#[derive(Debug, Clone, PartialEq)]
pub struct TilingSettings {
    pub tile_size: u32,
    pub overlap: u32,
    pub workers: usize,
    pub tiers: TierSet,
    pub policy: AcceptancePolicy,
    pub encoder: JpegTileEncoder,

    /// `None` skips the overview
    pub overview: Option<OverviewGenerator>,
}

impl Default for TilingSettings {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            overlap: 0,
            workers: DEFAULT_NUM_WORKERS,
            tiers: TierSet::default(),
            policy: AcceptancePolicy::default(),
            encoder: JpegTileEncoder::default(),
            overview: Some(OverviewGenerator::default()),
        }
    }
}

/// Slide id used for output directory and manifests: the file stem.
pub fn slide_id(path: &Path) -> Result<String, TilingError> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TilingError::InvalidSlidePath(path.to_path_buf()))
}

// =============================================================================
// Planning (no pixels)
// =============================================================================

/// What a tier would produce, computed from metadata only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierPlan {
    pub name: String,
    pub magnification: f64,
    pub resolution: Option<TierResolution>,
    pub rows: u32,
    pub cols: u32,

    /// Why no resolution is available
    pub note: Option<String>,
}

/// Levels of a slide and the plan for every tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlidePlan {
    pub objective: f64,
    pub levels: Vec<LevelPlan>,
    pub tiers: Vec<TierPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelPlan {
    #[serde(flatten)]
    pub native: NativeLevel,
    pub width: u32,
    pub height: u32,
}

/// Resolve every tier and size its grid without reading any pixels.
pub fn plan_slide<S: SlideHandle + ?Sized>(
    slide: &S,
    tiers: &TierSet,
    tile_size: u32,
    overlap: u32,
) -> Result<SlidePlan, SlideError> {
    let resolver = MagnificationResolver::from_slide(slide)?;
    let level_count = slide.level_count();

    let levels = resolver
        .levels()
        .iter()
        .map(|native| {
            let (width, height) = slide
                .level_dimensions(native.level)
                .ok_or(SlideError::InvalidLevel {
                    level: native.level,
                    level_count,
                })?;
            Ok(LevelPlan {
                native: *native,
                width,
                height,
            })
        })
        .collect::<Result<Vec<_>, SlideError>>()?;

    let tiers = tiers
        .iter()
        .map(|tier| {
            let mut plan = TierPlan {
                name: tier.name.clone(),
                magnification: tier.magnification,
                resolution: None,
                rows: 0,
                cols: 0,
                note: None,
            };
            match resolver.resolve(tier, tile_size) {
                Ok(Some(resolution)) => {
                    let dims = &levels[resolution.level()];
                    match TileGrid::plan(
                        (dims.width, dims.height),
                        resolution.read_size(),
                        overlap * resolution.scale(),
                    ) {
                        Ok(grid) => {
                            plan.rows = grid.rows;
                            plan.cols = grid.cols;
                        }
                        Err(e) => plan.note = Some(e.to_string()),
                    }
                    plan.resolution = Some(resolution);
                }
                Ok(None) => plan.note = Some("above objective magnification".to_string()),
                Err(e) => plan.note = Some(e.to_string()),
            }
            plan
        })
        .collect();

    Ok(SlidePlan {
        objective: resolver.objective(),
        levels,
        tiers,
    })
}

// =============================================================================
// TilingOrchestrator
// =============================================================================

/// Tiles slides tier by tier.
pub struct TilingOrchestrator<O> {
    opener: Arc<O>,
    settings: TilingSettings,
    pool: CropWorkerPool<O>,
}

impl<O: SlideOpener + 'static> TilingOrchestrator<O> {
    pub fn new(opener: O, settings: TilingSettings) -> Self {
        let opener = Arc::new(opener);
        let pool = CropWorkerPool::new(
            Arc::clone(&opener),
            settings.workers,
            settings.policy,
            settings.encoder,
        );
        Self {
            opener,
            settings,
            pool,
        }
    }

    pub fn settings(&self) -> &TilingSettings {
        &self.settings
    }

    /// Tile one slide into `{output_root}/{slide_id}/`.
    pub async fn run(&self, slide_path: &Path, output_root: &Path) -> Result<SlideReport, TilingError> {
        let slide_id = slide_id(slide_path)?;

        let slide = self.opener.open(slide_path).await?;
        let resolver = MagnificationResolver::from_slide(&slide)?;

        info!(
            slide = %slide_id,
            objective = resolver.objective(),
            levels = slide.level_count(),
            "Tiling slide"
        );

        let output_dir = output_root.join(&slide_id);
        std::fs::create_dir_all(&output_dir).map_err(|source| TilingError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let overview = match &self.settings.overview {
            Some(generator) => match generator.write(&slide, &output_dir).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(slide = %slide_id, error = %e, "Overview failed");
                    None
                }
            },
            None => None,
        };

        let mut tiers = Vec::with_capacity(self.settings.tiers.len());
        for tier in &self.settings.tiers {
            let outcome = match self
                .run_tier(&slide, &resolver, &slide_id, slide_path, &output_dir, tier)
                .await
            {
                Ok(outcome) => outcome,
                Err(TierError::NoCandidate { .. }) => {
                    let reason = "no native level to synthesize from".to_string();
                    info!(slide = %slide_id, tier = %tier.name, %reason, "Tier skipped");
                    TierOutcome::Skipped { reason }
                }
                Err(e) => {
                    warn!(slide = %slide_id, tier = %tier.name, error = %e, "Tier failed");
                    TierOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            };

            tiers.push(TierReport {
                name: tier.name.clone(),
                magnification: tier.magnification,
                outcome,
            });
        }

        Ok(SlideReport {
            label: slide_label(&slide_id),
            slide_id,
            slide_path: slide_path.to_path_buf(),
            objective: resolver.objective(),
            output_dir,
            overview,
            tiers,
        })
    }

    async fn run_tier(
        &self,
        slide: &O::Handle,
        resolver: &MagnificationResolver,
        slide_id: &str,
        slide_path: &Path,
        output_dir: &Path,
        tier: &CanonicalTier,
    ) -> Result<TierOutcome, TierError> {
        let Some(resolution) = resolver.resolve(tier, self.settings.tile_size)? else {
            let reason = format!(
                "{}x is above the objective magnification {}x",
                format_magnification(tier.magnification),
                format_magnification(resolver.objective())
            );
            info!(slide = %slide_id, tier = %tier.name, %reason, "Tier skipped");
            return Ok(TierOutcome::Skipped { reason });
        };

        let level = resolution.level();
        let level_count = slide.level_count();
        let invalid = || SlideError::InvalidLevel { level, level_count };
        let dimensions = slide.level_dimensions(level).ok_or_else(invalid)?;
        let downsample = slide.level_downsample(level).ok_or_else(invalid)?;

        let scale = resolution.scale();
        let grid = TileGrid::plan(
            dimensions,
            resolution.read_size(),
            self.settings.overlap * scale,
        )?;

        let tier_dir = output_dir.join(&tier.name);
        std::fs::create_dir_all(&tier_dir).map_err(|source| TierError::CreateDir {
            path: tier_dir.clone(),
            source,
        })?;

        info!(
            slide = %slide_id,
            tier = %tier.name,
            level,
            scale,
            rows = grid.rows,
            cols = grid.cols,
            "Cropping tier"
        );

        let counts = self
            .pool
            .run(slide_path, resolution, downsample, &grid, &tier_dir)
            .await;

        LevelManifest {
            slide_id: slide_id.to_string(),
            objective: tier.magnification,
            tile_size: self.settings.tile_size,
            rows: grid.rows,
            cols: grid.cols,
            height: dimensions.1 / scale,
            width: dimensions.0 / scale,
        }
        .write(&output_dir.join(format!("{}.txt", tier.name)))?;

        info!(
            slide = %slide_id,
            tier = %tier.name,
            planned = counts.planned,
            accepted = counts.accepted,
            rejected = counts.rejected,
            failed = counts.failed,
            "Tier done"
        );

        Ok(TierOutcome::Completed {
            resolution,
            rows: grid.rows,
            cols: grid.cols,
            counts,
        })
    }

    /// Tile slides one after another. A fatal error on one slide is logged
    /// and the batch moves on.
    pub async fn run_batch(&self, slides: &[PathBuf], output_root: &Path) -> BatchReport {
        let mut report = BatchReport::default();

        for (i, path) in slides.iter().enumerate() {
            info!(index = i + 1, total = slides.len(), path = %path.display(), "Processing slide");
            match self.run(path, output_root).await {
                Ok(slide) => report.completed.push(slide),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Slide failed");
                    report.failed.push(FailedSlide {
                        slide_path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
