//! Parallel crop/filter/write workers.
//!
//! The grid is split once into contiguous shards, one per worker. Every
//! worker opens its own slide handle and walks its shard in order: read the
//! region, scale it to the output size, apply the acceptance policy and write
//! accepted tiles. Pixel work and file writes run on the blocking pool.
//!
//! A failure on one tile is logged and counted; the worker moves on. Workers
//! only hand back their counts, which are summed once every worker is done.

use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, trace, warn};

use crate::error::TileError;
use crate::slide::{SlideHandle, SlideOpener};
use crate::tile::{write_file, JpegTileEncoder};

use super::grid::{TileGrid, TileOrigin};
use super::policy::{AcceptancePolicy, Decision};
use super::resolver::TierResolution;

/// Default number of crop workers.
pub const DEFAULT_NUM_WORKERS: usize = 4;

/// Per-tier tile counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolCounts {
    pub planned: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl AddAssign for PoolCounts {
    fn add_assign(&mut self, other: Self) {
        self.planned += other.planned;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.failed += other.failed;
    }
}

/// What happened to a single tile that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileOutcome {
    Accepted,
    Rejected,
}

/// Everything a worker needs to turn an origin into a file.
struct CropJob {
    slide_path: PathBuf,
    level: usize,
    downsample: f64,
    read_size: u32,
    tile_size: u32,
    save_path: PathBuf,
    policy: AcceptancePolicy,
    encoder: JpegTileEncoder,
}

impl CropJob {
    /// Scale, filter and write one region. Runs on the blocking pool.
    fn finish_tile(&self, region: RgbImage, origin: TileOrigin) -> Result<TileOutcome, TileError> {
        let tile = if self.read_size != self.tile_size {
            imageops::resize(&region, self.tile_size, self.tile_size, FilterType::Triangle)
        } else {
            region
        };

        match self.policy.evaluate(&tile, &self.encoder)? {
            Decision::Accept(bytes) => {
                write_file(&self.save_path.join(origin.file_name()), &bytes)?;
                Ok(TileOutcome::Accepted)
            }
            rejection => {
                trace!(row = origin.row, col = origin.col, ?rejection, "Tile rejected");
                Ok(TileOutcome::Rejected)
            }
        }
    }
}

// =============================================================================
// CropWorkerPool
// =============================================================================

/// Runs one tier's grid over a fixed number of workers.
pub struct CropWorkerPool<O> {
    opener: Arc<O>,
    workers: usize,
    policy: AcceptancePolicy,
    encoder: JpegTileEncoder,
}

impl<O: SlideOpener + 'static> CropWorkerPool<O> {
    pub fn new(
        opener: Arc<O>,
        workers: usize,
        policy: AcceptancePolicy,
        encoder: JpegTileEncoder,
    ) -> Self {
        Self {
            opener,
            workers: workers.max(1),
            policy,
            encoder,
        }
    }

    /// Crop every origin of `grid` at the resolved level and write accepted
    /// tiles into `save_path`.
    ///
    /// `downsample` is the resolved level's downsample, used to map grid
    /// origins back to level-0 coordinates.
    pub async fn run(
        &self,
        slide_path: &Path,
        resolution: TierResolution,
        downsample: f64,
        grid: &TileGrid,
        save_path: &Path,
    ) -> PoolCounts {
        let planned = grid.len();
        let mut total = PoolCounts {
            planned,
            ..PoolCounts::default()
        };
        if planned == 0 {
            return total;
        }

        let job = Arc::new(CropJob {
            slide_path: slide_path.to_path_buf(),
            level: resolution.level(),
            downsample,
            read_size: resolution.read_size(),
            tile_size: resolution.read_size() / resolution.scale(),
            save_path: save_path.to_path_buf(),
            policy: self.policy,
            encoder: self.encoder,
        });

        let mut workers = JoinSet::new();
        for (worker, shard) in grid.shards(self.workers).into_iter().enumerate() {
            let opener = Arc::clone(&self.opener);
            let job = Arc::clone(&job);
            let shard = shard.to_vec();
            workers.spawn(async move { run_worker(worker, opener.as_ref(), &job, shard).await });
        }

        // Completion barrier
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(counts) => total += counts,
                Err(e) => warn!(error = %e, "Crop worker aborted"),
            }
        }

        // Tiles of aborted workers were never counted
        let counted = total.accepted + total.rejected + total.failed;
        total.failed += planned.saturating_sub(counted);

        if total.accepted + total.rejected != planned {
            warn!(
                slide = %slide_path.display(),
                planned,
                accepted = total.accepted,
                rejected = total.rejected,
                failed = total.failed,
                "Tile counts do not add up to the planned grid"
            );
        }

        total
    }
}

async fn run_worker<O: SlideOpener>(
    worker: usize,
    opener: &O,
    job: &Arc<CropJob>,
    shard: Vec<TileOrigin>,
) -> PoolCounts {
    let mut counts = PoolCounts::default();

    let handle = match opener.open(&job.slide_path).await {
        Ok(handle) => handle,
        Err(e) => {
            warn!(worker, error = %e, tiles = shard.len(), "Worker could not open slide");
            counts.failed = shard.len();
            return counts;
        }
    };

    debug!(worker, tiles = shard.len(), "Worker started");

    for origin in shard {
        match crop_tile(&handle, job, origin).await {
            Ok(TileOutcome::Accepted) => counts.accepted += 1,
            Ok(TileOutcome::Rejected) => counts.rejected += 1,
            Err(e) => {
                warn!(
                    worker,
                    x = origin.x,
                    y = origin.y,
                    row = origin.row,
                    col = origin.col,
                    error = %e,
                    "Tile failed"
                );
                counts.failed += 1;
            }
        }
    }

    debug!(
        worker,
        accepted = counts.accepted,
        rejected = counts.rejected,
        failed = counts.failed,
        "Worker finished"
    );
    counts
}

async fn crop_tile<H: SlideHandle>(
    handle: &H,
    job: &Arc<CropJob>,
    origin: TileOrigin,
) -> Result<TileOutcome, TileError> {
    let origin0 = (
        (origin.x as f64 * job.downsample).round() as u64,
        (origin.y as f64 * job.downsample).round() as u64,
    );
    let region = handle
        .read_region(job.level, origin0, (job.read_size, job.read_size))
        .await?;

    let job = Arc::clone(job);
    tokio::task::spawn_blocking(move || job.finish_tile(region, origin))
        .await
        .map_err(|e| TileError::Task(e.to_string()))?
}
