//! Tile-pyramid extraction.
//!
//! ```text
//! TierSet ──► MagnificationResolver ──► TileGrid ──► CropWorkerPool ──► {tier}/{row}_{col}.jpg
//!                                                        │
//!                                                AcceptancePolicy
//! ```
//!
//! [`TilingOrchestrator`] drives one slide at a time: the overview, then each
//! canonical tier in order, then a [`LevelManifest`] per produced tier.

mod discovery;
mod grid;
mod label;
mod manifest;
mod orchestrator;
mod overview;
mod policy;
mod pool;
mod report;
mod resolver;
mod tiers;

pub use discovery::{has_slide_extension, list_slides, SLIDE_EXTENSIONS};
pub use grid::{TileGrid, TileOrigin};
pub use label::{slide_label, SlideLabel};
pub use manifest::LevelManifest;
pub use orchestrator::{
    plan_slide, slide_id, LevelPlan, SlidePlan, TierPlan, TilingOrchestrator, TilingSettings,
    DEFAULT_TILE_SIZE,
};
pub use overview::{OverviewGenerator, DEFAULT_OVERVIEW_MAGNIFICATION, OVERVIEW_FILE_NAME};
pub use policy::{
    AcceptancePolicy, BackgroundFilter, Decision, DEFAULT_BACKGROUND_RATIO,
    DEFAULT_BACKGROUND_THRESHOLD, DEFAULT_MIN_TILE_KB,
};
pub use pool::{CropWorkerPool, PoolCounts, DEFAULT_NUM_WORKERS};
pub use report::{BatchReport, FailedSlide, SlideReport, TierOutcome, TierReport};
pub use resolver::{MagnificationResolver, NativeLevel, TierResolution};
pub use tiers::{format_magnification, CanonicalTier, TierSet, DEFAULT_TIERS};
