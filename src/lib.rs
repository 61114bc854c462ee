//! # WSI Tiler
//!
//! Extracts multi-magnification tile pyramids from Whole Slide Images (WSI)
//! for machine-learning pipelines.
//!
//! For each slide, tiles are written at a fixed set of canonical
//! magnifications (40x, 20x, 10x, 5x, 2.5x by default), whatever levels the
//! slide actually stores. Tiers the slide does not store natively are
//! synthesized by cropping a larger region at a higher-magnification level and
//! scaling it down. Background and near-uniform tiles are dropped. Each tier
//! gets a small manifest, and each slide gets one overview image.
//!
//! ## Architecture
//!
//! - [`io`] - Range-based I/O over local slide files
//! - [`mod@format`] - TIFF/SVS parsers and JPEG handling
//! - [`slide`] - Slide handle abstraction and the TIFF-backed decoder
//! - [`tile`] - Output tile encoding
//! - [`tiling`] - Magnification resolution, grids, workers, manifests
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wsi_tiler::{TiffSlideOpener, TiffSlideOptions, TilingOrchestrator, TilingSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let opener = TiffSlideOpener::new(TiffSlideOptions::default());
//!     let orchestrator = TilingOrchestrator::new(opener, TilingSettings::default());
//!
//!     let report = orchestrator
//!         .run(Path::new("slides/TCGA-01.svs"), Path::new("tiles"))
//!         .await
//!         .unwrap();
//!     println!("{} tiles written", report.accepted());
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod slide;
pub mod tile;
pub mod tiling;

// Re-export commonly used types
pub use config::{Cli, Command, InspectConfig, InspectFormat, TileConfig};
pub use error::{FormatError, IoError, SlideError, TierError, TiffError, TileError, TilingError};
pub use format::tiff::{TiffPyramid, TileData};
pub use format::{detect_format, is_tiff_header, SlideFormat, SvsMetadata};
pub use io::{LocalFileReader, RangeReader};
pub use slide::{SlideHandle, SlideOpener, TiffSlide, TiffSlideOpener, TiffSlideOptions};
pub use tile::{JpegTileEncoder, DEFAULT_JPEG_QUALITY};
pub use tiling::{
    AcceptancePolicy, BatchReport, CanonicalTier, LevelManifest, MagnificationResolver,
    SlideLabel, SlideReport, TierOutcome, TierResolution, TierSet, TileGrid, TilingOrchestrator,
    TilingSettings,
};
