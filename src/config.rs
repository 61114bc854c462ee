//! Configuration management for WSI Tiler.
//!
//! Every option can be given on the command line or through an environment
//! variable with the `WSI_TILER_` prefix, for example:
//!
//! - `WSI_TILER_OUTPUT_PATH` - Output root directory
//! - `WSI_TILER_TILE_SIZE` - Output tile side in pixels (default: 256)
//! - `WSI_TILER_NUM_WORKERS` - Crop workers per tier (default: 4)
//! - `WSI_TILER_TIERS` - Tier set (default: `40:Large,20:Medium,10:Small,5:Overview,2.5:Minimum`)
//! - `WSI_TILER_JPEG_QUALITY` - Output JPEG quality (default: 80)

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::slide::{TiffSlideOptions, DEFAULT_TILE_CACHE_CAPACITY};
use crate::tile::{is_valid_quality, JpegTileEncoder, DEFAULT_JPEG_QUALITY};
use crate::tiling::{
    AcceptancePolicy, BackgroundFilter, OverviewGenerator, TierSet, TilingSettings,
    DEFAULT_BACKGROUND_RATIO, DEFAULT_BACKGROUND_THRESHOLD, DEFAULT_MIN_TILE_KB,
    DEFAULT_NUM_WORKERS, DEFAULT_OVERVIEW_MAGNIFICATION, DEFAULT_TIERS, DEFAULT_TILE_SIZE,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// WSI Tiler - extract multi-magnification tile pyramids from Whole Slide Images.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Tile one slide or every slide in a directory.
    Tile(TileConfig),

    /// Show levels and tier resolutions of a slide without writing anything.
    Inspect(InspectConfig),
}

// =============================================================================
// Tile Command
// =============================================================================

#[derive(Parser, Debug, Clone)]
pub struct TileConfig {
    // =========================================================================
    // Input / Output
    // =========================================================================
    /// Slide file to tile.
    #[arg(long, env = "WSI_TILER_SLIDE_FILE", conflicts_with = "input_dir")]
    pub slide_file: Option<PathBuf>,

    /// Directory of slides to tile one after another.
    #[arg(long, env = "WSI_TILER_INPUT_DIR")]
    pub input_dir: Option<PathBuf>,

    /// Also scan one level of sub-folders of the input directory.
    #[arg(long, default_value_t = false, env = "WSI_TILER_RECURSIVE")]
    pub recursive: bool,

    /// Output root; each slide gets its own sub-directory.
    #[arg(long, env = "WSI_TILER_OUTPUT_PATH")]
    pub output_path: PathBuf,

    // =========================================================================
    // Grid
    // =========================================================================
    /// Output tile side in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "WSI_TILER_TILE_SIZE")]
    pub tile_size: u32,

    /// Overlap between neighbouring tiles in output pixels.
    #[arg(long, default_value_t = 0, env = "WSI_TILER_OVERLAP")]
    pub overlap: u32,

    /// Comma-separated `magnification:Name` pairs.
    #[arg(long, default_value = DEFAULT_TIERS, env = "WSI_TILER_TIERS")]
    pub tiers: String,

    /// Objective magnification to use instead of the slide metadata.
    #[arg(long, env = "WSI_TILER_OBJECTIVE_POWER")]
    pub objective_power: Option<f64>,

    // =========================================================================
    // Workers
    // =========================================================================
    /// Crop workers per tier.
    #[arg(long, default_value_t = DEFAULT_NUM_WORKERS, env = "WSI_TILER_NUM_WORKERS")]
    pub num_workers: usize,

    /// Decoded native tiles cached per slide handle.
    #[arg(long, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "WSI_TILER_TILE_CACHE")]
    pub tile_cache: usize,

    // =========================================================================
    // Output Encoding and Filtering
    // =========================================================================
    /// JPEG quality for written tiles (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY, env = "WSI_TILER_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// A pixel is background when every channel is above this value.
    #[arg(long, default_value_t = DEFAULT_BACKGROUND_THRESHOLD, env = "WSI_TILER_BACKGROUND_THRESHOLD")]
    pub background_threshold: u8,

    /// Tiles with a larger background fraction are dropped.
    #[arg(long, default_value_t = DEFAULT_BACKGROUND_RATIO, env = "WSI_TILER_BACKGROUND_RATIO")]
    pub background_ratio: f64,

    /// Tiles encoding to fewer KiB are dropped.
    #[arg(long, default_value_t = DEFAULT_MIN_TILE_KB, env = "WSI_TILER_MIN_TILE_KB")]
    pub min_tile_kb: usize,

    /// Keep tiles regardless of background fraction.
    #[arg(long, default_value_t = false, env = "WSI_TILER_NO_BACKGROUND_FILTER")]
    pub no_background_filter: bool,

    /// Keep tiles regardless of encoded size.
    #[arg(long, default_value_t = false, env = "WSI_TILER_NO_SIZE_FILTER")]
    pub no_size_filter: bool,

    // =========================================================================
    // Overview
    // =========================================================================
    /// Magnification of the overview image.
    #[arg(long, default_value_t = DEFAULT_OVERVIEW_MAGNIFICATION, env = "WSI_TILER_OVERVIEW_MAGNIFICATION")]
    pub overview_magnification: f64,

    /// Do not write Overview.jpg.
    #[arg(long, default_value_t = false, env = "WSI_TILER_SKIP_OVERVIEW")]
    pub skip_overview: bool,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl TileConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.slide_file.is_none() && self.input_dir.is_none() {
            return Err(
                "No input given. Set --slide-file or --input-dir (WSI_TILER_SLIDE_FILE / WSI_TILER_INPUT_DIR)"
                    .to_string(),
            );
        }

        validate_grid(self.tile_size, self.overlap)?;

        if self.num_workers == 0 {
            return Err("num_workers must be greater than 0".to_string());
        }
        if self.tile_cache == 0 {
            return Err("tile_cache must be greater than 0".to_string());
        }

        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if !(0.0..=1.0).contains(&self.background_ratio) {
            return Err("background_ratio must be between 0 and 1".to_string());
        }

        if !self.overview_magnification.is_finite() || self.overview_magnification <= 0.0 {
            return Err("overview_magnification must be positive".to_string());
        }

        validate_objective(self.objective_power)?;
        self.tier_set()?;

        Ok(())
    }

    pub fn tier_set(&self) -> Result<TierSet, String> {
        self.tiers.parse()
    }

    pub fn policy(&self) -> AcceptancePolicy {
        AcceptancePolicy {
            background: (!self.no_background_filter).then_some(BackgroundFilter {
                pixel_threshold: self.background_threshold,
                max_ratio: self.background_ratio,
            }),
            min_encoded_bytes: (!self.no_size_filter).then_some(self.min_tile_kb * 1024),
        }
    }

    /// Settings for the orchestrator (call validate() first).
    pub fn tiling_settings(&self) -> Result<TilingSettings, String> {
        let encoder = JpegTileEncoder::new(self.jpeg_quality);
        Ok(TilingSettings {
            tile_size: self.tile_size,
            overlap: self.overlap,
            workers: self.num_workers,
            tiers: self.tier_set()?,
            policy: self.policy(),
            encoder,
            overview: (!self.skip_overview).then_some(OverviewGenerator {
                magnification: self.overview_magnification,
                encoder,
            }),
        })
    }

    pub fn slide_options(&self) -> TiffSlideOptions {
        TiffSlideOptions {
            objective_override: self.objective_power,
            tile_cache_capacity: self.tile_cache,
        }
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

/// Output format for the inspect command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InspectFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug, Clone)]
pub struct InspectConfig {
    /// Slide file to inspect.
    #[arg(long, env = "WSI_TILER_SLIDE_FILE")]
    pub slide_file: PathBuf,

    /// Output tile side in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "WSI_TILER_TILE_SIZE")]
    pub tile_size: u32,

    /// Overlap between neighbouring tiles in output pixels.
    #[arg(long, default_value_t = 0, env = "WSI_TILER_OVERLAP")]
    pub overlap: u32,

    /// Comma-separated `magnification:Name` pairs.
    #[arg(long, default_value = DEFAULT_TIERS, env = "WSI_TILER_TIERS")]
    pub tiers: String,

    /// Objective magnification to use instead of the slide metadata.
    #[arg(long, env = "WSI_TILER_OBJECTIVE_POWER")]
    pub objective_power: Option<f64>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = InspectFormat::Text)]
    pub format: InspectFormat,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_grid(self.tile_size, self.overlap)?;
        validate_objective(self.objective_power)?;
        self.tier_set()?;
        Ok(())
    }

    pub fn tier_set(&self) -> Result<TierSet, String> {
        self.tiers.parse()
    }

    pub fn slide_options(&self) -> TiffSlideOptions {
        TiffSlideOptions {
            objective_override: self.objective_power,
            ..TiffSlideOptions::default()
        }
    }
}

fn validate_grid(tile_size: u32, overlap: u32) -> Result<(), String> {
    if tile_size == 0 {
        return Err("tile_size must be greater than 0".to_string());
    }
    if overlap >= tile_size {
        return Err(format!(
            "overlap ({overlap}) must be smaller than tile_size ({tile_size})"
        ));
    }
    Ok(())
}

fn validate_objective(objective: Option<f64>) -> Result<(), String> {
    match objective {
        Some(power) if !power.is_finite() || power <= 0.0 => {
            Err("objective_power must be positive".to_string())
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Tests
// =============================================================================
