//! WSI Tiler - extract multi-magnification tile pyramids from Whole Slide Images.
//!
//! This binary parses the command line, sets up logging and drives the tiling
//! orchestrator.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wsi_tiler::{
    config::{Cli, Command, InspectConfig, InspectFormat, TileConfig},
    slide::{SlideHandle, TiffSlide, TiffSlideOpener},
    tiling::{
        format_magnification, list_slides, plan_slide, slide_id, slide_label, BatchReport,
        SlidePlan, TierOutcome, TilingOrchestrator,
    },
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Tile(config) => run_tile(config).await,
        Command::Inspect(config) => run_inspect(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "wsi_tiler=debug"
    } else {
        "wsi_tiler=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Tile Command
// =============================================================================

async fn run_tile(config: TileConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let settings = match config.tiling_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let slides = match (&config.slide_file, &config.input_dir) {
        (Some(file), _) => vec![file.clone()],
        (None, Some(dir)) => match list_slides(dir, config.recursive) {
            Ok(slides) => slides,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        (None, None) => {
            error!("No input given");
            return ExitCode::FAILURE;
        }
    };

    if slides.is_empty() {
        warn!("No slides found");
        return ExitCode::SUCCESS;
    }

    info!("Configuration:");
    info!("  Slides: {}", slides.len());
    info!("  Output: {}", config.output_path.display());
    info!(
        "  Tiles: {}px, overlap {}, quality {}",
        settings.tile_size,
        settings.overlap,
        settings.encoder.quality()
    );
    info!(
        "  Tiers: {}",
        settings
            .tiers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("  Workers: {}", settings.workers);

    let orchestrator = TilingOrchestrator::new(TiffSlideOpener::new(config.slide_options()), settings);
    let report = orchestrator.run_batch(&slides, &config.output_path).await;

    log_summary(&report);

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn log_summary(report: &BatchReport) {
    for slide in &report.completed {
        info!(
            slide = %slide.slide_id,
            label = ?slide.label,
            accepted = slide.accepted(),
            overview = slide.overview.is_some(),
            "Slide summary"
        );
        for tier in &slide.tiers {
            match &tier.outcome {
                TierOutcome::Completed {
                    rows, cols, counts, ..
                } => info!(
                    "  {:<10} {}x{} grid, {} accepted, {} rejected, {} failed",
                    tier.name, rows, cols, counts.accepted, counts.rejected, counts.failed
                ),
                TierOutcome::Skipped { reason } => {
                    info!("  {:<10} skipped: {}", tier.name, reason)
                }
                TierOutcome::Failed { reason } => {
                    warn!("  {:<10} failed: {}", tier.name, reason)
                }
            }
        }
    }

    if !report.failed.is_empty() {
        error!("{} slide(s) failed:", report.failed.len());
        for failed in &report.failed {
            error!("  {}: {}", failed.slide_path.display(), failed.error);
        }
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

async fn run_inspect(config: InspectConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let tiers = match config.tier_set() {
        Ok(tiers) => tiers,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let id = match slide_id(&config.slide_file) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let slide = match TiffSlide::open(&config.slide_file, config.slide_options()).await {
        Ok(slide) => slide,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let plan = match plan_slide(&slide, &tiers, config.tile_size, config.overlap) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match config.format {
        InspectFormat::Json => {
            let json = serde_json::json!({
                "slide_id": id,
                "label": slide_label(&id),
                "format": slide.format(),
                "mpp": slide.metadata().mpp,
                "level_count": slide.level_count(),
                "plan": plan,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        InspectFormat::Text => print_plan(&id, &slide, &plan),
    }

    ExitCode::SUCCESS
}

fn print_plan(id: &str, slide: &TiffSlide, plan: &SlidePlan) {
    println!("Slide: {} ({})", id, slide.format().name());
    if let Some(label) = slide_label(id) {
        println!("Label: {:?} (class {})", label, label.class_index());
    }
    println!("Objective: {}x", format_magnification(plan.objective));
    if let Some(mpp) = slide.metadata().mpp {
        println!("MPP: {}", mpp);
    }
    println!();

    println!("Levels:");
    for level in &plan.levels {
        println!(
            "  {:>2}  {:>7} x {:<7}  downsample {:>8.3}  {}x",
            level.native.level,
            level.width,
            level.height,
            level.native.downsample,
            format_magnification(level.native.magnification)
        );
    }
    println!();

    println!("Tiers:");
    for tier in &plan.tiers {
        let label = format!("{} ({}x)", tier.name, format_magnification(tier.magnification));
        match (&tier.resolution, &tier.note) {
            (Some(resolution), None) => println!(
                "  {:<20} level {}, read {}px, scale {}, {} x {} tiles",
                label,
                resolution.level(),
                resolution.read_size(),
                resolution.scale(),
                tier.rows,
                tier.cols
            ),
            (_, Some(note)) => println!("  {:<20} skipped: {}", label, note),
            (None, None) => println!("  {:<20} skipped", label),
        }
    }
}
