//! End-to-end tiling tests over synthetic slides.
//!
//! The reference slide is 2048x1024 at 40x with levels at downsample 1, 4
//! and 16 (40x, 10x, 2.5x). Tissue covers the left half.

use std::path::{Path, PathBuf};

use wsi_tiler::error::{SlideError, TilingError};
use wsi_tiler::tiling::{
    plan_slide, AcceptancePolicy, BackgroundFilter, TierOutcome, TierResolution,
    SlideLabel, TilingOrchestrator, TilingSettings, OVERVIEW_FILE_NAME,
};

use super::test_utils::{jpeg_dimensions, tile_names, SyntheticOpener, SyntheticSlide};

fn reference_slide() -> SyntheticSlide {
    SyntheticSlide::new((2048, 1024), &[1, 4, 16], Some(40.0))
}

fn settings(tiers: &str) -> TilingSettings {
    TilingSettings {
        tile_size: 128,
        workers: 3,
        tiers: tiers.parse().unwrap(),
        policy: AcceptancePolicy {
            background: Some(BackgroundFilter::default()),
            min_encoded_bytes: None,
        },
        ..TilingSettings::default()
    }
}

fn slide_path() -> PathBuf {
    PathBuf::from("/slides/case-01.svs")
}

fn read_manifest(dir: &Path, tier: &str) -> Vec<String> {
    std::fs::read_to_string(dir.join(format!("{tier}.txt")))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

// =============================================================================
// Full Run
// =============================================================================

#[tokio::test]
async fn test_default_tiers_over_reference_slide() {
    let out = tempfile::tempdir().unwrap();
    let orchestrator = TilingOrchestrator::new(
        SyntheticOpener::new(reference_slide()),
        settings("40:Large,20:Medium,10:Small,5:Overview,2.5:Minimum"),
    );

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let slide_dir = out.path().join("case-01");

    assert_eq!(report.slide_id, "case-01");
    assert_eq!(report.label, None);
    assert_eq!(report.objective, 40.0);
    assert_eq!(report.output_dir, slide_dir);
    assert_eq!(report.tiers.len(), 5);

    // 40x is stored natively: 16 x 8 grid, left half is tissue
    let large = report.tier("Large").unwrap();
    assert!(matches!(
        large.outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Direct { level: 0, tile_size: 128 },
            rows: 8,
            cols: 16,
            ..
        }
    ));
    let counts = large.counts().unwrap();
    assert_eq!((counts.planned, counts.accepted, counts.rejected, counts.failed), (128, 64, 64, 0));

    // 20x is synthesized from 40x with 256px reads
    let medium = report.tier("Medium").unwrap();
    assert!(matches!(
        medium.outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Synthesized {
                level: 0,
                oversized_tile_size: 256,
                scale: 2
            },
            rows: 4,
            cols: 8,
            ..
        }
    ));
    assert_eq!(medium.counts().unwrap().accepted, 16);

    // 10x is level 1
    let small = report.tier("Small").unwrap();
    assert!(matches!(
        small.outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Direct { level: 1, .. },
            ..
        }
    ));
    assert_eq!(small.counts().unwrap().accepted, 4);

    // 5x comes from 10x, not 40x
    let overview = report.tier("Overview").unwrap();
    assert!(matches!(
        overview.outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Synthesized { level: 1, scale: 2, .. },
            rows: 1,
            cols: 2,
            ..
        }
    ));
    assert_eq!(overview.counts().unwrap().accepted, 1);

    // 2.5x level is 128x64, smaller than one tile
    let minimum = report.tier("Minimum").unwrap();
    assert_eq!(minimum.counts().unwrap().planned, 0);
    assert!(slide_dir.join("Minimum.txt").exists());

    assert_eq!(report.accepted(), 64 + 16 + 4 + 1);
}

#[tokio::test]
async fn test_tile_files_and_sizes() {
    let out = tempfile::tempdir().unwrap();
    let orchestrator = TilingOrchestrator::new(
        SyntheticOpener::new(reference_slide()),
        settings("40:Large,20:Medium"),
    );
    orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let slide_dir = out.path().join("case-01");

    let large = tile_names(&slide_dir.join("Large"));
    assert_eq!(large.len(), 64);
    assert!(large.contains(&"0000_0000.jpg".to_string()));
    assert!(large.contains(&"0007_0007.jpg".to_string()));
    assert!(!large.contains(&"0000_0008.jpg".to_string()));

    // Synthesized tiles are scaled down to the output size
    assert_eq!(
        jpeg_dimensions(&slide_dir.join("Medium").join("0003_0003.jpg")),
        Some((128, 128))
    );
    assert_eq!(
        jpeg_dimensions(&slide_dir.join("Large").join("0002_0005.jpg")),
        Some((128, 128))
    );
}

#[tokio::test]
async fn test_manifest_contents() {
    let out = tempfile::tempdir().unwrap();
    let orchestrator = TilingOrchestrator::new(
        SyntheticOpener::new(reference_slide()),
        settings("20:Medium,2.5:Minimum"),
    );
    orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let slide_dir = out.path().join("case-01");

    assert_eq!(
        read_manifest(&slide_dir, "Medium"),
        vec![
            "slideId: case-01",
            "Objective: 20.0",
            "Patch_size: 128",
            "rows: 4",
            "cols: 8",
            "height: 512",
            "width: 1024",
        ]
    );
    assert_eq!(read_manifest(&slide_dir, "Minimum")[1], "Objective: 2.5");
}

#[tokio::test]
async fn test_overview_written() {
    let out = tempfile::tempdir().unwrap();
    let orchestrator =
        TilingOrchestrator::new(SyntheticOpener::new(reference_slide()), settings("40:Large"));

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let path = out.path().join("case-01").join(OVERVIEW_FILE_NAME);

    assert_eq!(report.overview.as_deref(), Some(path.as_path()));
    // 40x / 5x = 8
    assert_eq!(jpeg_dimensions(&path), Some((256, 128)));
}

#[tokio::test]
async fn test_skip_overview() {
    let out = tempfile::tempdir().unwrap();
    let mut settings = settings("40:Large");
    settings.overview = None;
    let orchestrator = TilingOrchestrator::new(SyntheticOpener::new(reference_slide()), settings);

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();
    assert!(report.overview.is_none());
    assert!(!out.path().join("case-01").join(OVERVIEW_FILE_NAME).exists());
}

#[tokio::test]
async fn test_one_read_per_planned_tile() {
    let out = tempfile::tempdir().unwrap();
    let slide = reference_slide();
    let tiers = "40:Large,20:Medium".parse().unwrap();

    let plan = plan_slide(&slide, &tiers, 128, 0).unwrap();
    assert_eq!(slide.reads(), 0);
    let planned: u32 = plan.tiers.iter().map(|t| t.rows * t.cols).sum();
    assert_eq!(planned, 128 + 32);

    let mut settings = settings("40:Large,20:Medium");
    settings.overview = None;
    let orchestrator = TilingOrchestrator::new(SyntheticOpener::new(slide.clone()), settings);
    orchestrator.run(&slide_path(), out.path()).await.unwrap();

    assert_eq!(slide.reads(), planned as usize);
}

// =============================================================================
// Skips and Failures
// =============================================================================

#[tokio::test]
async fn test_tier_above_objective_is_skipped() {
    let out = tempfile::tempdir().unwrap();
    let slide = SyntheticSlide::new((1024, 512), &[1, 4], Some(20.0));
    let orchestrator =
        TilingOrchestrator::new(SyntheticOpener::new(slide), settings("40:Large,20:Medium"));

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let slide_dir = out.path().join("case-01");

    assert!(matches!(
        report.tier("Large").unwrap().outcome,
        TierOutcome::Skipped { .. }
    ));
    assert!(!slide_dir.join("Large").exists());
    assert!(!slide_dir.join("Large.txt").exists());

    assert!(matches!(
        report.tier("Medium").unwrap().outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Direct { level: 0, .. },
            ..
        }
    ));
    assert!(slide_dir.join("Medium.txt").exists());
}

#[tokio::test]
async fn test_missing_objective_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    let slide = SyntheticSlide::new((1024, 512), &[1, 4], None);
    let orchestrator = TilingOrchestrator::new(SyntheticOpener::new(slide), settings("40:Large"));

    let result = orchestrator.run(&slide_path(), out.path()).await;
    assert!(matches!(
        result,
        Err(TilingError::Slide(SlideError::MissingMagnification(_)))
    ));
    assert!(!out.path().join("case-01").exists());
}

#[tokio::test]
async fn test_non_finite_objective_is_fatal() {
    for objective in [f64::INFINITY, f64::NAN, 0.0] {
        let out = tempfile::tempdir().unwrap();
        let slide = SyntheticSlide::new((1024, 512), &[1, 4], Some(objective));
        let orchestrator =
            TilingOrchestrator::new(SyntheticOpener::new(slide), settings("40:Large"));

        let result = orchestrator.run(&slide_path(), out.path()).await;
        assert!(
            matches!(
                result,
                Err(TilingError::Slide(SlideError::InvalidMagnification(_)))
            ),
            "objective {objective}"
        );
        assert!(!out.path().join("case-01").exists());
    }
}

#[tokio::test]
async fn test_failed_read_skips_only_that_tile() {
    let out = tempfile::tempdir().unwrap();
    let slide = reference_slide().with_failing_read((0, 0));
    let orchestrator = TilingOrchestrator::new(SyntheticOpener::new(slide), settings("40:Large"));

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let counts = report.tier("Large").unwrap().counts().unwrap();
    assert_eq!((counts.accepted, counts.rejected, counts.failed), (63, 64, 1));

    let large = tile_names(&out.path().join("case-01").join("Large"));
    assert!(!large.contains(&"0000_0000.jpg".to_string()));
    assert!(large.contains(&"0000_0001.jpg".to_string()));
}

#[tokio::test]
async fn test_worker_open_failure_counts_tiles_as_failed() {
    let out = tempfile::tempdir().unwrap();
    // The orchestrator's own open succeeds, every worker open fails
    let opener = SyntheticOpener::new(reference_slide()).with_open_limit(1);
    let orchestrator = TilingOrchestrator::new(opener, settings("40:Large"));

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let counts = report.tier("Large").unwrap().counts().unwrap();
    assert_eq!((counts.planned, counts.accepted, counts.failed), (128, 0, 128));
    assert!(out.path().join("case-01").join("Large.txt").exists());
}

// =============================================================================
// Grid Options
// =============================================================================

#[tokio::test]
async fn test_overlap_direct_and_synthesized() {
    let out = tempfile::tempdir().unwrap();
    let mut settings = settings("40:Large,20:Medium");
    settings.overlap = 32;
    let orchestrator = TilingOrchestrator::new(SyntheticOpener::new(reference_slide()), settings);

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();

    // Step 96 over 2048x1024
    assert!(matches!(
        report.tier("Large").unwrap().outcome,
        TierOutcome::Completed { rows: 10, cols: 21, .. }
    ));
    // Overlap scales with the read size: 256px reads, step 192
    assert!(matches!(
        report.tier("Medium").unwrap().outcome,
        TierOutcome::Completed { rows: 5, cols: 10, .. }
    ));
}

#[tokio::test]
async fn test_worker_count_does_not_change_output() {
    let mut outputs = Vec::new();
    for workers in [1, 7] {
        let out = tempfile::tempdir().unwrap();
        let mut settings = settings("40:Large,20:Medium");
        settings.workers = workers;
        let orchestrator =
            TilingOrchestrator::new(SyntheticOpener::new(reference_slide()), settings);
        orchestrator.run(&slide_path(), out.path()).await.unwrap();

        let slide_dir = out.path().join("case-01");
        outputs.push((
            tile_names(&slide_dir.join("Large")),
            tile_names(&slide_dir.join("Medium")),
            read_manifest(&slide_dir, "Large"),
        ));
    }

    assert_eq!(outputs[0], outputs[1]);
}

#[tokio::test]
async fn test_rerun_overwrites() {
    let out = tempfile::tempdir().unwrap();
    let orchestrator =
        TilingOrchestrator::new(SyntheticOpener::new(reference_slide()), settings("10:Small"));

    let first = orchestrator.run(&slide_path(), out.path()).await.unwrap();
    let second = orchestrator.run(&slide_path(), out.path()).await.unwrap();

    assert_eq!(first.tiers, second.tiers);
    let slide_dir = out.path().join("case-01");
    assert_eq!(tile_names(&slide_dir.join("Small")).len(), 4);
    assert_eq!(read_manifest(&slide_dir, "Small").len(), 7);
}

// =============================================================================
// Batch
// =============================================================================

#[tokio::test]
async fn test_batch_continues_after_failed_slide() {
    let out = tempfile::tempdir().unwrap();
    let slides = vec![
        PathBuf::from("/slides/a.svs"),
        PathBuf::from("/slides/b.svs"),
        PathBuf::from("/slides/c.svs"),
    ];
    let opener = SyntheticOpener::new(reference_slide()).with_missing("/slides/b.svs");
    let orchestrator = TilingOrchestrator::new(opener, settings("10:Small"));

    let report = orchestrator.run_batch(&slides, out.path()).await;

    assert!(!report.is_success());
    assert_eq!(report.completed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].slide_path, PathBuf::from("/slides/b.svs"));
    assert!(out.path().join("a").join("Small.txt").exists());
    assert!(!out.path().join("b").exists());
    assert!(out.path().join("c").join("Small.txt").exists());
}

#[tokio::test]
async fn test_tcga_slides_are_labelled() {
    let out = tempfile::tempdir().unwrap();
    let slides = vec![
        PathBuf::from("/slides/TCGA-A7-A0CE-01A-01-TSA.svs"),
        PathBuf::from("/slides/TCGA-A7-A0CE-11A-01-TSA.svs"),
    ];
    let orchestrator =
        TilingOrchestrator::new(SyntheticOpener::new(reference_slide()), settings("10:Small"));

    let report = orchestrator.run_batch(&slides, out.path()).await;

    let labels: Vec<_> = report.completed.iter().map(|s| s.label).collect();
    assert_eq!(labels, vec![Some(SlideLabel::Tumor), Some(SlideLabel::Normal)]);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["completed"][0]["label"], "tumor");
    assert_eq!(json["completed"][1]["label"], "normal");
}

#[tokio::test]
async fn test_batch_report_serializes() {
    let out = tempfile::tempdir().unwrap();
    let orchestrator =
        TilingOrchestrator::new(SyntheticOpener::new(reference_slide()), settings("10:Small"));

    let report = orchestrator
        .run_batch(&[PathBuf::from("/slides/a.svs")], out.path())
        .await;
    let json = serde_json::to_value(&report).unwrap();

    let tier = &json["completed"][0]["tiers"][0];
    assert_eq!(tier["name"], "Small");
    assert_eq!(tier["status"], "completed");
    assert_eq!(tier["accepted"], 4);
    assert_eq!(tier["resolution"]["kind"], "direct");
}

// =============================================================================
// Reference Scenarios
// =============================================================================

#[tokio::test]
async fn test_two_level_scenario_grid_sizes() {
    // 4096x4096 at 40x with a stored 20x level
    let out = tempfile::tempdir().unwrap();
    let slide = SyntheticSlide::new((4096, 4096), &[1, 2], Some(40.0));
    let mut settings = settings("40:Large,20:Medium,10:Small");
    settings.tile_size = 256;
    settings.overview = None;
    let orchestrator = TilingOrchestrator::new(SyntheticOpener::new(slide), settings);

    let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();

    assert!(matches!(
        report.tier("Large").unwrap().outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Direct { level: 0, .. },
            rows: 16,
            cols: 16,
            ..
        }
    ));
    assert!(matches!(
        report.tier("Medium").unwrap().outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Direct { level: 1, .. },
            rows: 8,
            cols: 8,
            ..
        }
    ));
    assert!(matches!(
        report.tier("Small").unwrap().outcome,
        TierOutcome::Completed {
            resolution: TierResolution::Synthesized {
                level: 1,
                oversized_tile_size: 512,
                scale: 2
            },
            rows: 4,
            cols: 4,
            ..
        }
    ));

    let slide_dir = out.path().join("case-01");
    for tier in ["Large", "Medium", "Small"] {
        assert!(slide_dir.join(format!("{tier}.txt")).exists());
    }
}

#[tokio::test]
async fn test_every_fifth_tile_failing_sums_across_workers() {
    // 10 x 10 grid of 128px tiles, all tissue; every fifth origin fails
    let mut slide = SyntheticSlide::new((1280, 1280), &[1], Some(40.0)).with_tissue_width(1280);
    for index in (4..100u64).step_by(5) {
        slide = slide.with_failing_read(((index % 10) * 128, (index / 10) * 128));
    }

    for workers in [1, 4, 6] {
        let out = tempfile::tempdir().unwrap();
        let mut settings = settings("40:Large");
        settings.workers = workers;
        settings.overview = None;
        let orchestrator = TilingOrchestrator::new(SyntheticOpener::new(slide.clone()), settings);

        let report = orchestrator.run(&slide_path(), out.path()).await.unwrap();
        let counts = report.tier("Large").unwrap().counts().unwrap();
        assert_eq!(
            (counts.planned, counts.accepted, counts.failed),
            (100, 80, 20),
            "workers = {workers}"
        );
    }
}
