//! Run reports.

use std::path::PathBuf;

use serde::Serialize;

use super::label::SlideLabel;
use super::pool::PoolCounts;
use super::resolver::TierResolution;

/// Result of one tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TierOutcome {
    /// Nothing was written for this tier.
    Skipped { reason: String },

    /// The tier was abandoned after an error.
    Failed { reason: String },

    Completed {
        resolution: TierResolution,
        rows: u32,
        cols: u32,
        #[serde(flatten)]
        counts: PoolCounts,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierReport {
    pub name: String,
    pub magnification: f64,
    #[serde(flatten)]
    pub outcome: TierOutcome,
}

impl TierReport {
    pub fn counts(&self) -> Option<PoolCounts> {
        match &self.outcome {
            TierOutcome::Completed { counts, .. } => Some(*counts),
            _ => None,
        }
    }
}

/// Result of tiling one slide.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlideReport {
    pub slide_id: String,
    pub slide_path: PathBuf,

    /// Sample type when the id is a TCGA barcode
    pub label: Option<SlideLabel>,

    pub objective: f64,
    pub output_dir: PathBuf,

    /// Written overview, `None` when skipped or failed
    pub overview: Option<PathBuf>,

    pub tiers: Vec<TierReport>,
}

impl SlideReport {
    pub fn tier(&self, name: &str) -> Option<&TierReport> {
        self.tiers.iter().find(|t| t.name == name)
    }

    /// Tiles written across all tiers.
    pub fn accepted(&self) -> usize {
        self.tiers
            .iter()
            .filter_map(TierReport::counts)
            .map(|c| c.accepted)
            .sum()
    }
}

/// Result of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub completed: Vec<SlideReport>,
    pub failed: Vec<FailedSlide>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedSlide {
    pub slide_path: PathBuf,
    pub error: String,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
