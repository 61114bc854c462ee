//! Per-tier manifest sidecar.
//!
//! One flat `key: value` text file per tier, next to the tier directory,
//! describing the grid that was produced:
//!
//! ```text
//! slideId: TCGA-XX-0001
//! Objective: 20.0
//! Patch_size: 256
//! rows: 8
//! cols: 8
//! height: 2048
//! width: 2048
//! ```

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::TierError;

use super::tiers::format_magnification;

/// Grid geometry of one produced tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelManifest {
    pub slide_id: String,

    /// Tier magnification
    pub objective: f64,

    pub tile_size: u32,
    pub rows: u32,
    pub cols: u32,

    /// Region height in tier pixels
    pub height: u32,

    /// Region width in tier pixels
    pub width: u32,
}

impl LevelManifest {
    /// Write the manifest to `path`, replacing any previous one.
    pub fn write(&self, path: &Path) -> Result<(), TierError> {
        std::fs::write(path, self.to_string()).map_err(|source| TierError::Manifest {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl fmt::Display for LevelManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "slideId: {}", self.slide_id)?;
        writeln!(f, "Objective: {}", format_magnification(self.objective))?;
        writeln!(f, "Patch_size: {}", self.tile_size)?;
        writeln!(f, "rows: {}", self.rows)?;
        writeln!(f, "cols: {}", self.cols)?;
        writeln!(f, "height: {}", self.height)?;
        writeln!(f, "width: {}", self.width)
    }
}
