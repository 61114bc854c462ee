//! Tier-to-level resolution.
//!
//! Each native level has a derived magnification: the objective divided by
//! the level's downsample rounded to a positive integer. A tier is served
//! either directly by a level with the same magnification, or synthesized from
//! the nearest higher-magnification level by cropping an oversized tile and
//! scaling it down. Tiers above the objective are never upsampled.

use serde::Serialize;

use crate::error::{SlideError, TierError};
use crate::slide::SlideHandle;

use super::tiers::{same_magnification, CanonicalTier};

/// A native level with its derived magnification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NativeLevel {
    pub level: usize,
    pub downsample: f64,
    pub magnification: f64,
}

/// How a tier is read from the slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierResolution {
    /// The level stores this magnification; tiles are read as-is.
    Direct { level: usize, tile_size: u32 },

    /// Tiles of `oversized_tile_size` are read from a higher-magnification
    /// level and scaled down by `scale`.
    Synthesized {
        level: usize,
        oversized_tile_size: u32,
        scale: u32,
    },
}

impl TierResolution {
    pub fn level(&self) -> usize {
        match *self {
            TierResolution::Direct { level, .. } | TierResolution::Synthesized { level, .. } => {
                level
            }
        }
    }

    /// Side of the square read at the resolved level.
    pub fn read_size(&self) -> u32 {
        match *self {
            TierResolution::Direct { tile_size, .. } => tile_size,
            TierResolution::Synthesized {
                oversized_tile_size,
                ..
            } => oversized_tile_size,
        }
    }

    /// Downscale factor from the level to the tier (1 for direct reads).
    pub fn scale(&self) -> u32 {
        match *self {
            TierResolution::Direct { .. } => 1,
            TierResolution::Synthesized { scale, .. } => scale,
        }
    }
}

// =============================================================================
// MagnificationResolver
// =============================================================================

/// Resolves canonical tiers against one slide's native levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MagnificationResolver {
    objective: f64,
    levels: Vec<NativeLevel>,
}

impl MagnificationResolver {
    /// Build from the objective magnification and per-level downsamples,
    /// level 0 first.
    pub fn new(objective: f64, downsamples: impl IntoIterator<Item = f64>) -> Self {
        let levels = downsamples
            .into_iter()
            .enumerate()
            .map(|(level, downsample)| {
                let rounded = downsample.round().max(1.0);
                NativeLevel {
                    level,
                    downsample,
                    magnification: objective / rounded,
                }
            })
            .collect();

        Self { objective, levels }
    }

    /// Snapshot the levels of an opened slide.
    pub fn from_slide<S: SlideHandle + ?Sized>(slide: &S) -> Result<Self, SlideError> {
        let objective = slide.objective_magnification()?;
        if !objective.is_finite() || objective <= 0.0 {
            return Err(SlideError::InvalidMagnification(objective));
        }
        let level_count = slide.level_count();
        let downsamples = (0..level_count)
            .map(|level| {
                slide
                    .level_downsample(level)
                    .ok_or(SlideError::InvalidLevel { level, level_count })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(objective, downsamples))
    }

    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn levels(&self) -> &[NativeLevel] {
        &self.levels
    }

    /// Resolve `tier` for tiles of `tile_size`.
    ///
    /// Returns `Ok(None)` when the tier is above the objective magnification,
    /// and [`TierError::NoCandidate`] when no level has a higher magnification
    /// to synthesize from.
    pub fn resolve(
        &self,
        tier: &CanonicalTier,
        tile_size: u32,
    ) -> Result<Option<TierResolution>, TierError> {
        let target = tier.magnification;

        if let Some(native) = self
            .levels
            .iter()
            .find(|l| same_magnification(l.magnification, target))
        {
            return Ok(Some(TierResolution::Direct {
                level: native.level,
                tile_size,
            }));
        }

        if target > self.objective {
            return Ok(None);
        }

        // Nearest strictly higher magnification; `min_by` keeps the first
        // (lowest level index) of equal candidates.
        let candidate = self
            .levels
            .iter()
            .filter(|l| l.magnification > target)
            .min_by(|a, b| {
                (a.magnification - target).total_cmp(&(b.magnification - target))
            })
            .ok_or(TierError::NoCandidate {
                magnification: target,
                objective: self.objective,
            })?;

        let scale = (candidate.magnification / target).round().max(1.0) as u32;
        Ok(Some(TierResolution::Synthesized {
            level: candidate.level,
            oversized_tile_size: tile_size * scale,
            scale,
        }))
    }
}

// =============================================================================
// Tests
// =============================================================================
