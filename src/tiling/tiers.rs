//! Canonical magnification tiers.
//!
//! Tiles are produced at a fixed set of magnifications regardless of which
//! levels a slide stores. The set is plain configuration: an ordered list of
//! `magnification:Name` pairs, parsed from strings such as
//! `40:Large,20:Medium,10:Small,5:Overview,2.5:Minimum`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Default tier set, highest magnification first.
pub const DEFAULT_TIERS: &str = "40:Large,20:Medium,10:Small,5:Overview,2.5:Minimum";

/// Relative tolerance used when comparing magnifications.
pub(crate) const MAGNIFICATION_EPSILON: f64 = 1e-6;

/// Whether two magnifications are the same for tiling purposes.
pub(crate) fn same_magnification(a: f64, b: f64) -> bool {
    (a - b).abs() <= MAGNIFICATION_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Render a magnification the way manifests and logs show it: always with a
/// fractional part (`40.0`, `2.5`).
pub fn format_magnification(magnification: f64) -> String {
    if magnification.fract() == 0.0 {
        format!("{magnification:.1}")
    } else {
        format!("{magnification}")
    }
}

// =============================================================================
// CanonicalTier
// =============================================================================

/// One output tier: a target magnification and the directory name it is
/// written under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalTier {
    pub magnification: f64,
    pub name: String,
}

impl CanonicalTier {
    pub fn new(magnification: f64, name: impl Into<String>) -> Self {
        Self {
            magnification,
            name: name.into(),
        }
    }
}

impl fmt::Display for CanonicalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}x)", self.name, format_magnification(self.magnification))
    }
}

// =============================================================================
// TierSet
// =============================================================================

/// Ordered, validated set of tiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSet(Vec<CanonicalTier>);

impl TierSet {
    /// Validate and wrap a list of tiers.
    ///
    /// Rejects an empty list, non-positive or non-finite magnifications,
    /// names unusable as a directory, and duplicate names.
    pub fn new(tiers: Vec<CanonicalTier>) -> Result<Self, String> {
        if tiers.is_empty() {
            return Err("tier set must not be empty".to_string());
        }

        for (i, tier) in tiers.iter().enumerate() {
            if !tier.magnification.is_finite() || tier.magnification <= 0.0 {
                return Err(format!(
                    "tier '{}' has invalid magnification {}",
                    tier.name, tier.magnification
                ));
            }
            if tier.name.is_empty()
                || tier.name == "."
                || tier.name == ".."
                || tier.name.contains(['/', '\\'])
            {
                return Err(format!("invalid tier name '{}'", tier.name));
            }
            if tiers[..i].iter().any(|t| t.name == tier.name) {
                return Err(format!("duplicate tier name '{}'", tier.name));
            }
        }

        Ok(Self(tiers))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalTier> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for TierSet {
    fn default() -> Self {
        Self(vec![
            CanonicalTier::new(40.0, "Large"),
            CanonicalTier::new(20.0, "Medium"),
            CanonicalTier::new(10.0, "Small"),
            CanonicalTier::new(5.0, "Overview"),
            CanonicalTier::new(2.5, "Minimum"),
        ])
    }
}

impl FromStr for TierSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tiers = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (magnification, name) = part
                    .split_once(':')
                    .ok_or_else(|| format!("expected 'magnification:Name', got '{part}'"))?;
                let magnification = magnification
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("invalid magnification in '{part}': {e}"))?;
                Ok(CanonicalTier::new(magnification, name.trim()))
            })
            .collect::<Result<Vec<_>, String>>()?;

        TierSet::new(tiers)
    }
}

impl<'a> IntoIterator for &'a TierSet {
    type Item = &'a CanonicalTier;
    type IntoIter = std::slice::Iter<'a, CanonicalTier>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// =============================================================================
// Tests
// =============================================================================
