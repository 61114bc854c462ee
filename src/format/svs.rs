//! Aperio SVS metadata.
//!
//! SVS files store scan metadata in the first IFD's ImageDescription as a
//! pipe-separated list of `key = value` pairs following a free-text header:
//!
//! ```text
//! Aperio Image Library v12.0.15
//! 46920x33600 (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.499|...
//! ```
//!
//! `AppMag` is the objective magnification at which level 0 was scanned.

const KEY_OBJECTIVE_POWER: &str = "AppMag";
const KEY_MPP: &str = "MPP";

/// Parsed metadata from an SVS ImageDescription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvsMetadata {
    /// Objective magnification of level 0 (`AppMag`)
    pub objective_power: Option<f64>,

    /// Microns per pixel at level 0 (`MPP`)
    pub mpp: Option<f64>,
}

impl SvsMetadata {
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata::default();

        for part in description.split('|') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match key.trim() {
                KEY_OBJECTIVE_POWER => metadata.objective_power = parse_positive(value),
                KEY_MPP => metadata.mpp = parse_positive(value),
                _ => {}
            }
        }

        metadata
    }
}

/// A finite, strictly positive number.
fn parse_positive(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}
