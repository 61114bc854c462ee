//! Slide discovery for batch runs.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::TilingError;

/// File extensions recognised as whole-slide images.
pub const SLIDE_EXTENSIONS: &[&str] = &[
    "svs", "vms", "vmu", "ndpi", "scn", "mrxs", "tif", "tiff", "bif",
];

pub fn has_slide_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SLIDE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// List slide files in `root`, sorted by path.
///
/// With `recursive`, files one sub-folder deep are included as well.
pub fn list_slides(root: &Path, recursive: bool) -> Result<Vec<PathBuf>, TilingError> {
    if !root.is_dir() {
        return Err(TilingError::InputDir {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(if recursive { 2 } else { 1 })
        .sort_by_file_name();

    let mut slides = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_file() && has_slide_extension(entry.path()) {
            debug!(path = %entry.path().display(), "Discovered slide");
            slides.push(entry.into_path());
        }
    }

    slides.sort();
    Ok(slides)
}
