//! Slide container parsing.
//!
//! TIFF/BigTIFF structure, pyramid identification, SVS metadata and the JPEG
//! stream fix-ups needed before stored tiles can be decoded.

pub mod detect;
pub mod jpeg;
pub mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use svs::SvsMetadata;
