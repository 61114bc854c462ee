//! Slide abstraction layer.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Tiling engine (workers)         │
//! └────────────────────┬────────────────────┘
//!                      │ SlideOpener::open(path)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            SlideHandle trait            │
//! │ (levels, regions, thumbnail, objective) │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               TiffSlide                 │
//! │   (SVS / pyramidal TIFF, JPEG tiles)    │
//! └─────────────────────────────────────────┘
//! ```

mod handle;
mod tiff_slide;

pub use handle::{SlideHandle, SlideOpener, BACKGROUND};
pub use tiff_slide::{TiffSlide, TiffSlideOpener, TiffSlideOptions, DEFAULT_TILE_CACHE_CAPACITY};
