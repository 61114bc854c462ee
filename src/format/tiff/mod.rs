//! TIFF parser for Whole Slide Images.
//!
//! Handles classic TIFF and BigTIFF in either byte order, which covers the
//! container layer of Aperio SVS and generic pyramidal TIFF slides.
//!
//! - **Byte order**: declared in the header (II = little-endian, MM = big-endian).
//! - **Classic vs BigTIFF**: 32-bit vs 64-bit offsets; handled transparently.
//! - **IFDs**: one per stored image. Slides carry pyramid levels plus label,
//!   macro and thumbnail images; only tiled pyramid levels are kept.
//! - **Inline vs offset values**: values that fit in the entry's value field
//!   are stored inline, larger ones live at an offset.

mod parser;
mod pyramid;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::ValueReader;
