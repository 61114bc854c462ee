//! Tile encoding.

mod encoder;

pub use encoder::{
    is_valid_quality, write_file, JpegTileEncoder, DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY,
    MIN_JPEG_QUALITY,
};
