use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading slide bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Any other filesystem failure
    #[error("File error on {path}: {message}")]
    File { path: String, message: String },
}

/// Errors related to format detection and validation
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not supported
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only JPEG is supported)")]
    UnsupportedCompression(String),

    /// An entry or value count implies more bytes than the file holds
    #[error("{what} count {count} does not fit in the file")]
    CountTooLarge { what: &'static str, count: u64 },

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),

    /// No tiled pyramid level could be identified
    #[error("No pyramid levels found")]
    NoPyramidLevels,
}

/// Errors raised by a slide handle.
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// The slide could not be opened or its structure could not be parsed
    #[error("Failed to open slide {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: FormatError,
    },

    /// The slide carries no objective magnification and no override was given
    #[error("Slide {0} has no objective magnification metadata")]
    MissingMagnification(String),

    /// The objective magnification is not a finite positive number
    #[error("Invalid objective magnification {0}")]
    InvalidMagnification(f64),

    /// Level index out of range
    #[error("Invalid level {level}: slide has {level_count} levels")]
    InvalidLevel { level: usize, level_count: usize },

    /// A region or thumbnail request with a zero dimension
    #[error("Empty region requested: {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },

    /// Reading native tile bytes failed
    #[error("Failed to read tile data: {0}")]
    Read(#[from] TiffError),

    /// Native tile bytes could not be decoded
    #[error("Failed to decode native tile ({tile_x}, {tile_y}) at level {level}: {message}")]
    Decode {
        level: usize,
        tile_x: u32,
        tile_y: u32,
        message: String,
    },
}

/// Tile-level errors: logged, the tile is skipped, the tier continues.
#[derive(Debug, Error)]
pub enum TileError {
    /// Region read from the slide failed
    #[error("Region read failed: {0}")]
    Read(#[from] SlideError),

    /// Re-encoding the tile failed
    #[error("Failed to encode tile: {message}")]
    EncodeError { message: String },

    /// Writing the tile file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking post-processing task did not complete
    #[error("Tile task aborted: {0}")]
    Task(String),
}

/// Tier-level errors: logged, the tier is skipped, the slide continues.
#[derive(Debug, Error)]
pub enum TierError {
    /// No native level can serve this tier
    #[error("No native level can serve {magnification}x (objective {objective}x)")]
    NoCandidate { magnification: f64, objective: f64 },

    /// Grid parameters are inconsistent
    #[error("Invalid grid: tile size {tile_size}, overlap {overlap}")]
    InvalidGrid { tile_size: u32, overlap: u32 },

    /// Tier metadata could not be read from the slide
    #[error("Slide metadata error: {0}")]
    Slide(#[from] SlideError),

    /// Creating the tier directory failed
    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the manifest failed
    #[error("Failed to write manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors: the slide is aborted and the failure reaches the caller.
#[derive(Debug, Error)]
pub enum TilingError {
    /// Opening the slide or reading its required metadata failed
    #[error(transparent)]
    Slide(#[from] SlideError),

    /// The slide path does not yield a usable identifier
    #[error("Cannot derive a slide id from {0}")]
    InvalidSlidePath(PathBuf),

    /// The slide output directory could not be created
    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The batch input directory could not be listed
    #[error("Failed to list slides in {path}: {message}")]
    InputDir { path: PathBuf, message: String },
}
