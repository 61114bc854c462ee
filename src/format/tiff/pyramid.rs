//! Pyramid level identification.
//!
//! A slide file holds more images than its pyramid: label, macro and
//! thumbnail images sit in the same IFD chain. Levels are identified by:
//! 1. Being tiled with TileOffsets/TileByteCounts present
//! 2. Sorting by area, the largest image is level 0
//! 3. Every further level is uniformly downsampled from level 0 (X and Y
//!    factors agree) and strictly smaller than the previous level
//!
//! Downsample factors need not be powers of two; scanners commonly store
//! 4x or 3x steps, and some store levels at arbitrary ratios.

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

/// Maximum number of IFDs followed before giving up on the chain
const MAX_IFDS: usize = 256;

/// Relative disagreement tolerated between X and Y downsample factors
const ANISOTROPY_TOLERANCE: f64 = 0.1;

// =============================================================================
// PyramidLevel
// =============================================================================

/// A single level in the image pyramid (level 0 = highest resolution).
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub level_index: usize,

    /// Index of the IFD in the file's IFD chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,

    /// Downsample factor relative to level 0 (1.0 for level 0)
    pub downsample: f64,

    /// Raw compression id (7 = JPEG)
    pub compression: u16,

    pub tile_offsets_entry: IfdEntry,
    pub tile_byte_counts_entry: IfdEntry,
    pub jpeg_tables_entry: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD; `None` for stripped or incomplete IFDs.
    fn from_ifd(ifd: &Ifd, ifd_index: usize, byte_order: ByteOrder) -> Option<Self> {
        if !ifd.is_tiled() || ifd.get_entry_by_tag(TiffTag::StripOffsets).is_some() {
            return None;
        }

        let tile_width = ifd.tile_width(byte_order).filter(|&w| w > 0)?;
        let tile_height = ifd.tile_height(byte_order).filter(|&h| h > 0)?;
        let width = ifd.image_width(byte_order).filter(|&w| w > 0)?;
        let height = ifd.image_height(byte_order).filter(|&h| h > 0)?;

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            downsample: 1.0,
            // TIFF default is no compression
            compression: ifd.compression(byte_order).unwrap_or(1),
            tile_offsets_entry: ifd.get_entry_by_tag(TiffTag::TileOffsets)?.clone(),
            tile_byte_counts_entry: ifd.get_entry_by_tag(TiffTag::TileByteCounts)?.clone(),
            jpeg_tables_entry: ifd.get_entry_by_tag(TiffTag::JpegTables).cloned(),
        })
    }

    #[inline]
    pub fn tile_count(&self) -> u64 {
        self.tiles_x as u64 * self.tiles_y as u64
    }

    /// Row-major tile index, `None` out of bounds.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        u32::try_from(tile_y as u64 * self.tiles_x as u64 + tile_x as u64).ok()
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// A parsed TIFF image pyramid, levels sorted by resolution.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,
    pub levels: Vec<PyramidLevel>,

    /// ImageDescription of the first IFD, where SVS keeps its metadata
    pub description_entry: Option<IfdEntry>,
}

impl TiffPyramid {
    /// Parse the header and IFD chain, then identify pyramid levels.
    pub async fn parse<R: RangeReader + ?Sized>(reader: &R) -> Result<Self, TiffError> {
        let header_len = (reader.size() as usize).min(BIGTIFF_HEADER_SIZE);
        if header_len < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: reader.size(),
            });
        }
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::parse_all_ifds(reader, &header).await?;
        Self::build(header, ifds)
    }

    async fn parse_all_ifds<R: RangeReader + ?Sized>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if !seen.insert(offset) || offset >= reader.size() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
            let entry_count = if header.is_bigtiff {
                header.byte_order.read_u64(&count_bytes)
            } else {
                header.byte_order.read_u16(&count_bytes) as u64
            };

            let ifd_size = Ifd::calculate_size(entry_count, header)
                .filter(|&size| size as u64 <= reader.size() - offset)
                .ok_or(TiffError::CountTooLarge {
                    what: "IFD entry",
                    count: entry_count,
                })?;
            let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    fn build(header: TiffHeader, ifds: Vec<Ifd>) -> Result<Self, TiffError> {
        let byte_order = header.byte_order;
        let description_entry = ifds
            .first()
            .and_then(|ifd| ifd.get_entry_by_tag(TiffTag::ImageDescription))
            .cloned();

        let mut candidates: Vec<PyramidLevel> = ifds
            .iter()
            .enumerate()
            .filter_map(|(i, ifd)| PyramidLevel::from_ifd(ifd, i, byte_order))
            .collect();

        // Largest first; ties keep file order
        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let levels = Self::select_levels(candidates);
        if levels.is_empty() {
            return Err(TiffError::NoPyramidLevels);
        }

        Ok(TiffPyramid {
            header,
            levels,
            description_entry,
        })
    }

    /// Keep candidates that are uniform, strictly decreasing downsamples of
    /// the largest one.
    fn select_levels(candidates: Vec<PyramidLevel>) -> Vec<PyramidLevel> {
        let Some(base) = candidates.first() else {
            return candidates;
        };
        let base_width = base.width as f64;
        let base_height = base.height as f64;

        let mut levels: Vec<PyramidLevel> = Vec::new();
        for mut level in candidates {
            let ds_x = base_width / level.width as f64;
            let ds_y = base_height / level.height as f64;
            let downsample = (ds_x + ds_y) / 2.0;

            if (ds_x - ds_y).abs() / downsample > ANISOTROPY_TOLERANCE {
                continue;
            }
            if let Some(prev) = levels.last() {
                if level.width >= prev.width || level.height >= prev.height {
                    continue;
                }
            }

            level.level_index = levels.len();
            level.downsample = downsample;
            levels.push(level);
        }

        levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn get_level(&self, level: usize) -> Option<&PyramidLevel> {
        self.levels.get(level)
    }
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tile locations and shared JPEG tables of one level.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    pub async fn load<R: RangeReader + ?Sized>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets = values
            .read_u64_array(&level.tile_offsets_entry, TiffTag::TileOffsets.name())
            .await?;
        let byte_counts = values
            .read_u64_array(&level.tile_byte_counts_entry, TiffTag::TileByteCounts.name())
            .await?;

        let expected = level.tile_count();
        if (offsets.len() as u64) < expected || (byte_counts.len() as u64) < expected {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::TileOffsets.name(),
                message: format!(
                    "level {} needs {} tiles, found {} offsets and {} byte counts",
                    level.level_index,
                    expected,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match &level.jpeg_tables_entry {
            Some(entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and size of a tile.
    pub fn get_tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}

// =============================================================================
// Tests
// =============================================================================
