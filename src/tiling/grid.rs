//! Tile grid planning.
//!
//! Origins are laid out at `step = tile_size - overlap` along each axis and
//! kept while a full tile still fits; partial strips at the right and bottom
//! edges are dropped. Origins are ordered row-major (y outer, x inner).

use serde::Serialize;

use crate::error::TierError;

/// One planned tile: its origin at the resolved level and its grid index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileOrigin {
    pub x: u64,
    pub y: u64,
    pub row: u32,
    pub col: u32,
}

impl TileOrigin {
    /// Output file name, sortable by row then column.
    pub fn file_name(&self) -> String {
        format!("{:04}_{:04}.jpg", self.row, self.col)
    }
}

/// Ordered tile origins over one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileGrid {
    pub tile_size: u32,
    pub overlap: u32,
    pub rows: u32,
    pub cols: u32,
    origins: Vec<TileOrigin>,
}

/// Number of tile positions along an axis of length `extent`.
fn axis_count(extent: u32, tile_size: u32, step: u32) -> u32 {
    if extent < tile_size {
        0
    } else {
        (extent - tile_size) / step + 1
    }
}

impl TileGrid {
    /// Plan the grid for a level of `dimensions`.
    ///
    /// Fails with [`TierError::InvalidGrid`] unless `0 <= overlap < tile_size`.
    /// A level smaller than one tile yields an empty grid.
    pub fn plan(dimensions: (u32, u32), tile_size: u32, overlap: u32) -> Result<Self, TierError> {
        if tile_size == 0 || overlap >= tile_size {
            return Err(TierError::InvalidGrid { tile_size, overlap });
        }

        let step = tile_size - overlap;
        let (width, height) = dimensions;
        let cols = axis_count(width, tile_size, step);
        let rows = axis_count(height, tile_size, step);

        let mut origins = Vec::with_capacity(rows as usize * cols as usize);
        for row in 0..rows {
            for col in 0..cols {
                origins.push(TileOrigin {
                    x: col as u64 * step as u64,
                    y: row as u64 * step as u64,
                    row,
                    col,
                });
            }
        }

        Ok(Self {
            tile_size,
            overlap,
            rows,
            cols,
            origins,
        })
    }

    pub fn step(&self) -> u32 {
        self.tile_size - self.overlap
    }

    pub fn origins(&self) -> &[TileOrigin] {
        &self.origins
    }

    pub fn len(&self) -> usize {
        self.origins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    /// Split the origins into at most `count` contiguous shards whose sizes
    /// differ by at most one. Empty shards are never produced.
    pub fn shards(&self, count: usize) -> Vec<&[TileOrigin]> {
        let total = self.origins.len();
        let count = count.clamp(1, total.max(1));
        let base = total / count;
        let extra = total % count;

        let mut shards = Vec::with_capacity(count);
        let mut start = 0;
        for i in 0..count {
            let len = base + usize::from(i < extra);
            if len == 0 {
                break;
            }
            shards.push(&self.origins[start..start + len]);
            start += len;
        }
        shards
    }
}

// =============================================================================
// Tests
// =============================================================================
