//! Abbreviated JPEG stream handling.
//!
//! Aperio SVS tiles are abbreviated JPEG streams: the quantization (DQT) and
//! Huffman (DHT) tables are stored once in the level's `JPEGTables` tag and
//! every tile carries only its frame and scan data. Before decoding, the
//! tables are spliced in:
//!
//! ```text
//! tables: SOI DQT DHT ... EOI
//! tile:   SOI SOF SOS ... EOI
//! merged: SOI DQT DHT ... SOF SOS ... EOI
//! ```

use bytes::{Bytes, BytesMut};

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

const DHT: u8 = 0xC4;
const DQT: u8 = 0xDB;
const SOS: u8 = 0xDA;

/// Whether the stream defines its own quantization or Huffman tables before
/// the first scan.
///
/// Walks marker segments after SOI; returns `false` for anything that is not
/// a JPEG stream.
pub fn has_tables(data: &[u8]) -> bool {
    if data.len() < 4 || data[..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data[pos + 1] {
            DQT | DHT => return true,
            SOS => return false,
            // Fill bytes and standalone markers carry no length
            0xFF | 0x00 | 0x01 | 0xD0..=0xD9 => pos += 2,
            _ => {
                if pos + 3 >= data.len() {
                    return false;
                }
                let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + length;
            }
        }
    }

    false
}

/// Splice `tables` into an abbreviated `tile` stream.
///
/// The trailing EOI of the tables and the leading SOI of the tile are dropped.
pub fn merge_jpeg_tables(tables: &[u8], tile: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile);
    }
    if tile.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let tile = tile.strip_prefix(&SOI).unwrap_or(tile);

    let mut merged = BytesMut::with_capacity(tables.len() + tile.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(tile);
    merged.freeze()
}

/// Produce a self-contained JPEG stream for a stored tile.
///
/// Tiles that already carry tables, or levels without `JPEGTables`, are
/// passed through unchanged.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile: Bytes) -> Bytes {
    match tables {
        Some(tables) if !has_tables(&tile) => merge_jpeg_tables(tables, &tile),
        _ => tile,
    }
}
