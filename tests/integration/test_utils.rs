//! Test utilities for integration tests.
//!
//! Two kinds of slides are provided:
//!
//! - [`SyntheticSlide`]: an in-memory [`SlideHandle`] with procedural pixels
//!   and injectable failures, opened through [`SyntheticOpener`].
//! - [`PyramidTiffBuilder`]: real pyramidal TIFF bytes with JPEG tiles,
//!   optionally SVS-style with shared `JPEGTables`.
//!
//! Both draw the same picture: noisy "tissue" left of a vertical boundary and
//! white background to its right, so acceptance results are predictable.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use wsi_tiler::error::{FormatError, SlideError};
use wsi_tiler::slide::{SlideHandle, SlideOpener, BACKGROUND};

// =============================================================================
// Procedural Pixels
// =============================================================================

/// Pixel at level-0 coordinates: noise left of `tissue_width`, white beyond.
///
/// Noise channels stay in 30..200, so tissue never counts as background,
/// even after downscaling.
pub fn tissue_pixel(x0: u64, y0: u64, tissue_width: u64) -> Rgb<u8> {
    if x0 >= tissue_width {
        return BACKGROUND;
    }
    let h = (x0.wrapping_mul(73_856_093) ^ y0.wrapping_mul(19_349_663))
        .wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let channel = |shift: u32| 30 + ((h >> shift) % 170) as u8;
    Rgb([channel(7), channel(23), channel(41)])
}

// =============================================================================
// Synthetic Slide
// =============================================================================

struct SyntheticInner {
    /// (width, height, downsample) per level
    levels: Vec<(u32, u32, f64)>,
    objective: Option<f64>,
    tissue_width: u64,
    failing_origins: HashSet<(u64, u64)>,
    reads: AtomicUsize,
}

/// An in-memory slide with procedural pixels.
#[derive(Clone)]
pub struct SyntheticSlide {
    inner: Arc<SyntheticInner>,
}

impl SyntheticSlide {
    /// Levels are `base / downsample` for each downsample, level 0 first.
    /// Tissue covers the left half of the slide.
    pub fn new(base: (u32, u32), downsamples: &[u32], objective: Option<f64>) -> Self {
        let levels = downsamples
            .iter()
            .map(|&ds| (base.0 / ds, base.1 / ds, ds as f64))
            .collect();
        Self {
            inner: Arc::new(SyntheticInner {
                levels,
                objective,
                tissue_width: base.0 as u64 / 2,
                failing_origins: HashSet::new(),
                reads: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_tissue_width(self, tissue_width: u64) -> Self {
        self.map_inner(|inner| inner.tissue_width = tissue_width)
    }

    /// Make `read_region` fail for this level-0 origin.
    pub fn with_failing_read(self, origin: (u64, u64)) -> Self {
        self.map_inner(|inner| {
            inner.failing_origins.insert(origin);
        })
    }

    /// Number of `read_region` calls across all clones.
    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    fn map_inner(self, f: impl FnOnce(&mut SyntheticInner)) -> Self {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(_) => panic!("configure SyntheticSlide before cloning it"),
        };
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    fn level(&self, level: usize) -> Result<(u32, u32, f64), SlideError> {
        self.inner
            .levels
            .get(level)
            .copied()
            .ok_or(SlideError::InvalidLevel {
                level,
                level_count: self.inner.levels.len(),
            })
    }
}

#[async_trait]
impl SlideHandle for SyntheticSlide {
    fn level_count(&self) -> usize {
        self.inner.levels.len()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.inner.levels.get(level).map(|&(w, h, _)| (w, h))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.inner.levels.get(level).map(|&(_, _, ds)| ds)
    }

    fn objective_magnification(&self) -> Result<f64, SlideError> {
        self.inner
            .objective
            .ok_or_else(|| SlideError::MissingMagnification("synthetic".to_string()))
    }

    async fn read_region(
        &self,
        level: usize,
        origin: (u64, u64),
        size: (u32, u32),
    ) -> Result<RgbImage, SlideError> {
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        let (width, height, ds) = self.level(level)?;

        if self.inner.failing_origins.contains(&origin) {
            return Err(SlideError::Decode {
                level,
                tile_x: 0,
                tile_y: 0,
                message: "injected failure".to_string(),
            });
        }

        let left = (origin.0 as f64 / ds).round() as u64;
        let top = (origin.1 as f64 / ds).round() as u64;
        let tissue_width = self.inner.tissue_width;

        Ok(RgbImage::from_fn(size.0, size.1, |i, j| {
            let lx = left + i as u64;
            let ly = top + j as u64;
            if lx >= width as u64 || ly >= height as u64 {
                return BACKGROUND;
            }
            tissue_pixel((lx as f64 * ds) as u64, (ly as f64 * ds) as u64, tissue_width)
        }))
    }

    async fn thumbnail(&self, size: (u32, u32)) -> Result<RgbImage, SlideError> {
        let (base_w, base_h, _) = self.level(0)?;
        let tissue_width = self.inner.tissue_width;
        Ok(RgbImage::from_fn(size.0, size.1, |i, j| {
            let x0 = i as u64 * base_w as u64 / size.0 as u64;
            let y0 = j as u64 * base_h as u64 / size.1 as u64;
            tissue_pixel(x0, y0, tissue_width)
        }))
    }
}

// =============================================================================
// Synthetic Opener
// =============================================================================

/// Hands out clones of one [`SyntheticSlide`] for any path.
pub struct SyntheticOpener {
    slide: SyntheticSlide,
    missing: HashSet<PathBuf>,
    open_limit: Option<usize>,
    opens: AtomicUsize,
}

impl SyntheticOpener {
    pub fn new(slide: SyntheticSlide) -> Self {
        Self {
            slide,
            missing: HashSet::new(),
            open_limit: None,
            opens: AtomicUsize::new(0),
        }
    }

    /// Opening this path fails.
    pub fn with_missing(mut self, path: impl Into<PathBuf>) -> Self {
        self.missing.insert(path.into());
        self
    }

    /// Only the first `limit` opens succeed.
    pub fn with_open_limit(mut self, limit: usize) -> Self {
        self.open_limit = Some(limit);
        self
    }
}

fn open_failure(path: &Path, reason: &str) -> SlideError {
    SlideError::Open {
        path: path.display().to_string(),
        source: FormatError::UnsupportedFormat {
            reason: reason.to_string(),
        },
    }
}

#[async_trait]
impl SlideOpener for SyntheticOpener {
    type Handle = SyntheticSlide;

    async fn open(&self, path: &Path) -> Result<SyntheticSlide, SlideError> {
        let count = self.opens.fetch_add(1, Ordering::SeqCst);

        if self.missing.contains(path) {
            return Err(open_failure(path, "missing"));
        }
        if self.open_limit.is_some_and(|limit| count >= limit) {
            return Err(open_failure(path, "open limit reached"));
        }
        Ok(self.slide.clone())
    }
}

// =============================================================================
// Pyramidal TIFF Builder
// =============================================================================

#[derive(Clone, Copy)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Builds classic TIFF files with one JPEG-tiled IFD per pyramid level.
pub struct PyramidTiffBuilder {
    byte_order: ByteOrderType,
    base: (u32, u32),
    downsamples: Vec<u32>,
    tile_size: u32,
    description: Option<String>,
    jpeg_tables: bool,
    compression: u16,
    tissue_width: u64,
}

impl PyramidTiffBuilder {
    pub fn new(base: (u32, u32), downsamples: &[u32], tile_size: u32) -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            base,
            downsamples: downsamples.to_vec(),
            tile_size,
            description: None,
            jpeg_tables: false,
            compression: 7,
            tissue_width: base.0 as u64 / 2,
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrderType) -> Self {
        self.byte_order = order;
        self
    }

    /// ImageDescription of the first IFD.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Aperio-style description carrying `AppMag`.
    pub fn with_aperio_magnification(self, magnification: u32) -> Self {
        let (w, h) = self.base;
        let tile = self.tile_size;
        self.with_description(format!(
            "Aperio Image Library v12.0.15\n{w}x{h} ({tile}x{tile}) JPEG/RGB Q=90|AppMag = {magnification}|MPP = 0.4990"
        ))
    }

    /// Store abbreviated tiles plus one shared `JPEGTables` per level.
    pub fn with_jpeg_tables(mut self, jpeg_tables: bool) -> Self {
        self.jpeg_tables = jpeg_tables;
        self
    }

    /// Compression tag value written for every level (tile bytes stay JPEG).
    pub fn with_compression(mut self, compression: u16) -> Self {
        self.compression = compression;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let bo = self.byte_order;
        let mut data = Vec::new();

        match bo {
            ByteOrderType::LittleEndian => data.extend_from_slice(b"II"),
            ByteOrderType::BigEndian => data.extend_from_slice(b"MM"),
        }
        write_value(&mut data, bo, 42, 2);
        let mut next_pointer = data.len();
        write_value(&mut data, bo, 0, 4);

        for (index, &ds) in self.downsamples.iter().enumerate() {
            let (width, height) = (self.base.0 / ds, self.base.1 / ds);
            let tiles_x = width.div_ceil(self.tile_size);
            let tiles_y = height.div_ceil(self.tile_size);

            let mut offsets = Vec::new();
            let mut counts = Vec::new();
            let mut tables: Option<Vec<u8>> = None;

            for ty in 0..tiles_y {
                for tx in 0..tiles_x {
                    let jpeg = self.encode_tile(width, height, ds, tx, ty);
                    let stored = if self.jpeg_tables {
                        let (level_tables, abbreviated) = split_jpeg_stream(&jpeg);
                        tables.get_or_insert(level_tables);
                        abbreviated
                    } else {
                        jpeg
                    };
                    offsets.push(data.len() as u32);
                    counts.push(stored.len() as u32);
                    data.extend_from_slice(&stored);
                }
            }

            let mut entries: Vec<(u16, u16, u32, Vec<u8>)> = vec![
                (256, 4, 1, longs(bo, &[width])),
                (257, 4, 1, longs(bo, &[height])),
                (258, 3, 3, shorts(bo, &[8, 8, 8])),
                (259, 3, 1, shorts(bo, &[self.compression])),
                (262, 3, 1, shorts(bo, &[2])),
                (277, 3, 1, shorts(bo, &[3])),
                (322, 3, 1, shorts(bo, &[self.tile_size as u16])),
                (323, 3, 1, shorts(bo, &[self.tile_size as u16])),
                (324, 4, offsets.len() as u32, longs(bo, &offsets)),
                (325, 4, counts.len() as u32, longs(bo, &counts)),
            ];
            if index == 0 {
                if let Some(description) = &self.description {
                    let mut ascii = description.as_bytes().to_vec();
                    ascii.push(0);
                    entries.push((270, 2, ascii.len() as u32, ascii));
                }
            }
            if let Some(tables) = tables {
                entries.push((347, 7, tables.len() as u32, tables));
            }
            entries.sort_by_key(|e| e.0);

            // External values go before the IFD itself
            let mut fields = Vec::with_capacity(entries.len());
            for (tag, field_type, count, payload) in entries {
                if payload.len() <= 4 {
                    let mut inline = payload;
                    inline.resize(4, 0);
                    fields.push((tag, field_type, count, inline));
                } else {
                    pad_to_word(&mut data);
                    let offset = data.len() as u32;
                    data.extend_from_slice(&payload);
                    fields.push((tag, field_type, count, longs(bo, &[offset])));
                }
            }

            pad_to_word(&mut data);
            let ifd_offset = data.len() as u64;
            patch_u32(&mut data, bo, next_pointer, ifd_offset as u32);

            write_value(&mut data, bo, fields.len() as u64, 2);
            for (tag, field_type, count, value) in fields {
                write_value(&mut data, bo, tag as u64, 2);
                write_value(&mut data, bo, field_type as u64, 2);
                write_value(&mut data, bo, count as u64, 4);
                data.extend_from_slice(&value);
            }
            next_pointer = data.len();
            write_value(&mut data, bo, 0, 4);
        }

        data
    }

    /// Full-size JPEG tile; the part outside the level is white padding.
    fn encode_tile(&self, width: u32, height: u32, ds: u32, tx: u32, ty: u32) -> Vec<u8> {
        let tile = RgbImage::from_fn(self.tile_size, self.tile_size, |i, j| {
            let lx = tx * self.tile_size + i;
            let ly = ty * self.tile_size + j;
            if lx >= width || ly >= height {
                return BACKGROUND;
            }
            tissue_pixel(lx as u64 * ds as u64, ly as u64 * ds as u64, self.tissue_width)
        });

        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
        encoder.encode_image(&tile).unwrap();
        buf
    }
}

/// Write bytes to a temp file with the given name; returns the directory
/// guard and the path.
pub fn write_slide_file(name: &str, bytes: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    (dir, path)
}

/// Split a complete JPEG into a tables-only stream (SOI + tables + EOI) and
/// an abbreviated stream (SOI + scan + EOI).
fn split_jpeg_stream(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut i = 2;
    while i + 4 <= jpeg.len() {
        assert_eq!(jpeg[i], 0xFF, "expected a marker at {i}");
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            let mut tables = vec![0xFF, 0xD8];
            tables.extend_from_slice(&jpeg[2..i]);
            tables.extend_from_slice(&[0xFF, 0xD9]);

            let mut abbreviated = vec![0xFF, 0xD8];
            abbreviated.extend_from_slice(&jpeg[i..]);
            return (tables, abbreviated);
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        i += 2 + len;
    }
    panic!("no SOS marker in JPEG stream");
}

fn shorts(bo: ByteOrderType, values: &[u16]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        write_value(&mut out, bo, v as u64, 2);
    }
    out
}

fn longs(bo: ByteOrderType, values: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    for &v in values {
        write_value(&mut out, bo, v as u64, 4);
    }
    out
}

fn pad_to_word(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

fn patch_u32(data: &mut [u8], bo: ByteOrderType, pos: usize, value: u32) {
    let bytes = match bo {
        ByteOrderType::LittleEndian => value.to_le_bytes(),
        ByteOrderType::BigEndian => value.to_be_bytes(),
    };
    data[pos..pos + 4].copy_from_slice(&bytes);
}

fn write_value(data: &mut Vec<u8>, byte_order: ByteOrderType, value: u64, size: usize) {
    match byte_order {
        ByteOrderType::LittleEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_le_bytes()),
            4 => data.extend(&(value as u32).to_le_bytes()),
            8 => data.extend(&value.to_le_bytes()),
            _ => {}
        },
        ByteOrderType::BigEndian => match size {
            1 => data.push(value as u8),
            2 => data.extend(&(value as u16).to_be_bytes()),
            4 => data.extend(&(value as u32).to_be_bytes()),
            8 => data.extend(&value.to_be_bytes()),
            _ => {}
        },
    }
}

// =============================================================================
// Validation Helpers
// =============================================================================

/// Check if a file on disk is a decodable JPEG, returning its dimensions.
pub fn jpeg_dimensions(path: &Path) -> Option<(u32, u32)> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }
    let image = image::load_from_memory_with_format(&bytes, image::ImageFormat::Jpeg).ok()?;
    Some((image.width(), image.height()))
}

/// Sorted file names of the JPEG tiles in `dir`.
pub fn tile_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".jpg"))
            .collect(),
        Err(_) => Vec::new(),
    };
    names.sort();
    names
}
