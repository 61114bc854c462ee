//! [`SlideHandle`] over TIFF-based slides (Aperio SVS and generic pyramidal TIFF).
//!
//! Regions are assembled from stored JPEG tiles: every native tile that
//! intersects the request is read, completed with the level's `JPEGTables`
//! when abbreviated, decoded and copied into a white canvas. Decoded tiles are
//! kept in a small per-handle LRU so that overlapping and oversized crops do
//! not decode the same native tile repeatedly.

use std::borrow::Cow;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbImage};
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{FormatError, SlideError, TiffError};
use crate::format::jpeg::prepare_tile_jpeg;
use crate::format::tiff::{Compression, PyramidLevel, TiffPyramid, TileData, ValueReader};
use crate::format::{detect_format, is_tiff_header, SlideFormat, SvsMetadata};
use crate::io::{LocalFileReader, RangeReader};

use super::handle::{SlideHandle, SlideOpener, BACKGROUND};

/// Default number of decoded native tiles kept per handle
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 64;

type TileKey = (usize, u32, u32);

// =============================================================================
// Options
// =============================================================================

/// Settings applied when opening a [`TiffSlide`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TiffSlideOptions {
    /// Objective magnification to use instead of (or in the absence of) the
    /// slide's own metadata
    pub objective_override: Option<f64>,

    /// Decoded native tiles kept per handle
    pub tile_cache_capacity: usize,
}

impl Default for TiffSlideOptions {
    fn default() -> Self {
        Self {
            objective_override: None,
            tile_cache_capacity: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

// =============================================================================
// TiffSlide
// =============================================================================

/// An opened TIFF slide.
pub struct TiffSlide<R: RangeReader = LocalFileReader> {
    reader: R,
    pyramid: TiffPyramid,
    tile_data: Vec<TileData>,
    format: SlideFormat,
    metadata: SvsMetadata,
    objective_override: Option<f64>,
    tiles: Mutex<LruCache<TileKey, Arc<RgbImage>>>,
}

impl TiffSlide<LocalFileReader> {
    /// Open a slide file from the local filesystem.
    pub async fn open(path: &Path, options: TiffSlideOptions) -> Result<Self, SlideError> {
        let reader = LocalFileReader::open(path)
            .await
            .map_err(|e| SlideError::Open {
                path: path.display().to_string(),
                source: e.into(),
            })?;
        Self::from_reader(reader, options).await
    }
}

impl<R: RangeReader> TiffSlide<R> {
    /// Parse the slide structure behind `reader`.
    ///
    /// Fails when the bytes are not a TIFF, when no pyramid level is found,
    /// or when a level uses a compression other than JPEG.
    pub async fn from_reader(reader: R, options: TiffSlideOptions) -> Result<Self, SlideError> {
        let path = reader.identifier().to_string();
        let open_error = |source: FormatError| SlideError::Open {
            path: path.clone(),
            source,
        };

        let probe_len = (reader.size() as usize).min(16);
        let probe = reader
            .read_exact_at(0, probe_len)
            .await
            .map_err(|e| open_error(e.into()))?;
        if !is_tiff_header(&probe) {
            return Err(open_error(FormatError::UnsupportedFormat {
                reason: "not a TIFF or BigTIFF file".to_string(),
            }));
        }

        let pyramid = TiffPyramid::parse(&reader)
            .await
            .map_err(|e| open_error(e.into()))?;

        let mut tile_data = Vec::with_capacity(pyramid.level_count());
        for level in &pyramid.levels {
            let compression = Compression::from_u16(level.compression);
            if !compression.is_supported() {
                return Err(open_error(
                    TiffError::UnsupportedCompression(compression.name()).into(),
                ));
            }
            let data = TileData::load(&reader, level, &pyramid.header)
                .await
                .map_err(|e| open_error(e.into()))?;
            tile_data.push(data);
        }

        let description = match &pyramid.description_entry {
            Some(entry) => Some(
                ValueReader::new(&reader, &pyramid.header)
                    .read_string(entry, "ImageDescription")
                    .await
                    .map_err(|e| open_error(e.into()))?,
            ),
            None => None,
        };

        let format = detect_format(description.as_deref());
        let metadata = match (format, &description) {
            (SlideFormat::AperioSvs, Some(d)) => SvsMetadata::parse(d),
            _ => SvsMetadata::default(),
        };

        debug!(
            slide = %path,
            format = format.name(),
            levels = pyramid.level_count(),
            objective = ?metadata.objective_power,
            "Opened slide"
        );

        let capacity = NonZeroUsize::new(options.tile_cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            reader,
            pyramid,
            tile_data,
            format,
            metadata,
            objective_override: options.objective_override,
            tiles: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    pub fn metadata(&self) -> &SvsMetadata {
        &self.metadata
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    /// Stored tile size of a level.
    pub fn tile_size(&self, level: usize) -> Option<(u32, u32)> {
        self.pyramid
            .get_level(level)
            .map(|l| (l.tile_width, l.tile_height))
    }

    fn level(&self, level: usize) -> Result<&PyramidLevel, SlideError> {
        self.pyramid
            .get_level(level)
            .ok_or(SlideError::InvalidLevel {
                level,
                level_count: self.pyramid.level_count(),
            })
    }

    /// Decoded native tile, from cache when possible.
    async fn native_tile(
        &self,
        level: &PyramidLevel,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Arc<RgbImage>, SlideError> {
        let key = (level.level_index, tile_x, tile_y);
        if let Some(tile) = self.tiles.lock().await.get(&key) {
            return Ok(Arc::clone(tile));
        }

        let tile = Arc::new(self.decode_native_tile(level, tile_x, tile_y).await?);
        self.tiles.lock().await.put(key, Arc::clone(&tile));
        Ok(tile)
    }

    async fn decode_native_tile(
        &self,
        level: &PyramidLevel,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<RgbImage, SlideError> {
        let decode_error = |message: String| SlideError::Decode {
            level: level.level_index,
            tile_x,
            tile_y,
            message,
        };

        let data = &self.tile_data[level.level_index];
        let (offset, length) = level
            .tile_index(tile_x, tile_y)
            .and_then(|i| data.get_tile_location(i))
            .ok_or_else(|| decode_error("tile outside level".to_string()))?;

        // Sparse tiles are stored with zero length
        if length == 0 {
            return Ok(RgbImage::from_pixel(
                level.tile_width,
                level.tile_height,
                BACKGROUND,
            ));
        }

        let raw = self
            .reader
            .read_exact_at(offset, length as usize)
            .await
            .map_err(TiffError::from)?;
        let jpeg = prepare_tile_jpeg(data.jpeg_tables.as_deref(), raw);

        let decoded = image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg)
            .map_err(|e| decode_error(e.to_string()))?;
        Ok(decoded.into_rgb8())
    }

    /// Valid pixel extent of a native tile (edge tiles are padded in storage).
    fn tile_extent(level: &PyramidLevel, tile_x: u32, tile_y: u32) -> (u32, u32) {
        let x0 = tile_x * level.tile_width;
        let y0 = tile_y * level.tile_height;
        (
            level.tile_width.min(level.width - x0),
            level.tile_height.min(level.height - y0),
        )
    }
}

#[async_trait]
impl<R: RangeReader> SlideHandle for TiffSlide<R> {
    fn level_count(&self) -> usize {
        self.pyramid.level_count()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.pyramid.get_level(level).map(|l| (l.width, l.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.pyramid.get_level(level).map(|l| l.downsample)
    }

    fn objective_magnification(&self) -> Result<f64, SlideError> {
        self.objective_override
            .or(self.metadata.objective_power)
            .ok_or_else(|| SlideError::MissingMagnification(self.identifier().to_string()))
    }

    async fn read_region(
        &self,
        level: usize,
        origin: (u64, u64),
        size: (u32, u32),
    ) -> Result<RgbImage, SlideError> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(SlideError::EmptyRegion { width, height });
        }
        let level = self.level(level)?;

        // Level-0 origin back to level coordinates
        let left = (origin.0 as f64 / level.downsample).round() as i64;
        let top = (origin.1 as f64 / level.downsample).round() as i64;
        let right = (left + width as i64).min(level.width as i64);
        let bottom = (top + height as i64).min(level.height as i64);

        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
        if left >= right || top >= bottom {
            return Ok(canvas);
        }

        let tw = level.tile_width as i64;
        let th = level.tile_height as i64;
        let first_tx = (left.max(0) / tw) as u32;
        let last_tx = ((right - 1) / tw) as u32;
        let first_ty = (top.max(0) / th) as u32;
        let last_ty = ((bottom - 1) / th) as u32;

        for tile_y in first_ty..=last_ty {
            for tile_x in first_tx..=last_tx {
                let tile = self.native_tile(level, tile_x, tile_y).await?;
                let valid = clip_to_extent(&tile, Self::tile_extent(level, tile_x, tile_y));
                imageops::replace(
                    &mut canvas,
                    &*valid,
                    tile_x as i64 * tw - left,
                    tile_y as i64 * th - top,
                );
            }
        }

        Ok(canvas)
    }

    async fn thumbnail(&self, size: (u32, u32)) -> Result<RgbImage, SlideError> {
        let (width, height) = size;
        if width == 0 || height == 0 {
            return Err(SlideError::EmptyRegion { width, height });
        }

        // Finest level that is still at least as large as the target
        let base = self.pyramid.levels.first().ok_or(SlideError::InvalidLevel {
            level: 0,
            level_count: self.pyramid.level_count(),
        })?;
        let wanted = base.width as f64 / width as f64;
        let level = self
            .pyramid
            .levels
            .iter()
            .rev()
            .find(|l| l.downsample <= wanted)
            .unwrap_or(base);

        let sx = width as f64 / level.width as f64;
        let sy = height as f64 / level.height as f64;
        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        for tile_y in 0..level.tiles_y {
            let src_y0 = tile_y * level.tile_height;
            let (_, valid_h) = Self::tile_extent(level, 0, tile_y);
            let dst_y0 = (src_y0 as f64 * sy).round() as u32;
            let dst_y1 = ((src_y0 + valid_h) as f64 * sy).round().min(height as f64) as u32;
            if dst_y1 <= dst_y0 {
                continue;
            }

            for tile_x in 0..level.tiles_x {
                let src_x0 = tile_x * level.tile_width;
                let (valid_w, _) = Self::tile_extent(level, tile_x, tile_y);
                let dst_x0 = (src_x0 as f64 * sx).round() as u32;
                let dst_x1 = ((src_x0 + valid_w) as f64 * sx).round().min(width as f64) as u32;
                if dst_x1 <= dst_x0 {
                    continue;
                }

                let tile = self.decode_native_tile(level, tile_x, tile_y).await?;
                let valid = clip_to_extent(&tile, (valid_w, valid_h));
                let scaled = imageops::resize(
                    &*valid,
                    dst_x1 - dst_x0,
                    dst_y1 - dst_y0,
                    FilterType::Triangle,
                );
                imageops::replace(&mut canvas, &scaled, dst_x0 as i64, dst_y0 as i64);
            }
        }

        Ok(canvas)
    }
}

/// Drop the padding of edge tiles.
fn clip_to_extent(tile: &RgbImage, (width, height): (u32, u32)) -> Cow<'_, RgbImage> {
    if tile.width() <= width && tile.height() <= height {
        return Cow::Borrowed(tile);
    }
    let width = width.min(tile.width());
    let height = height.min(tile.height());
    Cow::Owned(imageops::crop_imm(tile, 0, 0, width, height).to_image())
}

// =============================================================================
// Opener
// =============================================================================

/// Opens [`TiffSlide`]s from local paths with fixed options.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiffSlideOpener {
    pub options: TiffSlideOptions,
}

impl TiffSlideOpener {
    pub fn new(options: TiffSlideOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SlideOpener for TiffSlideOpener {
    type Handle = TiffSlide<LocalFileReader>;

    async fn open(&self, path: &Path) -> Result<Self::Handle, SlideError> {
        TiffSlide::open(path, self.options).await
    }
}
