//! Page chunking: slice a rendered page into overlapping horizontal strips.
//!
//! ## Why strips?
//!
//! A full page rendered at 2× zoom is far taller than what a VLM reads
//! reliably in one pass: dense tables lose rows near the bottom of the image.
//! Cutting the page into strips of `chunk_height` pixels keeps the text large
//! relative to the image, and the `overlap` band makes sure a row that falls on
//! a cut line appears whole in at least one strip.
//!
//! Planning only needs the page height and width, so it is pure and
//! deterministic; cropping is a separate step on the actual image.

use crate::error::Pdf2TableError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Fraction of the overlap under which two consecutive window bottoms count
/// as near-duplicates.
const DEDUP_OVERLAP_FRACTION: f64 = 0.6;

/// Height and width of a rendered page in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub height: u32,
    pub width: u32,
}

impl PageGeometry {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    /// Geometry of an already-rendered image.
    pub fn of(image: &DynamicImage) -> Self {
        Self {
            height: image.height(),
            width: image.width(),
        }
    }
}

/// A rectangular crop window in page pixel coordinates.
///
/// `top`/`left` are inclusive, `bottom`/`right` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkWindow {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl ChunkWindow {
    /// The window covering a whole page.
    pub fn full(geometry: PageGeometry) -> Self {
        Self {
            top: 0,
            bottom: geometry.height,
            left: 0,
            right: geometry.width,
        }
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    /// Crop the strip this window describes out of the page image.
    pub fn crop(&self, page: &DynamicImage) -> DynamicImage {
        page.crop_imm(self.left, self.top, self.width(), self.height())
    }
}

/// Validated strip height and overlap, both in pixels.
///
/// Deserialisation goes through [`ChunkingConfig::new`], so an invalid pair
/// is rejected there too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChunkingConfig")]
pub struct ChunkingConfig {
    chunk_height: u32,
    overlap: u32,
}

#[derive(Deserialize)]
struct RawChunkingConfig {
    chunk_height: u32,
    overlap: u32,
}

impl TryFrom<RawChunkingConfig> for ChunkingConfig {
    type Error = Pdf2TableError;

    fn try_from(raw: RawChunkingConfig) -> Result<Self, Self::Error> {
        Self::new(raw.chunk_height, raw.overlap)
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_height: 800,
            overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// Validate a chunk height / overlap pair.
    ///
    /// Rejects `chunk_height == 0` and `overlap >= chunk_height`; both would
    /// make every strip either empty or a full repeat of the previous one.
    pub fn new(chunk_height: u32, overlap: u32) -> Result<Self, Pdf2TableError> {
        if chunk_height == 0 {
            return Err(Pdf2TableError::InvalidConfig(
                "Chunk height must be ≥ 1 px".into(),
            ));
        }
        if overlap >= chunk_height {
            return Err(Pdf2TableError::InvalidConfig(format!(
                "Chunk overlap ({overlap} px) must be smaller than chunk height ({chunk_height} px)"
            )));
        }
        Ok(Self {
            chunk_height,
            overlap,
        })
    }

    pub fn chunk_height(&self) -> u32 {
        self.chunk_height
    }

    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Vertical distance between the tops of consecutive provisional windows.
    pub fn stride(&self) -> u32 {
        self.chunk_height.saturating_sub(self.overlap).max(1)
    }
}

/// Number of windows a page of `height` pixels is expected to produce.
///
/// This is the count before near-duplicate windows are skipped, so the real
/// number from [`plan`] can be lower. Progress reporting must clamp.
pub fn estimate_chunk_count(height: u32, chunking: ChunkingConfig) -> usize {
    if height <= chunking.chunk_height {
        return 1;
    }
    let remaining = u64::from(height - chunking.chunk_height);
    let step = u64::from(chunking.stride());
    1 + remaining.div_ceil(step) as usize
}

/// Plan the ordered crop windows for one page.
///
/// Windows advance by [`ChunkingConfig::stride`]. A window whose bottom is
/// within `0.6 × overlap` of the last emitted window's bottom is skipped. When
/// that skipped window was the tail, the last emitted window is stretched to
/// the page bottom so the whole page stays covered.
pub fn plan(geometry: PageGeometry, chunking: ChunkingConfig) -> Vec<ChunkWindow> {
    let PageGeometry { height, width } = geometry;
    if height <= chunking.chunk_height {
        return vec![ChunkWindow::full(geometry)];
    }

    let step = u64::from(chunking.stride());
    let tolerance = f64::from(chunking.overlap) * DEDUP_OVERLAP_FRACTION;
    let estimated = estimate_chunk_count(height, chunking);
    let mut windows: Vec<ChunkWindow> = Vec::with_capacity(estimated);

    for index in 0..estimated as u64 {
        let top = index * step;
        if top >= u64::from(height) {
            break;
        }
        let bottom = (top + u64::from(chunking.chunk_height)).min(u64::from(height));
        // Both values are bounded by `height`, which is a u32.
        let (top, bottom) = (top as u32, bottom as u32);

        if let Some(last) = windows.last() {
            if f64::from(bottom - last.bottom) <= tolerance {
                continue;
            }
        }

        windows.push(ChunkWindow {
            top,
            bottom,
            left: 0,
            right: width,
        });
    }

    if let Some(last) = windows.last_mut() {
        last.bottom = height;
    }

    windows
}
