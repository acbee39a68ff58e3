//! Image processing capability.
//!
//! The pyramid engine never touches pixels itself. Every decode, crop,
//! resize and composite goes through the [`ImageProcessor`] trait, so the
//! stripe algorithm is independent of how the work is actually done
//! (native library, subprocess, remote service).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Converter / StripeManager       │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │          ImageProcessor Trait           │
//! │  identify · crop · resize · montage ·   │
//! │  scale · assemble_pyramid               │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │            RasterProcessor              │
//! │  (image crate + TileEncoder + TIFF)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! All operations are synchronous and fallible. Output files are addressed
//! by path; the output format follows the target's extension.

mod encoder;
mod raster;

use std::path::{Path, PathBuf};

use crate::config::BackgroundColor;
use crate::error::ProcessorError;

pub use encoder::{clamp_quality, is_valid_quality, TileEncoder};
pub use raster::RasterProcessor;

/// Placeholder replaced by the piece index in crop target patterns.
pub const PATTERN_PLACEHOLDER: &str = "%d";

// =============================================================================
// Gravity
// =============================================================================

/// Anchor of an image placed on a larger (or smaller) canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Gravity {
    #[default]
    NorthWest,
    North,
    NorthEast,
    West,
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Gravity {
    /// Top-left position of an `inner` image anchored inside `outer`.
    ///
    /// Negative offsets mean the inner image overhangs the canvas and is
    /// clipped.
    pub fn offset(self, outer: (u32, u32), inner: (u32, u32)) -> (i64, i64) {
        let dx = outer.0 as i64 - inner.0 as i64;
        let dy = outer.1 as i64 - inner.1 as i64;

        let x = match self {
            Gravity::NorthWest | Gravity::West | Gravity::SouthWest => 0,
            Gravity::North | Gravity::Center | Gravity::South => dx / 2,
            Gravity::NorthEast | Gravity::East | Gravity::SouthEast => dx,
        };
        let y = match self {
            Gravity::NorthWest | Gravity::North | Gravity::NorthEast => 0,
            Gravity::West | Gravity::Center | Gravity::East => dy / 2,
            Gravity::SouthWest | Gravity::South | Gravity::SouthEast => dy,
        };
        (x, y)
    }
}

// =============================================================================
// Canvas
// =============================================================================

/// A padded output canvas: exact size, anchor, and fill color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canvas {
    /// Canvas width in pixels
    pub width: u32,

    /// Canvas height in pixels
    pub height: u32,

    /// Where the image sits on the canvas
    pub gravity: Gravity,

    /// Fill where the image does not cover the canvas
    pub background: BackgroundColor,
}

impl Canvas {
    /// Create a canvas description.
    pub fn new(width: u32, height: u32, gravity: Gravity, background: BackgroundColor) -> Self {
        Canvas {
            width,
            height,
            gravity,
            background,
        }
    }

    /// `(width, height)` tuple.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

// =============================================================================
// Tiling
// =============================================================================

/// Grid layout of a montage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    /// Number of cells per row
    pub columns: u32,

    /// Number of cell rows
    pub rows: u32,
}

impl Tiling {
    /// Sources placed left to right.
    pub fn horizontal(count: u32) -> Self {
        Tiling {
            columns: count,
            rows: 1,
        }
    }

    /// Sources placed top to bottom.
    pub fn vertical(count: u32) -> Self {
        Tiling {
            columns: 1,
            rows: count,
        }
    }
}

// =============================================================================
// ImageProcessor Trait
// =============================================================================

/// The external image-processing capability the engine depends on.
///
/// Implementations must be usable from several threads at once: a batch
/// caller may run independent conversions in parallel, each with its own
/// working files.
pub trait ImageProcessor: Send + Sync {
    /// Read the pixel dimensions of an image.
    fn identify(&self, src: &Path) -> Result<(u32, u32), ProcessorError>;

    /// Cut `src` into `width` x `height` pieces in raster order.
    ///
    /// Piece `i` is written to `target_pattern` with `%d` replaced by `i`.
    /// Pieces on the right and bottom edges are truncated, unless a canvas is
    /// given: then every piece is placed on a canvas of exactly that size.
    ///
    /// Returns the number of pieces written.
    fn crop(
        &self,
        src: &Path,
        target_pattern: &Path,
        width: u32,
        height: u32,
        canvas: Option<&Canvas>,
    ) -> Result<usize, ProcessorError>;

    /// Resize `src` to fit within `width` x `height`, keeping the aspect ratio.
    fn resize(&self, src: &Path, target: &Path, width: u32, height: u32)
        -> Result<(), ProcessorError>;

    /// Join `sources` into one image on a grid.
    ///
    /// Sources fill the grid in raster order. Each grid column is as wide as
    /// its widest source and each row as tall as its tallest, so stripes
    /// joined along their stacking axis add up exactly. Smaller sources are
    /// anchored by `gravity` (default north-west) and the rest of the cell is
    /// filled with `background` (default transparent).
    fn montage(
        &self,
        sources: &[PathBuf],
        target: &Path,
        tiling: Tiling,
        gravity: Option<Gravity>,
        background: Option<BackgroundColor>,
    ) -> Result<(), ProcessorError>;

    /// Scale `src` to exactly `width` x `height`.
    fn scale(&self, src: &Path, target: &Path, width: u32, height: u32)
        -> Result<(), ProcessorError>;

    /// Write `levels` (finest first) as the pages of one tiled pyramid file.
    fn assemble_pyramid(
        &self,
        levels: &[PathBuf],
        target: &Path,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<(), ProcessorError>;
}

/// Substitute a piece index into a crop target pattern.
pub fn pattern_path(pattern: &Path, index: usize) -> PathBuf {
    PathBuf::from(
        pattern
            .to_string_lossy()
            .replace(PATTERN_PLACEHOLDER, &index.to_string()),
    )
}

/// Fail with `MissingOutput` unless `path` exists.
pub fn ensure_output(path: &Path) -> Result<(), ProcessorError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ProcessorError::MissingOutput {
            path: path.to_path_buf(),
        })
    }
}
