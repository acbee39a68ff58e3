//! Zoom-level geometry of a tile pyramid.
//!
//! The geometry is indexed finest-first: level 0 is the full-resolution grid,
//! the last level is the single `1x1` tile at the top of the pyramid. On-disk
//! zoom numbers run the other way (zoom 0 is the coarsest); use
//! [`TilesetGeometry::zoom_of_level`] to translate.
//!
//! # Level Computation
//!
//! ```text
//! x[0] = ceil(width / tile_width)        y[0] = ceil(height / tile_height)
//! x[i] = ceil(x[i-1] / 2)                y[i] = ceil(y[i-1] / 2)
//! levels = ceil(log2(max(x[0], y[0]))) + 1
//! ```

use serde::Serialize;

use crate::error::TilingError;

/// Tile grid dimensions of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelGrid {
    /// Number of tile columns
    pub x_tiles: u32,

    /// Number of tile rows
    pub y_tiles: u32,
}

impl LevelGrid {
    /// Number of tiles in this level.
    #[inline]
    pub fn tile_count(&self) -> u64 {
        self.x_tiles as u64 * self.y_tiles as u64
    }

    /// Grid of the next coarser level (both axes halved, rounding up).
    #[inline]
    pub fn halved(&self) -> LevelGrid {
        LevelGrid {
            x_tiles: self.x_tiles.div_ceil(2),
            y_tiles: self.y_tiles.div_ceil(2),
        }
    }
}

/// Immutable per-conversion description of a tile pyramid.
///
/// Only [`TilesetGeometry::recompute`] changes it, and it replaces all
/// derived state rather than adjusting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TilesetGeometry {
    image_width: u32,
    image_height: u32,
    tile_width: u32,
    tile_height: u32,
    levels: Vec<LevelGrid>,
    total_tiles: u64,
}

impl TilesetGeometry {
    /// Compute the pyramid geometry for an image and tile size.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::InvalidDimension`] if any argument is zero.
    pub fn compute(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, TilingError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(TilingError::InvalidDimension(format!(
                "tile size must be positive, got {}x{}",
                tile_width, tile_height
            )));
        }

        let mut geometry = TilesetGeometry {
            image_width: 0,
            image_height: 0,
            tile_width,
            tile_height,
            levels: Vec::new(),
            total_tiles: 0,
        };
        geometry.recompute(width, height)?;
        Ok(geometry)
    }

    /// Replace the image dimensions and rebuild every level from scratch.
    ///
    /// Needed by schemes that resize the source before tiling. Calling it
    /// twice with the same arguments leaves the geometry unchanged.
    pub fn recompute(&mut self, width: u32, height: u32) -> Result<(), TilingError> {
        if width == 0 || height == 0 {
            return Err(TilingError::InvalidDimension(format!(
                "image size must be positive, got {}x{}",
                width, height
            )));
        }

        let base = LevelGrid {
            x_tiles: width.div_ceil(self.tile_width),
            y_tiles: height.div_ceil(self.tile_height),
        };
        let count = level_count(base.x_tiles.max(base.y_tiles));

        let mut levels = Vec::with_capacity(count);
        let mut grid = base;
        levels.push(grid);
        for _ in 1..count {
            grid = grid.halved();
            levels.push(grid);
        }

        self.image_width = width;
        self.image_height = height;
        self.total_tiles = levels.iter().map(LevelGrid::tile_count).sum();
        self.levels = levels;
        Ok(())
    }

    /// Image width in pixels.
    pub fn image_width(&self) -> u32 {
        self.image_width
    }

    /// Image height in pixels.
    pub fn image_height(&self) -> u32 {
        self.image_height
    }

    /// Tile width in pixels.
    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    /// Tile height in pixels.
    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Number of pyramid levels.
    pub fn zoom_levels(&self) -> usize {
        self.levels.len()
    }

    /// All levels, finest first.
    pub fn levels(&self) -> &[LevelGrid] {
        &self.levels
    }

    /// Grid of a level (0 = finest).
    ///
    /// # Panics
    ///
    /// Panics if `level >= zoom_levels()`.
    pub fn level(&self, level: usize) -> LevelGrid {
        self.levels[level]
    }

    /// Tile columns at a level (0 = finest).
    pub fn x_tiles(&self, level: usize) -> u32 {
        self.levels[level].x_tiles
    }

    /// Tile rows at a level (0 = finest).
    pub fn y_tiles(&self, level: usize) -> u32 {
        self.levels[level].y_tiles
    }

    /// Total number of tiles across all levels.
    pub fn total_tiles(&self) -> u64 {
        self.total_tiles
    }

    /// On-disk zoom number of a geometry level (zoom 0 = coarsest).
    #[inline]
    pub fn zoom_of_level(&self, level: usize) -> usize {
        self.levels.len() - 1 - level
    }

    /// Geometry level of an on-disk zoom number.
    #[inline]
    pub fn level_of_zoom(&self, zoom: usize) -> usize {
        self.levels.len() - 1 - zoom
    }

    /// Number of tiles in all levels coarser than `level`.
    ///
    /// This is the raster index of the first tile of `level` when tiles are
    /// counted from the coarsest zoom downwards.
    pub fn tiles_above(&self, level: usize) -> u64 {
        self.levels[level + 1..]
            .iter()
            .map(LevelGrid::tile_count)
            .sum()
    }
}

/// Number of levels needed to reduce `max_tiles` to a single tile.
///
/// Equals `ceil(log2(max_tiles)) + 1`, computed in integers so that a
/// single-tile base yields exactly one level.
fn level_count(max_tiles: u32) -> usize {
    if max_tiles <= 1 {
        return 1;
    }
    (u32::BITS - (max_tiles - 1).leading_zeros()) as usize + 1
}
