//! Zoomify layout.
//!
//! Horizontal stripes, no padding: edge tiles keep their natural size. Tiles
//! are numbered in raster order starting at the coarsest zoom and bucketed
//! into `TileGroupN` directories of 256.

use std::path::PathBuf;

use crate::config::{TileFormat, TilerConfig};
use crate::error::TilingError;
use crate::geometry::TilesetGeometry;
use crate::stripe::{Orientation, Stripe};

use super::{build_tile_pyramid, write_descriptor, Job, SchemeStrategy, TileLayout};

/// Descriptor file name in the tileset root.
pub const ZOOMIFY_DESCRIPTOR: &str = "ImageProperties.xml";

/// Maximum tiles per `TileGroup` directory.
pub const TILES_PER_GROUP: u64 = 256;

/// Directory name prefix of tile groups.
pub const TILE_GROUP_PREFIX: &str = "TileGroup";

/// Group holding the tile with raster index `index`.
#[inline]
pub fn tile_group(index: u64) -> u64 {
    index / TILES_PER_GROUP
}

/// Number of groups needed for `total_tiles`.
#[inline]
pub fn tile_group_count(total_tiles: u64) -> u64 {
    total_tiles.div_ceil(TILES_PER_GROUP)
}

/// Number of tiles in the last group.
pub fn last_group_size(total_tiles: u64) -> u64 {
    match tile_group_count(total_tiles) {
        0 => 0,
        groups => total_tiles - (groups - 1) * TILES_PER_GROUP,
    }
}

/// Render `ImageProperties.xml` for a tileset.
pub fn image_properties_xml(geometry: &TilesetGeometry) -> String {
    format!(
        "<IMAGE_PROPERTIES WIDTH=\"{}\" HEIGHT=\"{}\" NUMTILES=\"{}\" NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"{}\" />",
        geometry.image_width(),
        geometry.image_height(),
        geometry.total_tiles(),
        geometry.tile_height()
    )
}

pub(crate) struct ZoomifyStrategy;

impl SchemeStrategy for ZoomifyStrategy {
    fn tile_format(&self, _config: &TilerConfig) -> TileFormat {
        TileFormat::Jpeg
    }

    /// The descriptor carries a single TILESIZE, so tiles must be square.
    fn prepare(&self, job: &mut Job<'_>) -> Result<(), TilingError> {
        let (tw, th) = (job.config.tile_width, job.config.tile_height);
        if tw != th {
            return Err(TilingError::InvalidDimension(format!(
                "zoomify tiles must be square, got {}x{}",
                tw, th
            )));
        }
        Ok(())
    }

    fn build(&self, job: &Job<'_>) -> Result<(), TilingError> {
        build_tile_pyramid(self, job)
    }

    fn write_metadata(&self, job: &Job<'_>) -> Result<(), TilingError> {
        write_descriptor(&job.root, ZOOMIFY_DESCRIPTOR, &image_properties_xml(&job.geometry))
    }
}

impl TileLayout for ZoomifyStrategy {
    fn tile_extension(&self, _job: &Job<'_>) -> &'static str {
        TileFormat::Jpeg.extension()
    }

    fn base_stripes(&self, job: &Job<'_>) -> Result<Vec<Stripe>, TilingError> {
        job.stripes().stripe_image(
            &job.image,
            Orientation::Horizontal,
            job.geometry.image_width(),
            job.config.tile_height,
            None,
            "0",
        )
    }

    fn tiles_per_stripe(&self, job: &Job<'_>, level: usize) -> usize {
        job.geometry.x_tiles(level) as usize
    }

    fn tile_path(&self, job: &Job<'_>, level: usize, stripe: usize, piece: usize) -> PathBuf {
        let g = &job.geometry;
        let index = g.tiles_above(level) + stripe as u64 * g.x_tiles(level) as u64 + piece as u64;
        job.root
            .join(format!("{}{}", TILE_GROUP_PREFIX, tile_group(index)))
            .join(format!(
                "{}-{}-{}.{}",
                g.zoom_of_level(level),
                piece,
                stripe,
                TileFormat::Jpeg.extension()
            ))
    }
}
