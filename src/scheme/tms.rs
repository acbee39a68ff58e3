//! Tile Map Service layout.
//!
//! Vertical stripes, padded at the top and right so every level is an exact
//! multiple of the tile size. Tiles are addressed `zoom/col/row.ext` with
//! rows counted from the bottom of the image.

use std::path::PathBuf;

use crate::config::TileFormat;
use crate::error::TilingError;
use crate::geometry::TilesetGeometry;
use crate::processor::{Canvas, Gravity};
use crate::stripe::{Orientation, Stripe};

use super::{build_tile_pyramid, write_descriptor, Job, SchemeStrategy, TileLayout};

/// Descriptor file name in the tileset root.
pub const TMS_DESCRIPTOR: &str = "tilemapresource.xml";

pub(crate) struct TmsStrategy;

impl TmsStrategy {
    /// Canvas of one stripe at `level`: one tile wide, whole tile rows high.
    fn canvas(job: &Job<'_>, level: usize) -> Canvas {
        Canvas::new(
            job.config.tile_width,
            job.geometry.y_tiles(level) * job.config.tile_height,
            Gravity::SouthWest,
            job.config.background,
        )
    }
}

impl SchemeStrategy for TmsStrategy {
    fn build(&self, job: &Job<'_>) -> Result<(), TilingError> {
        build_tile_pyramid(self, job)
    }

    fn write_metadata(&self, job: &Job<'_>) -> Result<(), TilingError> {
        let title = job
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let xml = tilemap_resource_xml(&title, &job.geometry, job.config.format);
        write_descriptor(&job.root, TMS_DESCRIPTOR, &xml)
    }
}

impl TileLayout for TmsStrategy {
    fn base_stripes(&self, job: &Job<'_>) -> Result<Vec<Stripe>, TilingError> {
        let canvas = Self::canvas(job, 0);
        job.stripes().stripe_image(
            &job.image,
            Orientation::Vertical,
            job.config.tile_width,
            job.geometry.image_height(),
            Some(&canvas),
            "0",
        )
    }

    fn level_canvas(&self, job: &Job<'_>, level: usize) -> Option<Canvas> {
        Some(Self::canvas(job, level))
    }

    fn tiles_per_stripe(&self, job: &Job<'_>, level: usize) -> usize {
        job.geometry.y_tiles(level) as usize
    }

    fn tile_path(&self, job: &Job<'_>, level: usize, stripe: usize, piece: usize) -> PathBuf {
        // Pieces are cut top-down, TMS rows count bottom-up
        let row = job.geometry.y_tiles(level) as usize - 1 - piece;
        job.root
            .join(job.geometry.zoom_of_level(level).to_string())
            .join(stripe.to_string())
            .join(format!("{}.{}", row, job.config.format.extension()))
    }
}

/// Render `tilemapresource.xml` for a tileset.
pub fn tilemap_resource_xml(title: &str, geometry: &TilesetGeometry, format: TileFormat) -> String {
    let levels = geometry.zoom_levels();
    let tilesets: String = (0..levels)
        .map(|i| {
            format!(
                "    <TileSet href=\"{i}\" units-per-pixel=\"{}.00000000000000\" order=\"{i}\"/>\n",
                1u64 << (levels - 1 - i)
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<TileMap version="1.0.0" tilemapservice="http://tms.osgeo.org/1.0.0">
  <Title>{title}</Title>
  <Abstract></Abstract>
  <SRS></SRS>
  <BoundingBox minx="-{height}.00000000000000" miny="0.00000000000000" maxx="0.00000000000000" maxy="{width}.00000000000000"/>
  <Origin x="-{height}.00000000000000" y="0.00000000000000"/>
  <TileFormat width="{tile_width}" height="{tile_height}" mime-type="{mime}" extension="{ext}"/>
  <TileSets profile="raster">
{tilesets}  </TileSets>
</TileMap>
"#,
        title = title,
        height = geometry.image_height(),
        width = geometry.image_width(),
        tile_width = geometry.tile_width(),
        tile_height = geometry.tile_height(),
        mime = format.mime_type(),
        ext = format.extension(),
        tilesets = tilesets,
    )
}
