//! Google Maps layout.
//!
//! The source is first resized onto a square whose edge is the tile size
//! times a power of two, so every level is an exact quadtree. Tiles are flat
//! files named `zoom_col_row.ext` in the tileset root.

use std::cell::Cell;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::config::BackgroundColor;
use crate::error::TilingError;
use crate::processor::{Canvas, Gravity};
use crate::stripe::{Orientation, Stripe};

use super::{build_tile_pyramid, Job, SchemeStrategy, TileLayout};

/// Edge length of the square a `width` x `height` image is fitted into.
///
/// The nearest `tile * 2^n` to the longer side; ties go to the larger
/// square, and the result is never smaller than one tile.
pub fn square_size(width: u32, height: u32, tile: u32) -> u32 {
    let longest = u64::from(width.max(height));
    let tile = u64::from(tile.max(1));

    let mut size = tile;
    while size < longest {
        size *= 2;
    }
    if size > tile {
        let lower = size / 2;
        if longest - lower < size - longest || size > u64::from(u32::MAX) {
            size = lower;
        }
    }
    size as u32
}

/// Canvas of one base stripe of a `size` square.
///
/// Content is centred across the stripe and anchored at the stripe's start
/// along it, so a short last stripe still meets its neighbour.
fn stripe_canvas(
    orientation: Orientation,
    tile: u32,
    size: u32,
    background: BackgroundColor,
) -> Canvas {
    match orientation {
        Orientation::Vertical => Canvas::new(tile, size, Gravity::West, background),
        Orientation::Horizontal => Canvas::new(size, tile, Gravity::North, background),
    }
}

#[derive(Default)]
pub(crate) struct GoogleMapsStrategy {
    /// Source wider than tall: stripes run vertically
    wide: Cell<bool>,
}

impl GoogleMapsStrategy {
    fn orientation(&self) -> Orientation {
        if self.wide.get() {
            Orientation::Vertical
        } else {
            Orientation::Horizontal
        }
    }
}

impl SchemeStrategy for GoogleMapsStrategy {
    fn prepare(&self, job: &mut Job<'_>) -> Result<(), TilingError> {
        let (tw, th) = (job.config.tile_width, job.config.tile_height);
        if tw != th {
            return Err(TilingError::InvalidDimension(format!(
                "gmap tiles must be square, got {}x{}",
                tw, th
            )));
        }

        let (width, height) = (job.geometry.image_width(), job.geometry.image_height());
        self.wide.set(width > height);
        let size = square_size(width, height, tw);

        let target = job.workspace.artifact_path("square");
        job.workspace.track(&target);
        job.processor.resize(&job.image, &target, size, size)?;
        debug!(
            "Fitted {}x{} source into {}x{} square",
            width, height, size, size
        );

        job.image = target;
        job.geometry.recompute(size, size)
    }

    fn build(&self, job: &Job<'_>) -> Result<(), TilingError> {
        build_tile_pyramid(self, job)?;
        if let Err(e) = job.workspace.discard(&job.image) {
            warn!("{}", e);
        }
        Ok(())
    }
}

impl TileLayout for GoogleMapsStrategy {
    fn base_stripes(&self, job: &Job<'_>) -> Result<Vec<Stripe>, TilingError> {
        let (width, height) = job.processor.identify(&job.image)?;
        let tile = job.config.tile_width;
        let size = job.geometry.image_width();
        let bg = job.config.background;

        let orientation = self.orientation();
        let (stripe_w, stripe_h) = match orientation {
            Orientation::Vertical => (tile, height),
            Orientation::Horizontal => (width, tile),
        };
        let canvas = stripe_canvas(orientation, tile, size, bg);
        job.stripes()
            .stripe_image(&job.image, orientation, stripe_w, stripe_h, Some(&canvas), "0")
    }

    fn tiles_per_stripe(&self, job: &Job<'_>, level: usize) -> usize {
        job.geometry.x_tiles(level) as usize
    }

    fn tile_path(&self, job: &Job<'_>, level: usize, stripe: usize, piece: usize) -> PathBuf {
        let (col, row) = match self.orientation() {
            Orientation::Vertical => (stripe, piece),
            Orientation::Horizontal => (piece, stripe),
        };
        job.root.join(format!(
            "{}_{}_{}.{}",
            job.geometry.zoom_of_level(level),
            col,
            row,
            self.tile_extension(job)
        ))
    }
}
