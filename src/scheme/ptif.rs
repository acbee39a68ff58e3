//! Pyramidal TIFF output.
//!
//! No stripes and no per-tile files: each level is the previous one scaled
//! by half, and all levels are written as the pages of one tiled TIFF.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::TilingError;
use crate::format::tiff::TILE_ALIGNMENT;

use super::{ConversionState, Job, SchemeStrategy};

pub(crate) struct PtifStrategy;

impl SchemeStrategy for PtifStrategy {
    fn prepare(&self, job: &mut Job<'_>) -> Result<(), TilingError> {
        let (tw, th) = (job.config.tile_width, job.config.tile_height);
        if tw % TILE_ALIGNMENT != 0 || th % TILE_ALIGNMENT != 0 {
            return Err(TilingError::InvalidDimension(format!(
                "ptif tile size must be a multiple of {}, got {}x{}",
                TILE_ALIGNMENT, tw, th
            )));
        }
        Ok(())
    }

    fn build(&self, job: &Job<'_>) -> Result<(), TilingError> {
        let mut levels: Vec<PathBuf> = vec![job.image.clone()];
        let (mut width, mut height) = (job.geometry.image_width(), job.geometry.image_height());
        job.advance(ConversionState::TilingLevel(0));

        for level in 1..job.geometry.zoom_levels() {
            width = width.div_ceil(2).max(1);
            height = height.div_ceil(2).max(1);

            let target = job.workspace.artifact_path(&format!("level-{}", level));
            job.workspace.track(&target);
            let previous = &levels[levels.len() - 1];
            job.processor.scale(previous, &target, width, height)?;
            debug!("Level {}: {}x{}", level, width, height);

            levels.push(target);
            job.advance(ConversionState::TilingLevel(level));
        }

        job.processor.assemble_pyramid(
            &levels,
            &job.root,
            job.config.tile_width,
            job.config.tile_height,
        )?;
        debug!("Wrote {} pages to {}", levels.len(), job.root.display());

        // Level 0 is the caller's source
        for level in &levels[1..] {
            if let Err(e) = job.workspace.discard(level) {
                warn!("{}", e);
            }
        }
        Ok(())
    }
}
