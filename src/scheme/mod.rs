//! Tiling schemes and the conversion driver.
//!
//! A [`Converter`] turns one source image into a finished tileset. The
//! pyramid algorithm is shared; each scheme contributes a strategy that
//! decides the stripe axis, the padding rule, where every tile lands on
//! disk, and which descriptor file is written.
//!
//! # Conversion Flow
//!
//! ```text
//!   INIT ──identify──▶ STRIPED ──▶ TILING_LEVEL(0) ──▶ ... ──▶ TILING_LEVEL(L-1)
//!                                                                   │
//!   FAILED ◀── any error (working files purged)                     ▼
//!                                            DONE ◀── METADATA_WRITTEN
//! ```
//!
//! | Scheme      | Stripes    | Padding                    | Tile address                         |
//! |-------------|------------|----------------------------|--------------------------------------|
//! | TMS         | vertical   | south-west, to tile grid   | `zoom/col/row.ext` (row from bottom) |
//! | Zoomify     | horizontal | none                       | `TileGroupN/zoom-col-row.jpg`        |
//! | Google Maps | longer axis| centred, square power of 2 | `zoom_col_row.ext`                   |
//! | PTIF        | none       | edge tiles                 | one multi-page TIFF file             |

mod gmaps;
mod ptif;
mod tms;
mod zoomify;

use std::cell::Cell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::ValueEnum;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::config::{TileFormat, TilerConfig};
use crate::error::TilingError;
use crate::geometry::{LevelGrid, TilesetGeometry};
use crate::processor::{pattern_path, Canvas, ImageProcessor};
use crate::stripe::{Stripe, StripeManager};
use crate::workspace::Workspace;

use gmaps::GoogleMapsStrategy;
use ptif::PtifStrategy;
use tms::TmsStrategy;
use zoomify::ZoomifyStrategy;

pub use gmaps::square_size;
pub use tms::{tilemap_resource_xml, TMS_DESCRIPTOR};
pub use zoomify::{
    image_properties_xml, last_group_size, tile_group, tile_group_count, TILES_PER_GROUP,
    TILE_GROUP_PREFIX, ZOOMIFY_DESCRIPTOR,
};

// =============================================================================
// Tiling Scheme
// =============================================================================

/// On-disk tile addressing convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TilingScheme {
    /// Tile Map Service: `zoom/col/row` directories
    Tms,
    /// Zoomify: tiles bucketed into `TileGroupN` directories
    Zoomify,
    /// Google Maps: flat `zoom_col_row` files on a square power-of-two grid
    #[value(name = "gmap")]
    #[serde(rename = "gmap")]
    GoogleMaps,
    /// Pyramidal TIFF: one multi-page tiled file
    Ptif,
}

impl TilingScheme {
    /// All schemes, in detection order.
    pub const ALL: [TilingScheme; 4] = [
        TilingScheme::Tms,
        TilingScheme::Zoomify,
        TilingScheme::GoogleMaps,
        TilingScheme::Ptif,
    ];

    /// Short name used on the command line.
    pub const fn name(self) -> &'static str {
        match self {
            TilingScheme::Tms => "tms",
            TilingScheme::Zoomify => "zoomify",
            TilingScheme::GoogleMaps => "gmap",
            TilingScheme::Ptif => "ptif",
        }
    }

    /// Whether the result is a single file rather than a directory.
    pub const fn is_single_file(self) -> bool {
        matches!(self, TilingScheme::Ptif)
    }

    /// Default tileset location for `image` inside `working_dir`.
    pub fn default_target(self, working_dir: &Path, image: &Path) -> PathBuf {
        let stem = image_stem(image);
        if self.is_single_file() {
            working_dir.join(format!("{}.ptif", stem))
        } else {
            working_dir.join(stem)
        }
    }
}

impl fmt::Display for TilingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File name of `image` without its extension.
fn image_stem(image: &Path) -> String {
    image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

// =============================================================================
// Conversion Result
// =============================================================================

/// Progress of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    /// Nothing produced yet
    Init,
    /// Base stripes cut
    Striped,
    /// Tiles of a geometry level (0 = finest) being produced
    TilingLevel(usize),
    /// Descriptor written
    MetadataWritten,
    /// Finished successfully
    Done,
    /// Aborted; working files purged
    Failed,
}

/// Description of a finished tileset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TilesetInfo {
    /// Addressing scheme
    pub scheme: TilingScheme,

    /// Source image
    pub source: PathBuf,

    /// Tileset root directory (or PTIF file)
    pub output: PathBuf,

    /// Tiled image width (after any scheme resize)
    pub image_width: u32,

    /// Tiled image height (after any scheme resize)
    pub image_height: u32,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Tile file format
    pub format: TileFormat,

    /// Number of zoom levels
    pub zoom_levels: usize,

    /// Number of tiles across all levels
    pub total_tiles: u64,

    /// Tile grid per level, finest first
    pub levels: Vec<LevelGrid>,

    /// Wall-clock conversion time
    pub elapsed_ms: u64,
}

// =============================================================================
// Strategy Seams
// =============================================================================

/// State of one in-flight conversion, shared with the scheme strategy.
pub(crate) struct Job<'a> {
    pub scheme: TilingScheme,
    pub config: &'a TilerConfig,
    pub processor: &'a dyn ImageProcessor,
    pub workspace: Workspace,
    /// Original source image
    pub source: PathBuf,
    /// Image the pyramid is built from (a resized copy for some schemes)
    pub image: PathBuf,
    pub geometry: TilesetGeometry,
    /// Tileset root directory or PTIF file
    pub root: PathBuf,
    state: Cell<ConversionState>,
}

impl<'a> Job<'a> {
    pub fn stripes(&self) -> StripeManager<'_> {
        StripeManager::new(self.processor, &self.workspace, self.config.background)
    }

    pub fn advance(&self, next: ConversionState) {
        debug!("{}: {:?} -> {:?}", self.source.display(), self.state.get(), next);
        self.state.set(next);
    }
}

/// Scheme-specific behaviour plugged into the [`Converter`].
pub(crate) trait SchemeStrategy {
    /// Format of the tile files this scheme writes.
    fn tile_format(&self, config: &TilerConfig) -> TileFormat {
        config.format
    }

    /// Validate settings and adjust the job before any file is produced.
    fn prepare(&self, _job: &mut Job<'_>) -> Result<(), TilingError> {
        Ok(())
    }

    /// Produce every level of the pyramid.
    fn build(&self, job: &Job<'_>) -> Result<(), TilingError>;

    /// Write the scheme's descriptor file, if any.
    fn write_metadata(&self, _job: &Job<'_>) -> Result<(), TilingError> {
        Ok(())
    }
}

/// Stripe layout and tile addressing of a directory-based scheme.
pub(crate) trait TileLayout {
    /// File extension of produced tiles.
    fn tile_extension(&self, job: &Job<'_>) -> &'static str {
        job.config.format.extension()
    }

    /// Cut the base image into finest-level stripes.
    fn base_stripes(&self, job: &Job<'_>) -> Result<Vec<Stripe>, TilingError>;

    /// Canvas the stripes of `level` are padded to, if any.
    fn level_canvas(&self, _job: &Job<'_>, _level: usize) -> Option<Canvas> {
        None
    }

    /// Number of tiles each stripe of `level` is cut into.
    fn tiles_per_stripe(&self, job: &Job<'_>, level: usize) -> usize;

    /// Final location of tile `piece` (raster order within the stripe) of
    /// stripe `stripe` at geometry `level`.
    fn tile_path(&self, job: &Job<'_>, level: usize, stripe: usize, piece: usize) -> PathBuf;
}

/// The shared stripe pyramid: tile the finest level, then repeatedly merge
/// stripes into the next coarser level and tile that, until the top.
pub(crate) fn build_tile_pyramid(layout: &dyn TileLayout, job: &Job<'_>) -> Result<(), TilingError> {
    let manager = job.stripes();

    let mut stripes = layout.base_stripes(job)?;
    job.advance(ConversionState::Striped);

    for level in 0..job.geometry.zoom_levels() {
        if level > 0 {
            let canvas = layout.level_canvas(job, level);
            let next = manager.next_level(&stripes, canvas.as_ref(), level)?;
            manager.release(&stripes);
            stripes = next;
        }

        job.advance(ConversionState::TilingLevel(level));
        debug!(
            "Tiling level {} ({} stripes, zoom {})",
            level,
            stripes.len(),
            job.geometry.zoom_of_level(level)
        );
        for (index, stripe) in stripes.iter().enumerate() {
            cut_tiles(layout, job, level, index, stripe)?;
        }
    }

    manager.release(&stripes);
    Ok(())
}

/// Crop one stripe into tiles and move each to its scheme address.
fn cut_tiles(
    layout: &dyn TileLayout,
    job: &Job<'_>,
    level: usize,
    index: usize,
    stripe: &Stripe,
) -> Result<(), TilingError> {
    let pattern = job
        .workspace
        .tile_pattern(&format!("{}-{}", level, index), layout.tile_extension(job));
    let count = job.processor.crop(
        stripe.path(),
        &pattern,
        job.config.tile_width,
        job.config.tile_height,
        None,
    )?;

    let expected = layout.tiles_per_stripe(job, level);
    if count != expected {
        return Err(TilingError::processing(
            "tile",
            format!(
                "{} produced {} tiles, expected {}",
                stripe.path().display(),
                count,
                expected
            ),
        ));
    }

    for piece in 0..count {
        let from = pattern_path(&pattern, piece);
        job.workspace.track(&from);
        let to = layout.tile_path(job, level, index, piece);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| TilingError::io(parent, e))?;
        }
        move_file(&from, &to)?;
        job.workspace.forget(&from);
    }
    Ok(())
}

/// Move a file, copying when a rename across filesystems is refused.
fn move_file(from: &Path, to: &Path) -> Result<(), TilingError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| TilingError::io(to, e))?;
    fs::remove_file(from).map_err(|e| TilingError::io(from, e))
}

/// Write a descriptor file into the tileset root.
pub(crate) fn write_descriptor(root: &Path, name: &str, content: &str) -> Result<(), TilingError> {
    let path = root.join(name);
    fs::write(&path, content).map_err(|e| TilingError::io(&path, e))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn strategy_for(scheme: TilingScheme) -> Box<dyn SchemeStrategy> {
    match scheme {
        TilingScheme::Tms => Box::new(TmsStrategy),
        TilingScheme::Zoomify => Box::new(ZoomifyStrategy),
        TilingScheme::GoogleMaps => Box::new(GoogleMapsStrategy::default()),
        TilingScheme::Ptif => Box::new(PtifStrategy),
    }
}

// =============================================================================
// Converter
// =============================================================================

/// Converts source images into tilesets of one scheme.
///
/// The converter holds no per-image state; one instance may convert many
/// images in sequence, and separate instances may run in parallel against
/// the same working directory.
pub struct Converter<P: ImageProcessor> {
    scheme: TilingScheme,
    config: TilerConfig,
    processor: P,
}

impl<P: ImageProcessor> Converter<P> {
    /// Create a converter.
    pub fn new(scheme: TilingScheme, config: TilerConfig, processor: P) -> Self {
        Converter {
            scheme,
            config,
            processor,
        }
    }

    /// Scheme of the produced tilesets.
    pub fn scheme(&self) -> TilingScheme {
        self.scheme
    }

    /// Conversion settings.
    pub fn config(&self) -> &TilerConfig {
        &self.config
    }

    /// The image processing capability.
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Convert `image` into a tileset.
    ///
    /// Without `output`, the tileset is created at the scheme's default
    /// location in the working directory, which must not exist yet. An
    /// explicit output directory is created if missing and reused if present.
    ///
    /// # Errors
    ///
    /// Any failure aborts the conversion. Working files are purged; tiles of
    /// completed levels are left in place.
    pub fn convert(&self, image: &Path, output: Option<&Path>) -> Result<TilesetInfo, TilingError> {
        let started = Instant::now();
        self.config
            .validate()
            .map_err(TilingError::InvalidDimension)?;

        let (width, height) = self.processor.identify(image)?;
        let geometry = TilesetGeometry::compute(
            width,
            height,
            self.config.tile_width,
            self.config.tile_height,
        )?;

        let root = self.prepare_target(image, output)?;
        let workspace = Workspace::open(self.config.working_dir(), &image_stem(image))?;

        let mut job = Job {
            scheme: self.scheme,
            config: &self.config,
            processor: &self.processor,
            workspace,
            source: image.to_path_buf(),
            image: image.to_path_buf(),
            geometry,
            root,
            state: Cell::new(ConversionState::Init),
        };

        let strategy = strategy_for(self.scheme);
        match run(strategy.as_ref(), &mut job) {
            Ok(()) => {
                job.advance(ConversionState::Done);
                let elapsed_ms = started.elapsed().as_millis() as u64;
                info!("Took {} ms.", elapsed_ms);
                Ok(self.tileset_info(strategy.as_ref(), &job, elapsed_ms))
            }
            Err(e) => {
                job.advance(ConversionState::Failed);
                error!("Failed to tile {}: {}", image.display(), e);
                let leftovers = job.workspace.purge();
                if leftovers > 0 {
                    debug!("{} working files could not be removed", leftovers);
                }
                Err(e)
            }
        }
    }

    /// Resolve and create the tileset location.
    fn prepare_target(&self, image: &Path, output: Option<&Path>) -> Result<PathBuf, TilingError> {
        let working_dir = self.config.working_dir();
        if !working_dir.exists() {
            fs::create_dir_all(working_dir).map_err(|e| TilingError::io(working_dir, e))?;
        }

        let (root, explicit) = match output {
            Some(path) => (path.to_path_buf(), true),
            None => (self.scheme.default_target(working_dir, image), false),
        };

        if !explicit && root.exists() {
            return Err(TilingError::DirectoryConflict { path: root });
        }

        if self.scheme.is_single_file() {
            if let Some(parent) = root.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| TilingError::io(parent, e))?;
            }
        } else if !root.exists() {
            fs::create_dir_all(&root).map_err(|e| TilingError::io(&root, e))?;
        }
        Ok(root)
    }

    fn tileset_info(&self, strategy: &dyn SchemeStrategy, job: &Job<'_>, elapsed_ms: u64) -> TilesetInfo {
        let g = &job.geometry;
        TilesetInfo {
            scheme: self.scheme,
            source: job.source.clone(),
            output: job.root.clone(),
            image_width: g.image_width(),
            image_height: g.image_height(),
            tile_width: g.tile_width(),
            tile_height: g.tile_height(),
            format: strategy.tile_format(&self.config),
            zoom_levels: g.zoom_levels(),
            total_tiles: g.total_tiles(),
            levels: g.levels().to_vec(),
            elapsed_ms,
        }
    }
}

/// Drive one conversion through its states.
fn run(strategy: &dyn SchemeStrategy, job: &mut Job<'_>) -> Result<(), TilingError> {
    strategy.prepare(job)?;

    let g = &job.geometry;
    info!(
        "Generating {} tiles for {}: {}x{}, {}x{} base tiles, {} zoom levels, {} tiles total",
        job.scheme,
        job.source.display(),
        g.image_width(),
        g.image_height(),
        g.x_tiles(0),
        g.y_tiles(0),
        g.zoom_levels(),
        g.total_tiles()
    );

    strategy.build(job)?;
    strategy.write_metadata(job)?;
    job.advance(ConversionState::MetadataWritten);
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
