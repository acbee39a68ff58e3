//! # Pyramid Tiler
//!
//! Cuts a single large raster image into a multi-resolution pyramid of
//! fixed-size tiles, laid out according to one of several addressing schemes.
//!
//! ## Features
//!
//! - **Four schemes**: TMS, Zoomify, Google Maps quadtree, and pyramidal TIFF
//! - **Stripe-based pyramid**: the source is decoded once; every coarser
//!   level is built from pairs of stripes of the level below
//! - **Validators**: independently recompute the expected geometry of a
//!   finished tileset and check that every tile exists
//! - **Pluggable imaging**: all pixel work goes through the
//!   [`ImageProcessor`] trait; [`RasterProcessor`] implements it with the
//!   `image` crate
//!
//! ## Architecture
//!
//! - [`geometry`] - Zoom-level tile grids
//! - [`workspace`] - Uniquely named intermediate files
//! - [`processor`] - Image processing capability and its native implementation
//! - [`stripe`] - Stripe creation, merging and shrinking
//! - [`scheme`] - The conversion driver and per-scheme strategies
//! - [`mod@format`] - Pyramidal TIFF writer and reader
//! - [`validate`] - Tileset completeness checks
//! - [`config`] - Conversion settings and CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use pyramid_tiler::{Converter, RasterProcessor, TilerConfig, TilingScheme};
//!
//! let config = TilerConfig::new("/tmp/work").with_tile_size(256, 256);
//! let processor = RasterProcessor::new(&config);
//! let converter = Converter::new(TilingScheme::Tms, config, processor);
//!
//! let info = converter.convert(Path::new("map.jpg"), None)?;
//! println!("{} tiles in {}", info.total_tiles, info.output.display());
//! # Ok::<(), pyramid_tiler::TilingError>(())
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod geometry;
pub mod processor;
pub mod scheme;
pub mod stripe;
pub mod validate;
pub mod workspace;

// Re-export commonly used types
pub use config::{
    BackgroundColor, Cli, Command, ConvertConfig, TileFormat, TilerConfig, ValidateConfig,
    DEFAULT_JPEG_QUALITY, DEFAULT_TILE_SIZE, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use error::{ProcessorError, TiffError, TilingError};
pub use format::tiff::{
    read_directories, Compression, PageOptions, PyramidTiffWriter, TileDirectory, TILE_ALIGNMENT,
};
pub use geometry::{LevelGrid, TilesetGeometry};
pub use processor::{
    pattern_path, Canvas, Gravity, ImageProcessor, RasterProcessor, TileEncoder, Tiling,
};
pub use scheme::{square_size, ConversionState, Converter, TilesetInfo, TilingScheme};
pub use stripe::{Orientation, Stripe, StripeManager};
pub use validate::{detect, validate_tileset, validator_for, ValidationReport, Validator};
pub use workspace::Workspace;
