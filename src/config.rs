//! Configuration for pyramid conversions.
//!
//! Two layers live here:
//! - [`TilerConfig`]: the immutable value threaded through every operation of
//!   one conversion (working directory, tile size, format, quality, background)
//! - [`Cli`]: command-line arguments via clap, with `PYRAMID_` environment
//!   variable fallbacks
//!
//! # Environment Variables
//!
//! - `PYRAMID_WORKING_DIR` - Directory for intermediate stripes (default: .)
//! - `PYRAMID_TILE_WIDTH` / `PYRAMID_TILE_HEIGHT` - Tile size (default: 256)
//! - `PYRAMID_FORMAT` - Tile format, `jpeg` or `png` (default: jpeg)
//! - `PYRAMID_QUALITY` - JPEG quality (default: 75)
//! - `PYRAMID_BACKGROUND` - Canvas fill color (default: #ffffffff)
//! - `PYRAMID_JOBS` - Images converted concurrently (default: 1)

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use image::Rgba;
use serde::Serialize;

use crate::processor::{clamp_quality, is_valid_quality};
use crate::scheme::TilingScheme;

// =============================================================================
// Default Values
// =============================================================================

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Default canvas background (opaque white).
pub const DEFAULT_BACKGROUND: &str = "#ffffffff";

// =============================================================================
// Tile Format
// =============================================================================

/// File format of the produced tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    /// JPEG tiles (`image/jpeg`, `.jpg`)
    #[default]
    Jpeg,
    /// PNG tiles (`image/png`, `.png`)
    Png,
}

impl TileFormat {
    /// MIME type written into descriptors.
    pub const fn mime_type(self) -> &'static str {
        match self {
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Png => "image/png",
        }
    }

    /// File extension without the leading dot.
    pub const fn extension(self) -> &'static str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
        }
    }

    /// Guess a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(TileFormat::Jpeg),
            "png" => Some(TileFormat::Png),
            _ => None,
        }
    }
}

// =============================================================================
// Background Color
// =============================================================================

/// Canvas fill color used wherever padding is synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackgroundColor(pub [u8; 4]);

impl BackgroundColor {
    /// Opaque white.
    pub const WHITE: BackgroundColor = BackgroundColor([255, 255, 255, 255]);

    /// Fully transparent black.
    pub const TRANSPARENT: BackgroundColor = BackgroundColor([0, 0, 0, 0]);

    /// The color as an `image` pixel.
    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba(self.0)
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        BackgroundColor::WHITE
    }
}

impl FromStr for BackgroundColor {
    type Err = String;

    /// Parse `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(format!(
                "invalid color '{}': expected #rrggbb or #rrggbbaa",
                s
            ));
        }

        let mut rgba = [255u8; 4];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let pair = std::str::from_utf8(chunk).map_err(|e| e.to_string())?;
            rgba[i] = u8::from_str_radix(pair, 16)
                .map_err(|_| format!("invalid color '{}': bad hex digits '{}'", s, pair))?;
        }
        Ok(BackgroundColor(rgba))
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", r, g, b, a)
    }
}

// =============================================================================
// Tiler Configuration
// =============================================================================

/// Settings for one conversion.
///
/// Constructed once and passed by reference to every stage; nothing mutates
/// it during a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct TilerConfig {
    /// Directory holding intermediate stripe files
    pub working_dir: PathBuf,

    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Output tile format
    pub format: TileFormat,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Fill color for padded canvases
    pub background: BackgroundColor,
}

impl Default for TilerConfig {
    fn default() -> Self {
        TilerConfig {
            working_dir: PathBuf::from("."),
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            format: TileFormat::Jpeg,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            background: BackgroundColor::WHITE,
        }
    }
}

impl TilerConfig {
    /// Default settings with the given working directory.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        TilerConfig {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    /// Set the tile size.
    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Set the tile format.
    pub fn with_format(mut self, format: TileFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the JPEG quality. Values outside 1-100 are clamped.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = clamp_quality(quality);
        self
    }

    /// Set the canvas background color.
    pub fn with_background(mut self, background: BackgroundColor) -> Self {
        self.background = background;
        self
    }

    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            ));
        }
        if !is_valid_quality(self.jpeg_quality) {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }
        Ok(())
    }

    /// Working directory as a path.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Pyramid Tiler - cut large images into multi-resolution tile pyramids.
#[derive(Parser, Debug, Clone)]
#[command(name = "pyramid-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Convert one or more images into tilesets.
    Convert(ConvertConfig),

    /// Check a finished tileset for completeness.
    Validate(ValidateConfig),
}

impl Command {
    /// Default tracing filter of the subcommand; `RUST_LOG` overrides it.
    ///
    /// Every subcommand logs at info, `--verbose` raises it to debug.
    pub fn log_filter(&self) -> &'static str {
        let verbose = match self {
            Command::Convert(config) => config.verbose,
            Command::Validate(config) => config.verbose,
        };
        if verbose {
            "pyramid_tiler=debug"
        } else {
            "pyramid_tiler=info"
        }
    }
}

/// Arguments of the `convert` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConvertConfig {
    /// Addressing scheme of the produced tileset.
    #[arg(short, long, value_enum, env = "PYRAMID_SCHEME")]
    pub scheme: TilingScheme,

    /// Source images.
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Target directory (or file, for ptif). Only valid with a single image.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for intermediate files and default tileset location.
    #[arg(short, long, default_value = ".", env = "PYRAMID_WORKING_DIR")]
    pub working_dir: PathBuf,

    /// Tile width in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "PYRAMID_TILE_WIDTH")]
    pub tile_width: u32,

    /// Tile height in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "PYRAMID_TILE_HEIGHT")]
    pub tile_height: u32,

    /// Tile file format.
    #[arg(short, long, value_enum, default_value_t = TileFormat::Jpeg, env = "PYRAMID_FORMAT")]
    pub format: TileFormat,

    /// JPEG quality (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, env = "PYRAMID_QUALITY")]
    pub quality: u8,

    /// Canvas background color (#rrggbb or #rrggbbaa).
    #[arg(short, long, default_value = DEFAULT_BACKGROUND, env = "PYRAMID_BACKGROUND")]
    pub background: String,

    /// Number of images converted concurrently.
    #[arg(short, long, default_value_t = 1, env = "PYRAMID_JOBS")]
    pub jobs: usize,

    /// Run the scheme's validator on each finished tileset.
    #[arg(long, default_value_t = false)]
    pub validate: bool,

    /// Print tileset information as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ConvertConfig {
    /// Validate the arguments and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.output.is_some() && self.images.len() > 1 {
            return Err("--output can only be used with a single image".to_string());
        }
        if self.jobs == 0 {
            return Err("jobs must be greater than 0".to_string());
        }
        if !is_valid_quality(self.quality) {
            return Err("quality must be between 1 and 100".to_string());
        }
        self.background.parse::<BackgroundColor>()?;
        self.tiler_config()?.validate()
    }

    /// Build the per-conversion configuration.
    pub fn tiler_config(&self) -> Result<TilerConfig, String> {
        let background = self.background.parse::<BackgroundColor>()?;
        Ok(TilerConfig::new(&self.working_dir)
            .with_tile_size(self.tile_width, self.tile_height)
            .with_format(self.format)
            .with_quality(self.quality)
            .with_background(background))
    }
}

/// Arguments of the `validate` subcommand.
#[derive(Args, Debug, Clone)]
pub struct ValidateConfig {
    /// Tileset directory (or pyramidal TIFF file).
    pub tileset: PathBuf,

    /// Scheme to validate against; detected when omitted.
    #[arg(short, long, value_enum)]
    pub scheme: Option<TilingScheme>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
