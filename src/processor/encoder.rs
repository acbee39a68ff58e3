//! Image file encoder.
//!
//! Writes decoded rasters to disk in the format implied by the target's
//! extension.
//!
//! # Design Decisions
//!
//! - **Extension decides format**: `.jpg`/`.jpeg` → JPEG at the configured
//!   quality, `.png` → PNG, `.tif`/`.tiff` → uncompressed RGBA TIFF (used
//!   for intermediate stripes, so no generational loss between levels).
//!
//! - **JPEG drops alpha**: JPEG output is converted to RGB. Callers that care
//!   about transparent padding should pick PNG tiles.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::config::{DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY};
use crate::error::ProcessorError;

// =============================================================================
// Tile Encoder
// =============================================================================

/// Encoder for tiles and intermediate rasters.
#[derive(Debug, Clone, Copy)]
pub struct TileEncoder {
    quality: u8,
}

impl Default for TileEncoder {
    fn default() -> Self {
        TileEncoder::new(DEFAULT_JPEG_QUALITY)
    }
}

impl TileEncoder {
    /// Create an encoder writing JPEG at `quality` (clamped to 1-100).
    pub fn new(quality: u8) -> Self {
        TileEncoder {
            quality: clamp_quality(quality),
        }
    }

    /// JPEG quality in use.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Write `img` to `path` in the format implied by its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The extension is not a supported output format
    /// - The file cannot be created
    /// - Encoding fails
    pub fn save(&self, img: &DynamicImage, path: &Path) -> Result<(), ProcessorError> {
        let format = output_format(path)?;

        let file = File::create(path).map_err(|e| ProcessorError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut writer = BufWriter::new(file);

        let encode_err = |message: String| ProcessorError::Encode {
            path: path.to_path_buf(),
            message,
        };

        match format {
            ImageFormat::Jpeg => {
                let rgb = img.to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut writer, self.quality);
                encoder
                    .encode_image(&rgb)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
            ImageFormat::Png => {
                img.write_to(&mut writer, ImageFormat::Png)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
            _ => {
                DynamicImage::ImageRgba8(img.to_rgba8())
                    .write_to(&mut writer, ImageFormat::Tiff)
                    .map_err(|e| encode_err(e.to_string()))?;
            }
        }

        writer.flush().map_err(|e| ProcessorError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Decode an image file.
    pub fn open(&self, path: &Path) -> Result<DynamicImage, ProcessorError> {
        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| ProcessorError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        reader.decode().map_err(|e| ProcessorError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get image dimensions without fully decoding.
    pub fn dimensions(&self, path: &Path) -> Result<(u32, u32), ProcessorError> {
        let reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| ProcessorError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        reader.into_dimensions().map_err(|e| ProcessorError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Output format for a target path.
fn output_format(path: &Path) -> Result<ImageFormat, ProcessorError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        "tif" | "tiff" => Ok(ImageFormat::Tiff),
        _ => Err(ProcessorError::InvalidArgument(format!(
            "unsupported output extension for {}",
            path.display()
        ))),
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
