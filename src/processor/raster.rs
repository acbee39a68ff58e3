//! In-process [`ImageProcessor`] backed by the `image` crate.
//!
//! Every operation decodes its inputs fully, works on an RGBA buffer and
//! writes the result through [`TileEncoder`]. Stripes are small by
//! construction, so only the very first crop of a conversion ever holds the
//! whole source image in memory.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::config::{BackgroundColor, TileFormat, TilerConfig};
use crate::error::ProcessorError;
use crate::format::tiff::{Compression, PageOptions, PyramidTiffWriter};

use super::encoder::TileEncoder;
use super::{ensure_output, pattern_path, Canvas, Gravity, ImageProcessor, Tiling};

/// Native image processor.
#[derive(Debug, Clone)]
pub struct RasterProcessor {
    encoder: TileEncoder,
    format: TileFormat,
    background: BackgroundColor,
}

impl RasterProcessor {
    /// Create a processor encoding with the conversion's quality and format.
    pub fn new(config: &TilerConfig) -> Self {
        RasterProcessor {
            encoder: TileEncoder::new(config.jpeg_quality),
            format: config.format,
            background: config.background,
        }
    }

    fn save(&self, img: &DynamicImage, target: &Path) -> Result<(), ProcessorError> {
        self.encoder.save(img, target)?;
        ensure_output(target)
    }
}

fn require_size(width: u32, height: u32) -> Result<(), ProcessorError> {
    if width == 0 || height == 0 {
        return Err(ProcessorError::InvalidArgument(format!(
            "size must be positive, got {}x{}",
            width, height
        )));
    }
    Ok(())
}

impl ImageProcessor for RasterProcessor {
    fn identify(&self, src: &Path) -> Result<(u32, u32), ProcessorError> {
        self.encoder.dimensions(src)
    }

    fn crop(
        &self,
        src: &Path,
        target_pattern: &Path,
        width: u32,
        height: u32,
        canvas: Option<&Canvas>,
    ) -> Result<usize, ProcessorError> {
        require_size(width, height)?;
        let img = self.encoder.open(src)?;
        let (src_w, src_h) = (img.width(), img.height());

        let columns = src_w.div_ceil(width);
        let rows = src_h.div_ceil(height);
        debug!(
            "Cropping {} ({}x{}) into {}x{} pieces of {}x{}",
            src.display(),
            src_w,
            src_h,
            columns,
            rows,
            width,
            height
        );

        let mut index = 0;
        for row in 0..rows {
            for col in 0..columns {
                let x = col * width;
                let y = row * height;
                let piece = img.crop_imm(x, y, width.min(src_w - x), height.min(src_h - y));

                let piece = match canvas {
                    Some(canvas) => {
                        let mut base = RgbaImage::from_pixel(
                            canvas.width,
                            canvas.height,
                            canvas.background.to_rgba(),
                        );
                        let (ox, oy) = canvas
                            .gravity
                            .offset(canvas.size(), (piece.width(), piece.height()));
                        imageops::replace(&mut base, &piece.to_rgba8(), ox, oy);
                        DynamicImage::ImageRgba8(base)
                    }
                    None => piece,
                };

                self.save(&piece, &pattern_path(target_pattern, index))?;
                index += 1;
            }
        }
        Ok(index)
    }

    fn resize(
        &self,
        src: &Path,
        target: &Path,
        width: u32,
        height: u32,
    ) -> Result<(), ProcessorError> {
        require_size(width, height)?;
        let img = self.encoder.open(src)?;
        let resized = img.resize(width, height, FilterType::Lanczos3);
        self.save(&resized, target)
    }

    fn montage(
        &self,
        sources: &[PathBuf],
        target: &Path,
        tiling: Tiling,
        gravity: Option<Gravity>,
        background: Option<BackgroundColor>,
    ) -> Result<(), ProcessorError> {
        let capacity = tiling.columns as usize * tiling.rows as usize;
        if sources.is_empty() || sources.len() > capacity {
            return Err(ProcessorError::InvalidArgument(format!(
                "cannot place {} images on a {}x{} grid",
                sources.len(),
                tiling.columns,
                tiling.rows
            )));
        }

        let images = sources
            .iter()
            .map(|path| self.encoder.open(path).map(|img| img.to_rgba8()))
            .collect::<Result<Vec<_>, _>>()?;

        // Each grid column is as wide as its widest image, each row as tall
        // as its tallest.
        let mut col_widths = vec![0u32; tiling.columns as usize];
        let mut row_heights = vec![0u32; tiling.rows as usize];
        for (i, img) in images.iter().enumerate() {
            let col = i % tiling.columns as usize;
            let row = i / tiling.columns as usize;
            col_widths[col] = col_widths[col].max(img.width());
            row_heights[row] = row_heights[row].max(img.height());
        }

        let gravity = gravity.unwrap_or_default();
        let fill = background.unwrap_or(BackgroundColor::TRANSPARENT);
        let mut output = RgbaImage::from_pixel(
            col_widths.iter().sum(),
            row_heights.iter().sum(),
            fill.to_rgba(),
        );

        for (i, img) in images.iter().enumerate() {
            let col = i % tiling.columns as usize;
            let row = i / tiling.columns as usize;
            let cell_x: u32 = col_widths[..col].iter().sum();
            let cell_y: u32 = row_heights[..row].iter().sum();
            let (ox, oy) = gravity.offset((col_widths[col], row_heights[row]), img.dimensions());
            imageops::replace(&mut output, img, cell_x as i64 + ox, cell_y as i64 + oy);
        }

        self.save(&DynamicImage::ImageRgba8(output), target)
    }

    fn scale(
        &self,
        src: &Path,
        target: &Path,
        width: u32,
        height: u32,
    ) -> Result<(), ProcessorError> {
        require_size(width, height)?;
        let img = self.encoder.open(src)?;
        let scaled = img.resize_exact(width, height, FilterType::Triangle);
        self.save(&scaled, target)
    }

    fn assemble_pyramid(
        &self,
        levels: &[PathBuf],
        target: &Path,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<(), ProcessorError> {
        if levels.is_empty() {
            return Err(ProcessorError::InvalidArgument(
                "pyramid needs at least one level".to_string(),
            ));
        }

        let compression = match self.format {
            TileFormat::Jpeg => Compression::Jpeg,
            TileFormat::Png => Compression::None,
        };
        let [r, g, b, _] = self.background.0;
        let options = PageOptions {
            tile_width,
            tile_height,
            compression,
            jpeg_quality: self.encoder.quality(),
            background: [r, g, b],
        };

        let encode_err = |message: String| ProcessorError::Encode {
            path: target.to_path_buf(),
            message,
        };

        let file = File::create(target).map_err(|e| ProcessorError::Io {
            path: target.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut out = BufWriter::new(file);
        let mut writer =
            PyramidTiffWriter::new(&mut out, options).map_err(|e| encode_err(e.to_string()))?;

        for level in levels {
            let page = self.encoder.open(level)?.to_rgb8();
            debug!(
                "Adding {}x{} page from {}",
                page.width(),
                page.height(),
                level.display()
            );
            writer
                .append_page(&page)
                .map_err(|e| encode_err(e.to_string()))?;
        }
        writer.finish().map_err(|e| encode_err(e.to_string()))?;
        out.flush().map_err(|e| ProcessorError::Io {
            path: target.to_path_buf(),
            message: e.to_string(),
        })?;

        ensure_output(target)
    }
}

// =============================================================================
// Tests
// =============================================================================
