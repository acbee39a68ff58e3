//! Tiled pyramidal TIFF writer.
//!
//! Produces a classic TIFF where every page is one pyramid level, finest
//! first. Pages are tiled and edge tiles are padded to the full tile size
//! with the background color.
//!
//! Tiles are encoded here (standalone JPEG streams or raw RGB) and handed to
//! a [`tiff::encoder::DirectoryEncoder`] as opaque data; the `tiff` crate owns
//! the header, the IFD layout and the page chain.

use std::io::{Seek, Write};

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, Rgb, RgbImage};
use tiff::encoder::TiffEncoder;
use tiff::tags::{PhotometricInterpretation, Tag};

use crate::error::TiffError;

use super::tags::Compression;

/// NewSubfileType flag for reduced-resolution pages.
const REDUCED_RESOLUTION: u32 = 1;

/// YCbCrSubSampling tag id (not named by the `tiff` crate).
const YCBCR_SUBSAMPLING: u16 = 530;

/// Tile edges must be a multiple of this many pixels.
pub const TILE_ALIGNMENT: u32 = 16;

// =============================================================================
// Page Options
// =============================================================================

/// How every page of the pyramid is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// Tile width in pixels
    pub tile_width: u32,

    /// Tile height in pixels
    pub tile_height: u32,

    /// Tile compression (JPEG or none)
    pub compression: Compression,

    /// JPEG quality, ignored for uncompressed tiles
    pub jpeg_quality: u8,

    /// Fill for the padded part of edge tiles
    pub background: [u8; 3],
}

impl PageOptions {
    fn check(&self) -> Result<(), TiffError> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(TiffError::Encode(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        if self.tile_width % TILE_ALIGNMENT != 0 || self.tile_height % TILE_ALIGNMENT != 0 {
            return Err(TiffError::Encode(format!(
                "tile size must be a multiple of {}, got {}x{}",
                TILE_ALIGNMENT, self.tile_width, self.tile_height
            )));
        }
        if !self.compression.is_writable() {
            return Err(TiffError::Encode(format!(
                "cannot write {} compressed tiles",
                self.compression.name()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Streaming writer for a tiled pyramidal TIFF.
///
/// Pass `&mut` to a buffer or file to keep using it after [`finish`].
///
/// [`finish`]: PyramidTiffWriter::finish
pub struct PyramidTiffWriter<W: Write + Seek> {
    encoder: TiffEncoder<W>,
    options: PageOptions,
    pages: usize,
}

impl<W: Write + Seek> PyramidTiffWriter<W> {
    /// Start a new file and write its header.
    pub fn new(out: W, options: PageOptions) -> Result<Self, TiffError> {
        options.check()?;
        let encoder = TiffEncoder::new(out).map_err(tiff_error)?;

        Ok(PyramidTiffWriter {
            encoder,
            options,
            pages: 0,
        })
    }

    /// Number of pages written so far.
    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Append one pyramid level as a new page.
    pub fn append_page(&mut self, image: &RgbImage) -> Result<(), TiffError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(TiffError::Encode("empty page".to_string()));
        }

        let tw = self.options.tile_width;
        let th = self.options.tile_height;
        let columns = width.div_ceil(tw);
        let rows = height.div_ceil(th);
        let tiles = (columns * rows) as usize;

        let jpeg = self.options.compression == Compression::Jpeg;
        let subfile = if self.pages == 0 { 0 } else { REDUCED_RESOLUTION };
        let photometric = if jpeg {
            PhotometricInterpretation::YCbCr
        } else {
            PhotometricInterpretation::RGB
        };

        let mut dir = self.encoder.image_directory().map_err(tiff_error)?;

        let mut offsets = Vec::with_capacity(tiles);
        let mut byte_counts = Vec::with_capacity(tiles);
        for row in 0..rows {
            for col in 0..columns {
                let data = encode_tile(&self.options, image, col * tw, row * th)?;
                let offset = dir.write_data(data.as_slice()).map_err(tiff_error)?;
                offsets.push(u32::try_from(offset).map_err(|_| TiffError::OffsetOverflow(offset))?);
                byte_counts.push(data.len() as u32);
            }
        }

        let tag = |result: tiff::TiffResult<()>| result.map_err(tiff_error);
        tag(dir.write_tag(Tag::NewSubfileType, subfile))?;
        tag(dir.write_tag(Tag::ImageWidth, width))?;
        tag(dir.write_tag(Tag::ImageLength, height))?;
        tag(dir.write_tag(Tag::BitsPerSample, [8u16, 8, 8].as_slice()))?;
        tag(dir.write_tag(Tag::Compression, self.options.compression.as_u16()))?;
        tag(dir.write_tag(Tag::PhotometricInterpretation, photometric.to_u16()))?;
        tag(dir.write_tag(Tag::SamplesPerPixel, 3u16))?;
        tag(dir.write_tag(Tag::PlanarConfiguration, 1u16))?;
        tag(dir.write_tag(Tag::Software, env!("CARGO_PKG_NAME")))?;
        tag(dir.write_tag(Tag::TileWidth, tw))?;
        tag(dir.write_tag(Tag::TileLength, th))?;
        tag(dir.write_tag(Tag::TileOffsets, offsets.as_slice()))?;
        tag(dir.write_tag(Tag::TileByteCounts, byte_counts.as_slice()))?;
        if jpeg {
            // The JPEG encoder does not subsample chroma
            tag(dir.write_tag(Tag::Unknown(YCBCR_SUBSAMPLING), [1u16, 1].as_slice()))?;
        }
        dir.finish().map_err(tiff_error)?;

        self.pages += 1;
        Ok(())
    }

    /// Close the file. Fails when no page was written.
    pub fn finish(self) -> Result<(), TiffError> {
        if self.pages == 0 {
            return Err(TiffError::Encode("pyramid has no pages".to_string()));
        }
        Ok(())
    }
}

/// Cut one full-size tile out of `image`, padding past the edges.
fn encode_tile(
    options: &PageOptions,
    image: &RgbImage,
    x: u32,
    y: u32,
) -> Result<Vec<u8>, TiffError> {
    let tw = options.tile_width;
    let th = options.tile_height;
    let w = tw.min(image.width() - x);
    let h = th.min(image.height() - y);

    let mut tile = RgbImage::from_pixel(tw, th, Rgb(options.background));
    let piece = imageops::crop_imm(image, x, y, w, h).to_image();
    imageops::replace(&mut tile, &piece, 0, 0);

    match options.compression {
        Compression::Jpeg => {
            let mut data = Vec::new();
            JpegEncoder::new_with_quality(&mut data, options.jpeg_quality)
                .encode_image(&tile)
                .map_err(|e| TiffError::Encode(e.to_string()))?;
            Ok(data)
        }
        _ => Ok(tile.into_raw()),
    }
}

fn tiff_error(err: tiff::TiffError) -> TiffError {
    match err {
        tiff::TiffError::IoError(e) => TiffError::Io(e.to_string()),
        other => TiffError::Encode(other.to_string()),
    }
}

// =============================================================================
// Tests
// =============================================================================
