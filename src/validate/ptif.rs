use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use crate::error::TilingError;
use crate::format::tiff::{read_directories, TiffHeader, TileDirectory, TIFF_HEADER_SIZE};
use crate::geometry::TilesetGeometry;
use crate::scheme::TilingScheme;

use super::{ValidationReport, Validator};

/// Checks a pyramidal TIFF: one tiled page per level, each half the size of
/// the previous.
pub struct PtifValidator;

impl PtifValidator {
    fn check_page(
        path: &Path,
        index: usize,
        page: &TileDirectory,
        first: &TileDirectory,
        expected: (u32, u32),
        file_size: u64,
    ) -> Result<(), TilingError> {
        let fail = |reason: String| TilingError::validation(path, format!("page {}: {}", index, reason));

        if (page.width, page.height) != expected {
            return Err(fail(format!(
                "{}x{} instead of {}x{}",
                page.width, page.height, expected.0, expected.1
            )));
        }
        if (page.tile_width, page.tile_height) != (first.tile_width, first.tile_height) {
            return Err(fail(format!(
                "tile size {}x{} differs from {}x{}",
                page.tile_width, page.tile_height, first.tile_width, first.tile_height
            )));
        }
        if page.compression_scheme().is_none() {
            return Err(fail(format!("unknown compression {}", page.compression)));
        }

        let tiles = page.expected_tiles();
        if page.tile_offsets.len() as u64 != tiles || page.tile_byte_counts.len() as u64 != tiles {
            return Err(fail(format!(
                "{} offsets and {} byte counts for {} tiles",
                page.tile_offsets.len(),
                page.tile_byte_counts.len(),
                tiles
            )));
        }
        for (offset, count) in page.tile_offsets.iter().zip(&page.tile_byte_counts) {
            if *count == 0 || offset + count > file_size {
                return Err(fail(format!(
                    "tile at {} ({} bytes) outside the file",
                    offset, count
                )));
            }
        }
        Ok(())
    }
}

impl Validator for PtifValidator {
    fn scheme(&self) -> TilingScheme {
        TilingScheme::Ptif
    }

    fn is_tileset(&self, path: &Path) -> bool {
        if !path.is_file() {
            return false;
        }
        let Ok(mut file) = File::open(path) else {
            return false;
        };
        let mut header = [0u8; TIFF_HEADER_SIZE];
        let Ok(file_size) = file.metadata().map(|m| m.len()) else {
            return false;
        };
        file.read_exact(&mut header).is_ok() && TiffHeader::parse(&header, file_size).is_ok()
    }

    fn validate(&self, path: &Path) -> Result<ValidationReport, TilingError> {
        let bytes = fs::read(path).map_err(|e| TilingError::validation(path, e.to_string()))?;
        let file_size = bytes.len() as u64;
        let pages =
            read_directories(&bytes).map_err(|e| TilingError::validation(path, e.to_string()))?;

        let Some(first) = pages.first() else {
            return Err(TilingError::validation(path, "no pages"));
        };
        let geometry = TilesetGeometry::compute(
            first.width,
            first.height,
            first.tile_width,
            first.tile_height,
        )
        .map_err(|e| TilingError::validation(path, e.to_string()))?;

        if pages.len() != geometry.zoom_levels() {
            return Err(TilingError::validation(
                path,
                format!(
                    "{} pages, {}x{} needs {}",
                    pages.len(),
                    first.width,
                    first.height,
                    geometry.zoom_levels()
                ),
            ));
        }

        let mut expected = (first.width, first.height);
        let mut checked = 0u64;
        for (index, page) in pages.iter().enumerate() {
            Self::check_page(path, index, page, first, expected, file_size)?;
            checked += page.expected_tiles();
            expected = (
                expected.0.div_ceil(2).max(1),
                expected.1.div_ceil(2).max(1),
            );
        }

        Ok(ValidationReport {
            scheme: TilingScheme::Ptif,
            zoom_levels: pages.len(),
            tiles_checked: checked,
        })
    }
}
