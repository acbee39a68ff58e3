use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TileFormat;
use crate::error::TilingError;
use crate::geometry::TilesetGeometry;
use crate::scheme::{
    last_group_size, tile_group, tile_group_count, TilingScheme, TILES_PER_GROUP,
    TILE_GROUP_PREFIX, ZOOMIFY_DESCRIPTOR,
};

use super::{parse_attribute, read_descriptor, require_tile, xml_element, ValidationReport, Validator};

/// Checks `TileGroupN` tilesets against `ImageProperties.xml`.
pub struct ZoomifyValidator;

impl ZoomifyValidator {
    /// Confirm the group directories and how many tiles each holds.
    fn check_groups(path: &Path, total_tiles: u64) -> Result<(), TilingError> {
        let groups = tile_group_count(total_tiles);

        for group in 0..groups {
            let dir = group_dir(path, group);
            let expected = if group + 1 == groups {
                last_group_size(total_tiles)
            } else {
                TILES_PER_GROUP
            };
            let found = count_files(&dir)?;
            if found != expected {
                return Err(TilingError::validation(
                    &dir,
                    format!("{} tiles instead of {}", found, expected),
                ));
            }
        }

        // Stray groups past the last one
        let stray = group_dir(path, groups);
        if stray.exists() {
            return Err(TilingError::validation(stray, "unexpected tile group"));
        }
        Ok(())
    }
}

impl Validator for ZoomifyValidator {
    fn scheme(&self) -> TilingScheme {
        TilingScheme::Zoomify
    }

    fn is_tileset(&self, path: &Path) -> bool {
        path.is_dir() && path.join(ZOOMIFY_DESCRIPTOR).is_file()
    }

    fn validate(&self, path: &Path) -> Result<ValidationReport, TilingError> {
        if !self.is_tileset(path) {
            return Err(TilingError::validation(
                path,
                format!("not a Zoomify tileset, missing {}", ZOOMIFY_DESCRIPTOR),
            ));
        }

        let descriptor = path.join(ZOOMIFY_DESCRIPTOR);
        let xml = read_descriptor(&descriptor)?;
        let props = xml_element(&xml, "IMAGE_PROPERTIES")
            .ok_or_else(|| TilingError::validation(&descriptor, "missing <IMAGE_PROPERTIES>"))?;

        let width: u32 = parse_attribute(&descriptor, props, "WIDTH")?;
        let height: u32 = parse_attribute(&descriptor, props, "HEIGHT")?;
        let num_tiles: u64 = parse_attribute(&descriptor, props, "NUMTILES")?;
        let tile_size: u32 = parse_attribute(&descriptor, props, "TILESIZE")?;

        let geometry = TilesetGeometry::compute(width, height, tile_size, tile_size)
            .map_err(|e| TilingError::validation(&descriptor, e.to_string()))?;
        if num_tiles != geometry.total_tiles() {
            return Err(TilingError::validation(
                &descriptor,
                format!(
                    "NUMTILES is {}, {}x{} at {} needs {}",
                    num_tiles,
                    width,
                    height,
                    tile_size,
                    geometry.total_tiles()
                ),
            ));
        }

        Self::check_groups(path, num_tiles)?;

        // Raster order from the coarsest zoom down
        let mut index = 0u64;
        for level in (0..geometry.zoom_levels()).rev() {
            let zoom = geometry.zoom_of_level(level);
            for row in 0..geometry.y_tiles(level) {
                for col in 0..geometry.x_tiles(level) {
                    let tile = group_dir(path, tile_group(index)).join(format!(
                        "{}-{}-{}.{}",
                        zoom,
                        col,
                        row,
                        TileFormat::Jpeg.extension()
                    ));
                    require_tile(&tile)?;
                    index += 1;
                }
            }
        }

        Ok(ValidationReport {
            scheme: TilingScheme::Zoomify,
            zoom_levels: geometry.zoom_levels(),
            tiles_checked: index,
        })
    }
}

fn group_dir(root: &Path, group: u64) -> PathBuf {
    root.join(format!("{}{}", TILE_GROUP_PREFIX, group))
}

fn count_files(dir: &Path) -> Result<u64, TilingError> {
    let entries = fs::read_dir(dir).map_err(|e| TilingError::validation(dir, e.to_string()))?;
    let mut count = 0;
    for entry in entries {
        let entry = entry.map_err(|e| TilingError::validation(dir, e.to_string()))?;
        if entry.path().is_file() {
            count += 1;
        }
    }
    Ok(count)
}
