use std::fs;
use std::path::Path;

use crate::config::TileFormat;
use crate::error::TilingError;
use crate::scheme::TilingScheme;

use super::{require_tile, ValidationReport, Validator};

/// Checks flat `zoom_col_row.ext` quadtree tilesets.
///
/// There is no descriptor: the number of levels is the highest zoom prefix
/// plus one, and zoom `z` must hold `2^z x 2^z` tiles.
pub struct GoogleMapsValidator;

/// Parse a tile filename like `"3_5_2.png"` into `(zoom, col, row, ext)`.
pub fn parse_tile_name(filename: &str) -> Option<(u32, u32, u32, &str)> {
    let (stem, ext) = filename.rsplit_once('.')?;
    TileFormat::from_extension(ext)?;

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() != 3 {
        return None;
    }

    let zoom: u32 = parts[0].parse().ok()?;
    let col: u32 = parts[1].parse().ok()?;
    let row: u32 = parts[2].parse().ok()?;

    Some((zoom, col, row, ext))
}

impl Validator for GoogleMapsValidator {
    fn scheme(&self) -> TilingScheme {
        TilingScheme::GoogleMaps
    }

    fn is_tileset(&self, path: &Path) -> bool {
        let Ok(entries) = fs::read_dir(path) else {
            return false;
        };
        entries.flatten().any(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(parse_tile_name)
                .is_some()
        })
    }

    fn validate(&self, path: &Path) -> Result<ValidationReport, TilingError> {
        let entries = fs::read_dir(path).map_err(|e| TilingError::validation(path, e.to_string()))?;

        let mut max_zoom: Option<u32> = None;
        let mut extension: Option<String> = None;
        let mut found = 0u64;
        for entry in entries {
            let entry = entry.map_err(|e| TilingError::validation(path, e.to_string()))?;
            let name = entry.file_name();
            let Some((zoom, _, _, ext)) = name.to_str().and_then(parse_tile_name) else {
                continue;
            };
            match &extension {
                Some(seen) if seen != ext => {
                    return Err(TilingError::validation(
                        entry.path(),
                        format!("mixed tile extensions {} and {}", seen, ext),
                    ));
                }
                Some(_) => {}
                None => extension = Some(ext.to_string()),
            }
            max_zoom = Some(max_zoom.map_or(zoom, |m| m.max(zoom)));
            found += 1;
        }

        let (Some(max_zoom), Some(extension)) = (max_zoom, extension) else {
            return Err(TilingError::validation(path, "not a Google Maps tileset, no tiles"));
        };
        if max_zoom >= 32 {
            return Err(TilingError::validation(path, format!("zoom {} out of range", max_zoom)));
        }

        let mut checked = 0u64;
        for zoom in 0..=max_zoom {
            let side = 1u32 << zoom;
            for col in 0..side {
                for row in 0..side {
                    let tile = path.join(format!("{}_{}_{}.{}", zoom, col, row, extension));
                    require_tile(&tile)?;
                    checked += 1;
                }
            }
        }

        if found != checked {
            return Err(TilingError::validation(
                path,
                format!("{} tiles found, {} expected", found, checked),
            ));
        }

        Ok(ValidationReport {
            scheme: TilingScheme::GoogleMaps,
            zoom_levels: max_zoom as usize + 1,
            tiles_checked: checked,
        })
    }
}
