use std::path::Path;

use crate::error::TilingError;
use crate::geometry::TilesetGeometry;
use crate::scheme::{TilingScheme, TMS_DESCRIPTOR};

use super::{
    parse_attribute, read_descriptor, require_tile, xml_element, xml_elements, ValidationReport,
    Validator,
};

/// Checks `zoom/col/row.ext` tilesets against `tilemapresource.xml`.
pub struct TmsValidator;

impl Validator for TmsValidator {
    fn scheme(&self) -> TilingScheme {
        TilingScheme::Tms
    }

    fn is_tileset(&self, path: &Path) -> bool {
        path.is_dir() && path.join(TMS_DESCRIPTOR).is_file()
    }

    fn validate(&self, path: &Path) -> Result<ValidationReport, TilingError> {
        if !self.is_tileset(path) {
            return Err(TilingError::validation(
                path,
                format!("not a TMS tileset, missing {}", TMS_DESCRIPTOR),
            ));
        }

        let descriptor = path.join(TMS_DESCRIPTOR);
        let xml = read_descriptor(&descriptor)?;
        let missing = |name: &str| TilingError::validation(&descriptor, format!("missing <{}>", name));

        let format = xml_element(&xml, "TileFormat").ok_or_else(|| missing("TileFormat"))?;
        let tile_width: u32 = parse_attribute(&descriptor, format, "width")?;
        let tile_height: u32 = parse_attribute(&descriptor, format, "height")?;
        let extension: String = parse_attribute(&descriptor, format, "extension")?;

        // The bounding box spans (-height, 0) to (0, width)
        let bbox = xml_element(&xml, "BoundingBox").ok_or_else(|| missing("BoundingBox"))?;
        let min_x: f64 = parse_attribute(&descriptor, bbox, "minx")?;
        let max_y: f64 = parse_attribute(&descriptor, bbox, "maxy")?;
        let (width, height) = (max_y.round() as u32, min_x.abs().round() as u32);

        let geometry = TilesetGeometry::compute(width, height, tile_width, tile_height)
            .map_err(|e| TilingError::validation(&descriptor, e.to_string()))?;

        let declared = xml_elements(&xml, "TileSet").len();
        if declared != geometry.zoom_levels() {
            return Err(TilingError::validation(
                &descriptor,
                format!(
                    "{} tile sets declared, {}x{} needs {}",
                    declared,
                    width,
                    height,
                    geometry.zoom_levels()
                ),
            ));
        }

        let mut checked = 0u64;
        for level in 0..geometry.zoom_levels() {
            let zoom_dir = path.join(geometry.zoom_of_level(level).to_string());
            for col in 0..geometry.x_tiles(level) {
                let col_dir = zoom_dir.join(col.to_string());
                for row in 0..geometry.y_tiles(level) {
                    require_tile(&col_dir.join(format!("{}.{}", row, extension)))?;
                    checked += 1;
                }
            }
        }

        Ok(ValidationReport {
            scheme: TilingScheme::Tms,
            zoom_levels: geometry.zoom_levels(),
            tiles_checked: checked,
        })
    }
}
