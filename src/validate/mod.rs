//! Completeness checks for finished tilesets.
//!
//! Each validator recomputes the expected geometry independently of the
//! converter, from the scheme's descriptor or, where there is none, from the
//! naming convention, and confirms that every expected tile exists. The
//! first missing or mismatched path fails the check; nothing is repaired.
//!
//! | Scheme      | Detected by                  | Geometry source              |
//! |-------------|------------------------------|------------------------------|
//! | TMS         | `tilemapresource.xml`        | descriptor                   |
//! | Zoomify     | `ImageProperties.xml`        | descriptor                   |
//! | Google Maps | `zoom_col_row.ext` files     | highest zoom prefix          |
//! | PTIF        | TIFF header                  | first page + tile tags       |

mod gmaps;
mod ptif;
mod tms;
mod zoomify;

use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::error::TilingError;
use crate::scheme::TilingScheme;

pub use gmaps::{parse_tile_name, GoogleMapsValidator};
pub use ptif::PtifValidator;
pub use tms::TmsValidator;
pub use zoomify::ZoomifyValidator;

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Scheme the tileset was checked against
    pub scheme: TilingScheme,

    /// Number of zoom levels found
    pub zoom_levels: usize,

    /// Number of tiles confirmed present
    pub tiles_checked: u64,
}

/// Checks a finished tileset of one scheme.
pub trait Validator {
    /// The scheme this validator understands.
    fn scheme(&self) -> TilingScheme;

    /// Whether `path` looks like a tileset of this scheme.
    fn is_tileset(&self, path: &Path) -> bool;

    /// Confirm that every tile the tileset's geometry calls for exists.
    ///
    /// # Errors
    ///
    /// Returns [`TilingError::ValidationFailure`] naming the first missing
    /// or mismatched path.
    fn validate(&self, path: &Path) -> Result<ValidationReport, TilingError>;
}

/// Validator for a scheme.
pub fn validator_for(scheme: TilingScheme) -> Box<dyn Validator> {
    match scheme {
        TilingScheme::Tms => Box::new(TmsValidator),
        TilingScheme::Zoomify => Box::new(ZoomifyValidator),
        TilingScheme::GoogleMaps => Box::new(GoogleMapsValidator),
        TilingScheme::Ptif => Box::new(PtifValidator),
    }
}

/// Guess the scheme of the tileset at `path`.
pub fn detect(path: &Path) -> Option<TilingScheme> {
    TilingScheme::ALL
        .into_iter()
        .find(|&scheme| validator_for(scheme).is_tileset(path))
}

/// Validate the tileset at `path`, detecting its scheme when not given.
pub fn validate_tileset(
    path: &Path,
    scheme: Option<TilingScheme>,
) -> Result<ValidationReport, TilingError> {
    let scheme = match scheme {
        Some(scheme) => scheme,
        None => detect(path)
            .ok_or_else(|| TilingError::validation(path, "not a recognized tileset"))?,
    };
    debug!("Validating {} as {}", path.display(), scheme);

    let report = validator_for(scheme).validate(path)?;
    debug!(
        "{}: {} tiles in {} zoom levels",
        path.display(),
        report.tiles_checked,
        report.zoom_levels
    );
    Ok(report)
}

// =============================================================================
// Descriptor Helpers
// =============================================================================

/// All start tags named `name` in `xml`, e.g. `<TileSet href="0" ... />`.
pub(crate) fn xml_elements<'a>(xml: &'a str, name: &str) -> Vec<&'a str> {
    let open = format!("<{}", name);
    let mut elements = Vec::new();
    let mut from = 0;

    while let Some(pos) = xml[from..].find(&open) {
        let start = from + pos;
        let after = start + open.len();
        from = after;

        // Skip longer names sharing the prefix (`<TileSets` for `<TileSet`)
        if !xml[after..].starts_with(|c: char| c.is_whitespace() || c == '/' || c == '>') {
            continue;
        }
        let Some(len) = xml[after..].find('>') else {
            break;
        };
        elements.push(&xml[start..after + len + 1]);
    }
    elements
}

/// The first start tag named `name`.
pub(crate) fn xml_element<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    xml_elements(xml, name).into_iter().next()
}

/// Value of attribute `name` within a start tag.
pub(crate) fn xml_attribute<'a>(element: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("{}=\"", name);
    let mut from = 0;

    while let Some(pos) = element[from..].find(&key) {
        let start = from + pos;
        let value_start = start + key.len();
        from = value_start;

        if !element[..start].ends_with(|c: char| c.is_whitespace()) {
            continue;
        }
        let len = element[value_start..].find('"')?;
        return Some(&element[value_start..value_start + len]);
    }
    None
}

/// Parse a required attribute, failing with a message naming `path`.
pub(crate) fn parse_attribute<T: FromStr>(
    path: &Path,
    element: &str,
    name: &str,
) -> Result<T, TilingError> {
    let raw = xml_attribute(element, name)
        .ok_or_else(|| TilingError::validation(path, format!("missing attribute {}", name)))?;
    raw.trim().parse().map_err(|_| {
        TilingError::validation(path, format!("ill-formed attribute {}=\"{}\"", name, raw))
    })
}

/// Read a descriptor file into a string.
pub(crate) fn read_descriptor(path: &Path) -> Result<String, TilingError> {
    std::fs::read_to_string(path).map_err(|e| TilingError::validation(path, e.to_string()))
}

/// Fail unless `path` is an existing file.
pub(crate) fn require_tile(path: &Path) -> Result<(), TilingError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(TilingError::validation(path, "missing tile"))
    }
}
