//! Validators against real conversions.
//!
//! Tests verify:
//! - Scheme detection for each finished tileset
//! - Removing a single tile or tampering with a descriptor is caught
//! - Validating against the wrong scheme fails

use std::fs;
use std::path::PathBuf;

use pyramid_tiler::scheme::{TMS_DESCRIPTOR, ZOOMIFY_DESCRIPTOR};
use pyramid_tiler::{
    detect, validate_tileset, validator_for, Converter, RasterProcessor, TileFormat, TilingError,
    TilingScheme,
};

use super::test_utils::{test_config, TestDirs};

fn convert(dirs: &TestDirs, scheme: TilingScheme) -> PathBuf {
    let image = dirs.image("scan.png", 70, 45);
    let config = test_config(&dirs.work, 16, TileFormat::Jpeg);
    let processor = RasterProcessor::new(&config);
    Converter::new(scheme, config, processor)
        .convert(&image, None)
        .unwrap()
        .output
}

#[test]
fn test_detects_every_scheme() {
    for scheme in TilingScheme::ALL {
        let dirs = TestDirs::new();
        let output = convert(&dirs, scheme);

        assert_eq!(detect(&output), Some(scheme), "detecting {}", scheme);
        assert!(validator_for(scheme).is_tileset(&output));
        let report = validate_tileset(&output, None).unwrap();
        assert_eq!(report.scheme, scheme);
    }
}

#[test]
fn test_wrong_scheme_fails() {
    let dirs = TestDirs::new();
    let output = convert(&dirs, TilingScheme::Tms);

    for scheme in [TilingScheme::Zoomify, TilingScheme::GoogleMaps, TilingScheme::Ptif] {
        assert!(
            matches!(
                validate_tileset(&output, Some(scheme)),
                Err(TilingError::ValidationFailure { .. })
            ),
            "{} accepted a TMS tileset",
            scheme
        );
    }
}

#[test]
fn test_missing_tms_tile_is_reported() {
    let dirs = TestDirs::new();
    let output = convert(&dirs, TilingScheme::Tms);
    // 70x45 at 16px: 5x3 base grid, 4 zoom levels
    let gone = output.join("3").join("4").join("2.jpg");
    fs::remove_file(&gone).unwrap();

    match validate_tileset(&output, None) {
        Err(TilingError::ValidationFailure { path, .. }) => assert_eq!(path, gone),
        other => panic!("Expected ValidationFailure, got {:?}", other),
    }
}

#[test]
fn test_missing_zoomify_tile_is_reported() {
    let dirs = TestDirs::new();
    let output = convert(&dirs, TilingScheme::Zoomify);
    fs::remove_file(output.join("TileGroup0").join("2-1-0.jpg")).unwrap();

    assert!(matches!(
        validate_tileset(&output, Some(TilingScheme::Zoomify)),
        Err(TilingError::ValidationFailure { .. })
    ));
}

#[test]
fn test_tampered_descriptors() {
    let dirs = TestDirs::new();
    let tms = convert(&dirs, TilingScheme::Tms);
    let xml = fs::read_to_string(tms.join(TMS_DESCRIPTOR)).unwrap();
    // Claiming a larger image adds tiles that do not exist
    fs::write(
        tms.join(TMS_DESCRIPTOR),
        xml.replace("maxy=\"70.", "maxy=\"140."),
    )
    .unwrap();
    assert!(validate_tileset(&tms, None).is_err());

    let dirs = TestDirs::new();
    let zoomify = convert(&dirs, TilingScheme::Zoomify);
    fs::write(zoomify.join(ZOOMIFY_DESCRIPTOR), "<IMAGE_PROPERTIES />").unwrap();
    match validate_tileset(&zoomify, None) {
        Err(TilingError::ValidationFailure { reason, .. }) => {
            assert!(reason.contains("WIDTH"))
        }
        other => panic!("Expected ValidationFailure, got {:?}", other),
    }
}

#[test]
fn test_missing_gmaps_zoom_level() {
    let dirs = TestDirs::new();
    let output = convert(&dirs, TilingScheme::GoogleMaps);
    fs::remove_file(output.join("0_0_0.jpg")).unwrap();

    assert!(validate_tileset(&output, Some(TilingScheme::GoogleMaps)).is_err());
}

#[test]
fn test_truncated_ptif() {
    let dirs = TestDirs::new();
    let output = convert(&dirs, TilingScheme::Ptif);
    let bytes = fs::read(&output).unwrap();
    fs::write(&output, &bytes[..bytes.len() / 2]).unwrap();

    assert!(validate_tileset(&output, Some(TilingScheme::Ptif)).is_err());
}
