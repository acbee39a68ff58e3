//! End-to-end conversions.
//!
//! Tests verify:
//! - Every scheme produces the tiles its geometry calls for, at the right paths
//! - The matching validator accepts each finished tileset
//! - Target directory rules (default location, conflicts, explicit output)
//! - Failures purge working files and surface one typed error

use std::fs;
use std::path::Path;

use pyramid_tiler::scheme::{TILE_GROUP_PREFIX, TMS_DESCRIPTOR, ZOOMIFY_DESCRIPTOR};
use pyramid_tiler::{
    read_directories, validate_tileset, Converter, RasterProcessor, TileFormat,
    TilesetGeometry, TilingError, TilingScheme,
};

use super::test_utils::{count_files, list_dir, test_config, Op, RecordingProcessor, TestDirs};

/// 100x60 at 16px tiles: grids 7x4, 4x2, 2x1, 1x1.
const WIDTH: u32 = 100;
const HEIGHT: u32 = 60;
const TILE: u32 = 16;

fn converter(
    dirs: &TestDirs,
    scheme: TilingScheme,
    format: TileFormat,
) -> Converter<RasterProcessor> {
    let config = test_config(&dirs.work, TILE, format);
    let processor = RasterProcessor::new(&config);
    Converter::new(scheme, config, processor)
}

fn tile_size(path: &Path) -> (u32, u32) {
    image::image_dimensions(path).unwrap()
}

// =============================================================================
// TMS
// =============================================================================

#[test]
fn test_tms_end_to_end() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", WIDTH, HEIGHT);

    let info = converter(&dirs, TilingScheme::Tms, TileFormat::Png)
        .convert(&image, None)
        .unwrap();

    assert_eq!(info.output, dirs.work.join("map"));
    assert_eq!(info.zoom_levels, 4);
    assert_eq!(info.total_tiles, 28 + 8 + 2 + 1);
    assert_eq!(info.format, TileFormat::Png);

    let root = &info.output;
    assert!(root.join(TMS_DESCRIPTOR).is_file());
    assert_eq!(count_files(root) as u64, info.total_tiles + 1);

    // Finest zoom is 3; columns 0..7, rows 0..4 counted from the bottom
    assert!(root.join("3/6/3.png").is_file());
    assert!(!root.join("3/7/0.png").exists());
    assert!(root.join("0/0/0.png").is_file());
    // Every tile is padded to the full tile size
    assert_eq!(tile_size(&root.join("3/6/3.png")), (TILE, TILE));
    assert_eq!(tile_size(&root.join("0/0/0.png")), (TILE, TILE));

    let report = validate_tileset(root, None).unwrap();
    assert_eq!(report.scheme, TilingScheme::Tms);
    assert_eq!(report.tiles_checked, info.total_tiles);

    // Only the tileset remains in the working directory
    assert_eq!(list_dir(&dirs.work), vec!["map".to_string()]);
}

#[test]
fn test_tms_rows_count_from_bottom() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", WIDTH, HEIGHT);

    let info = converter(&dirs, TilingScheme::Tms, TileFormat::Png)
        .convert(&image, None)
        .unwrap();

    // The top row is padded: 4 rows of 16 = 64 > 60, with the image anchored
    // at the bottom, so the top tile (row 3) starts with 4 background rows.
    let top = image::open(info.output.join("3/0/3.png")).unwrap().to_rgb8();
    assert_eq!(top.get_pixel(0, 0).0, [255, 255, 255]);
    assert_ne!(top.get_pixel(0, 4).0, [255, 255, 255]);

    let bottom = image::open(info.output.join("3/0/0.png")).unwrap().to_rgb8();
    assert_ne!(bottom.get_pixel(0, TILE - 1).0, [255, 255, 255]);
}

#[test]
fn test_tms_descriptor_content() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", WIDTH, HEIGHT);

    let info = converter(&dirs, TilingScheme::Tms, TileFormat::Jpeg)
        .convert(&image, None)
        .unwrap();

    let xml = fs::read_to_string(info.output.join(TMS_DESCRIPTOR)).unwrap();
    assert!(xml.contains("<Title>map.png</Title>"));
    assert!(xml.contains("maxy=\"100.00000000000000\""));
    assert!(xml.contains("<Origin x=\"-60.00000000000000\" y=\"0.00000000000000\"/>"));
    assert!(xml.contains("mime-type=\"image/jpeg\" extension=\"jpg\""));
    assert!(xml.contains("<TileSet href=\"3\" units-per-pixel=\"1.00000000000000\" order=\"3\"/>"));
}

// =============================================================================
// Zoomify
// =============================================================================

#[test]
fn test_zoomify_end_to_end() {
    let dirs = TestDirs::new();
    let image = dirs.image("photo.png", WIDTH, HEIGHT);

    // Zoomify always writes JPEG tiles
    let info = converter(&dirs, TilingScheme::Zoomify, TileFormat::Png)
        .convert(&image, None)
        .unwrap();
    assert_eq!(info.format, TileFormat::Jpeg);

    let root = &info.output;
    let xml = fs::read_to_string(root.join(ZOOMIFY_DESCRIPTOR)).unwrap();
    assert_eq!(
        xml,
        "<IMAGE_PROPERTIES WIDTH=\"100\" HEIGHT=\"60\" NUMTILES=\"39\" NUMIMAGES=\"1\" VERSION=\"1.8\" TILESIZE=\"16\" />"
    );

    let group = root.join(format!("{}0", TILE_GROUP_PREFIX));
    assert_eq!(count_files(&group), 39);
    assert!(group.join("0-0-0.jpg").is_file());
    assert!(group.join("3-6-3.jpg").is_file());

    // Edge tiles keep their natural size
    assert_eq!(tile_size(&group.join("3-6-3.jpg")), (100 - 6 * TILE, 60 - 3 * TILE));
    assert_eq!(tile_size(&group.join("3-0-0.jpg")), (TILE, TILE));

    let report = validate_tileset(root, None).unwrap();
    assert_eq!(report.scheme, TilingScheme::Zoomify);
    assert_eq!(report.tiles_checked, 39);
}

#[test]
fn test_zoomify_spans_tile_groups() {
    let dirs = TestDirs::new();
    // 23x16 base grid at 16px: 497 tiles, two groups
    let image = dirs.image("big.png", 23 * TILE - 5, 16 * TILE - 9);

    let info = converter(&dirs, TilingScheme::Zoomify, TileFormat::Jpeg)
        .convert(&image, None)
        .unwrap();
    assert_eq!(info.total_tiles, 497);

    let root = &info.output;
    assert_eq!(count_files(&root.join("TileGroup0")), 256);
    assert_eq!(count_files(&root.join("TileGroup1")), 241);
    assert!(!root.join("TileGroup2").exists());

    validate_tileset(root, Some(TilingScheme::Zoomify)).unwrap();
}

#[test]
fn test_zoomify_rejects_rectangular_tiles() {
    let dirs = TestDirs::new();
    let image = dirs.image("photo.png", WIDTH, HEIGHT);
    let config = test_config(&dirs.work, TILE, TileFormat::Jpeg).with_tile_size(32, 16);
    let processor = RasterProcessor::new(&config);

    let result = Converter::new(TilingScheme::Zoomify, config, processor).convert(&image, None);
    assert!(matches!(result, Err(TilingError::InvalidDimension(_))));
}

// =============================================================================
// Google Maps
// =============================================================================

#[test]
fn test_gmaps_end_to_end_wide() {
    let dirs = TestDirs::new();
    let image = dirs.image("wide.png", WIDTH, HEIGHT);

    let info = converter(&dirs, TilingScheme::GoogleMaps, TileFormat::Png)
        .convert(&image, None)
        .unwrap();

    // 100 is nearer to 128 than to 64
    assert_eq!((info.image_width, info.image_height), (128, 128));
    assert_eq!(info.zoom_levels, 4);
    assert_eq!(info.total_tiles, 64 + 16 + 4 + 1);

    let root = &info.output;
    assert_eq!(count_files(root) as u64, info.total_tiles);
    assert!(root.join("0_0_0.png").is_file());
    assert!(root.join("3_7_7.png").is_file());
    assert_eq!(tile_size(&root.join("3_7_7.png")), (TILE, TILE));

    // Centred vertically: the top row is background, the middle is image
    let top = image::open(root.join("3_3_0.png")).unwrap().to_rgb8();
    assert_eq!(top.get_pixel(8, 0).0, [255, 255, 255]);
    let middle = image::open(root.join("3_3_4.png")).unwrap().to_rgb8();
    assert_ne!(middle.get_pixel(8, 0).0, [255, 255, 255]);

    let report = validate_tileset(root, None).unwrap();
    assert_eq!(report.scheme, TilingScheme::GoogleMaps);
    assert_eq!(report.tiles_checked, 85);

    // The resized square is gone
    assert_eq!(list_dir(&dirs.work), vec!["wide".to_string()]);
}

#[test]
fn test_gmaps_end_to_end_tall() {
    let dirs = TestDirs::new();
    let image = dirs.image("tall.png", 30, 70);

    let info = converter(&dirs, TilingScheme::GoogleMaps, TileFormat::Jpeg)
        .convert(&image, None)
        .unwrap();

    // 70 is nearer to 64 than to 128
    assert_eq!(info.image_width, 64);
    assert_eq!(info.zoom_levels, 3);

    let root = &info.output;
    assert_eq!(count_files(root), 16 + 4 + 1);
    // Centred horizontally: the left column is background
    let left = image::open(root.join("2_0_1.jpg")).unwrap().to_rgb8();
    let px = left.get_pixel(0, 8).0;
    assert!(px.iter().all(|&c| c > 240), "expected background, got {:?}", px);

    validate_tileset(root, Some(TilingScheme::GoogleMaps)).unwrap();
}

#[test]
fn test_gmaps_requires_square_tiles() {
    let dirs = TestDirs::new();
    let image = dirs.image("wide.png", WIDTH, HEIGHT);
    let config = test_config(&dirs.work, TILE, TileFormat::Png).with_tile_size(32, 16);
    let processor = RasterProcessor::new(&config);

    let result =
        Converter::new(TilingScheme::GoogleMaps, config, processor).convert(&image, None);
    assert!(matches!(result, Err(TilingError::InvalidDimension(_))));
}

// =============================================================================
// PTIF
// =============================================================================

#[test]
fn test_ptif_end_to_end() {
    let dirs = TestDirs::new();
    let image = dirs.image("scan.png", WIDTH, HEIGHT);

    let info = converter(&dirs, TilingScheme::Ptif, TileFormat::Jpeg)
        .convert(&image, None)
        .unwrap();

    assert_eq!(info.output, dirs.work.join("scan.ptif"));
    assert!(info.output.is_file());

    let bytes = fs::read(&info.output).unwrap();
    let pages = read_directories(&bytes).unwrap();
    let sizes: Vec<(u32, u32)> = pages.iter().map(|p| (p.width, p.height)).collect();
    assert_eq!(sizes, vec![(100, 60), (50, 30), (25, 15), (13, 8)]);
    assert!(pages.iter().all(|p| p.tile_width == TILE && p.tile_height == TILE));

    let report = validate_tileset(&info.output, None).unwrap();
    assert_eq!(report.scheme, TilingScheme::Ptif);
    assert_eq!(report.zoom_levels, 4);

    // Intermediate levels are deleted
    assert_eq!(list_dir(&dirs.work), vec!["scan.ptif".to_string()]);
}

#[test]
fn test_ptif_uncompressed_for_png() {
    let dirs = TestDirs::new();
    let image = dirs.image("scan.png", 40, 40);
    let out = dirs.out.join("nested").join("scan.tif");

    let info = converter(&dirs, TilingScheme::Ptif, TileFormat::Png)
        .convert(&image, Some(&out))
        .unwrap();
    assert_eq!(info.output, out);

    let pages = read_directories(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(pages.len(), 3);
    assert!(pages.iter().all(|p| p.compression == 1));
    validate_tileset(&out, Some(TilingScheme::Ptif)).unwrap();
}

#[test]
fn test_ptif_rejects_unaligned_tiles() {
    let dirs = TestDirs::new();
    let image = dirs.image("scan.png", WIDTH, HEIGHT);
    let config = test_config(&dirs.work, 20, TileFormat::Jpeg);
    let processor = RasterProcessor::new(&config);

    let result = Converter::new(TilingScheme::Ptif, config, processor).convert(&image, None);
    assert!(matches!(result, Err(TilingError::InvalidDimension(_))));
}

// =============================================================================
// Target Rules
// =============================================================================

#[test]
fn test_default_target_conflict() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", WIDTH, HEIGHT);
    fs::create_dir_all(dirs.work.join("map")).unwrap();

    let result = converter(&dirs, TilingScheme::Tms, TileFormat::Png).convert(&image, None);
    match result {
        Err(TilingError::DirectoryConflict { path }) => assert_eq!(path, dirs.work.join("map")),
        other => panic!("Expected DirectoryConflict, got {:?}", other),
    }
}

#[test]
fn test_explicit_output_is_created_and_reused() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", 40, 20);
    let out = dirs.out.join("tiles");

    let conv = converter(&dirs, TilingScheme::Tms, TileFormat::Png);
    conv.convert(&image, Some(&out)).unwrap();
    assert!(out.join(TMS_DESCRIPTOR).is_file());

    // Converting again into the same explicit directory is allowed
    let info = conv.convert(&image, Some(&out)).unwrap();
    validate_tileset(&info.output, Some(TilingScheme::Tms)).unwrap();
}

#[test]
fn test_single_tile_image() {
    let dirs = TestDirs::new();
    let image = dirs.image("tiny.png", 10, 7);

    for scheme in [TilingScheme::Tms, TilingScheme::Zoomify, TilingScheme::GoogleMaps] {
        let out = dirs.out.join(scheme.name());
        let info = converter(&dirs, scheme, TileFormat::Png)
            .convert(&image, Some(&out))
            .unwrap();
        assert_eq!(info.zoom_levels, 1);
        assert_eq!(info.total_tiles, 1);
        validate_tileset(&out, Some(scheme)).unwrap();
    }
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_failure_purges_working_files() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", WIDTH, HEIGHT);
    let config = test_config(&dirs.work, TILE, TileFormat::Png);
    // Fail while building level 2
    let processor = RecordingProcessor::new(&config).failing_on(Op::Scale, 6);
    let conv = Converter::new(TilingScheme::Tms, config, processor);
    let out = dirs.out.join("tiles");

    match conv.convert(&image, Some(&out)) {
        Err(TilingError::ProcessingFailure { message, .. }) => {
            assert!(message.contains("injected failure"))
        }
        other => panic!("Expected ProcessingFailure, got {:?}", other),
    }
    assert_eq!(conv.processor().calls(Op::Scale), 6);

    // No stripes or joined images are left behind
    assert!(list_dir(&dirs.work).is_empty());
    // Tiles of the finished finest level stay in place
    assert!(out.join("3/0/0.png").is_file());
}

#[test]
fn test_failure_during_striping() {
    let dirs = TestDirs::new();
    let image = dirs.image("photo.png", WIDTH, HEIGHT);
    let config = test_config(&dirs.work, TILE, TileFormat::Jpeg);
    let processor = RecordingProcessor::new(&config).failing_on(Op::Crop, 1);
    let conv = Converter::new(TilingScheme::Zoomify, config, processor);

    assert!(matches!(
        conv.convert(&image, None),
        Err(TilingError::ProcessingFailure { .. })
    ));
    // The default target was created before the failure
    assert_eq!(list_dir(&dirs.work), vec!["photo".to_string()]);
    assert_eq!(count_files(&dirs.work), 0);
}

#[test]
fn test_missing_source_image() {
    let dirs = TestDirs::new();
    let result = converter(&dirs, TilingScheme::Tms, TileFormat::Png)
        .convert(&dirs.source.join("absent.png"), None);
    assert!(matches!(result, Err(TilingError::ProcessingFailure { .. })));
    // Nothing was created
    assert!(list_dir(&dirs.work).is_empty());
}

#[test]
fn test_processor_call_counts() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", WIDTH, HEIGHT);
    let config = test_config(&dirs.work, TILE, TileFormat::Png);
    let processor = RecordingProcessor::new(&config);
    let conv = Converter::new(TilingScheme::Zoomify, config, processor);

    let info = conv.convert(&image, None).unwrap();
    let p = conv.processor();

    // Stripes per level: 4, 2, 1, 1. One crop for striping plus one per stripe.
    assert_eq!(p.calls(Op::Crop), 1 + 4 + 2 + 1 + 1);
    // Two merges into level 1, one into level 2, one shrink into level 3
    assert_eq!(p.calls(Op::Montage), 3);
    assert_eq!(p.calls(Op::Scale), 4);
    assert_eq!(p.calls(Op::Resize), 0);
    assert_eq!(p.calls(Op::Assemble), 0);
    assert_eq!(info.total_tiles, 39);

    let geometry = TilesetGeometry::compute(WIDTH, HEIGHT, TILE, TILE).unwrap();
    assert_eq!(info.levels, geometry.levels().to_vec());
}
