//! Geometry and addressing arithmetic through the public API.
//!
//! Tests verify:
//! - Level grids of the reference fixtures
//! - Zoomify tile group bucketing
//! - Google Maps square sizing

use pyramid_tiler::scheme::{last_group_size, tile_group, tile_group_count};
use pyramid_tiler::{square_size, LevelGrid, TilesetGeometry, TilingError};

// =============================================================================
// Level Grids
// =============================================================================

#[test]
fn test_tms_reference_image() {
    let g = TilesetGeometry::compute(4670, 2000, 256, 256).unwrap();
    assert_eq!(g.level(0), LevelGrid { x_tiles: 19, y_tiles: 8 });
    assert_eq!(g.zoom_levels(), 6);
    assert_eq!(g.total_tiles(), 208);
    assert_eq!(g.level(g.zoom_levels() - 1), LevelGrid { x_tiles: 1, y_tiles: 1 });
}

#[test]
fn test_zoomify_reference_image() {
    let g = TilesetGeometry::compute(5816, 3961, 256, 256).unwrap();
    assert_eq!(g.level(0), LevelGrid { x_tiles: 23, y_tiles: 16 });
    assert_eq!(g.zoom_levels(), 6);
    assert_eq!(g.total_tiles(), 497);

    assert_eq!(tile_group_count(g.total_tiles()), 2);
    assert_eq!(last_group_size(g.total_tiles()), 241);
}

#[test]
fn test_raster_index_of_first_tile_per_zoom() {
    let g = TilesetGeometry::compute(5816, 3961, 256, 256).unwrap();
    // Zoom 0 starts at 0, each finer zoom after all coarser tiles
    let starts: Vec<u64> = (0..g.zoom_levels())
        .rev()
        .map(|level| g.tiles_above(level))
        .collect();
    assert_eq!(starts, vec![0, 1, 3, 9, 33, 129]);

    // The first tile of zoom 5 is still in group 0, the last is in group 1
    assert_eq!(tile_group(129), 0);
    assert_eq!(tile_group(496), 1);
}

#[test]
fn test_geometry_after_recompute_matches_fresh() {
    let mut g = TilesetGeometry::compute(4670, 2000, 256, 256).unwrap();
    let size = square_size(4670, 2000, 256);
    g.recompute(size, size).unwrap();

    assert_eq!(g, TilesetGeometry::compute(4096, 4096, 256, 256).unwrap());
    assert!(g.levels().iter().all(|l| l.x_tiles == l.y_tiles));
}

#[test]
fn test_zero_dimensions_rejected() {
    assert!(matches!(
        TilesetGeometry::compute(0, 0, 256, 256),
        Err(TilingError::InvalidDimension(_))
    ));
}

// =============================================================================
// Square Size
// =============================================================================

#[test]
fn test_square_size_never_below_one_tile() {
    for (w, h) in [(1, 1), (100, 50), (255, 255)] {
        assert_eq!(square_size(w, h, 256), 256);
    }
}

#[test]
fn test_square_size_nearest_power() {
    assert_eq!(square_size(700, 10, 256), 512);
    assert_eq!(square_size(800, 10, 256), 1024);
    assert_eq!(square_size(10, 3000, 256), 2048);
}
