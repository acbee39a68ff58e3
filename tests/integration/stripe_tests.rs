//! Stripe manager behavior against the recording processor.
//!
//! Tests verify:
//! - Pairing: merges for neighbours, a single shrink for an odd last stripe
//! - Repeated halving ends in exactly one stripe
//! - Canvas padding keeps every level on the tile grid
//! - Failed merges leave their artifacts tracked for purging

use pyramid_tiler::{
    BackgroundColor, Canvas, Gravity, Orientation, StripeManager, TileFormat, TilingError,
    Workspace,
};

use super::test_utils::{test_config, Op, RecordingProcessor, TestDirs};

#[test]
fn test_odd_stripe_count_is_shrunk_once() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", 80, 50);
    let config = test_config(&dirs.work, 16, TileFormat::Png);
    let processor = RecordingProcessor::new(&config);
    let ws = Workspace::open(&dirs.work, "map").unwrap();
    let manager = StripeManager::new(&processor, &ws, BackgroundColor::WHITE);

    let base = manager
        .stripe_image(&image, Orientation::Vertical, 16, 50, None, "0")
        .unwrap();
    assert_eq!(base.len(), 5);

    let next = manager.next_level(&base, None, 1).unwrap();
    assert_eq!(next.len(), 3);
    // Two merges, one lone shrink
    assert_eq!(processor.calls(Op::Montage), 2);
    assert_eq!(processor.calls(Op::Scale), 3);

    assert_eq!((next[0].width(), next[0].height()), (16, 25));
    assert_eq!((next[2].width(), next[2].height()), (8, 25));
}

#[test]
fn test_halving_converges_to_one_stripe() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", 16 * 9, 20);
    let config = test_config(&dirs.work, 16, TileFormat::Png);
    let processor = RecordingProcessor::new(&config);
    let ws = Workspace::open(&dirs.work, "map").unwrap();
    let manager = StripeManager::new(&processor, &ws, BackgroundColor::WHITE);

    let mut stripes = manager
        .stripe_image(&image, Orientation::Vertical, 16, 20, None, "0")
        .unwrap();
    let mut counts = vec![stripes.len()];
    let mut level = 1;
    while stripes.len() > 1 {
        let next = manager.next_level(&stripes, None, level).unwrap();
        assert_eq!(manager.release(&stripes), 0);
        stripes = next;
        counts.push(stripes.len());
        level += 1;
    }

    assert_eq!(counts, vec![9, 5, 3, 2, 1]);
    // Only the last stripe is still tracked
    assert_eq!(ws.live_count(), 1);
}

#[test]
fn test_canvas_keeps_levels_on_grid() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", 48, 40);
    let config = test_config(&dirs.work, 16, TileFormat::Png);
    let processor = RecordingProcessor::new(&config);
    let ws = Workspace::open(&dirs.work, "map").unwrap();
    let manager = StripeManager::new(&processor, &ws, BackgroundColor::WHITE);

    // Three tile rows of 16 cover the 40 pixel height
    let canvas = Canvas::new(16, 48, Gravity::SouthWest, BackgroundColor::WHITE);
    let base = manager
        .stripe_image(&image, Orientation::Vertical, 16, 40, Some(&canvas), "0")
        .unwrap();
    assert!(base.iter().all(|s| (s.width(), s.height()) == (16, 48)));

    let canvas = Canvas::new(16, 32, Gravity::SouthWest, BackgroundColor::WHITE);
    let next = manager.next_level(&base, Some(&canvas), 1).unwrap();
    assert_eq!(next.len(), 2);
    for stripe in &next {
        assert_eq!((stripe.width(), stripe.height()), (16, 32));
        assert_eq!(image::image_dimensions(stripe.path()).unwrap(), (16, 32));
    }
}

#[test]
fn test_failed_merge_leaves_tracked_artifacts() {
    let dirs = TestDirs::new();
    let image = dirs.image("map.png", 64, 16);
    let config = test_config(&dirs.work, 16, TileFormat::Png);
    let processor = RecordingProcessor::new(&config).failing_on(Op::Scale, 1);
    let ws = Workspace::open(&dirs.work, "map").unwrap();
    let manager = StripeManager::new(&processor, &ws, BackgroundColor::WHITE);

    let base = manager
        .stripe_image(&image, Orientation::Vertical, 16, 16, None, "0")
        .unwrap();
    let result = manager.next_level(&base, None, 1);
    assert!(matches!(result, Err(TilingError::ProcessingFailure { .. })));

    // Base stripes, the joined pair and the unwritten target
    assert_eq!(ws.live_count(), 4 + 2);
    assert_eq!(ws.purge(), 0);
    assert_eq!(std::fs::read_dir(&dirs.work).unwrap().count(), 0);
}
