//! End-to-end rendering through the view, the pool and the worker threads

use serial_test::serial;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tileview_render::{
    Bitmap, FitMode, PixelRect, Rect, RenderResult, Rgba, TileRegion, TileRenderer, ZoomLevel,
};
use tileview_viewer::{
    DrawOp, FixedSizeContent, FrameOutcome, RecordingCanvas, TilesView, ViewerConfig, VisibleTiles,
};

const DEADLINE: Duration = Duration::from_secs(10);

/// Renderer counting tile renders apart from placeholder renders
fn counting_renderer(tiles: Arc<AtomicUsize>) -> Arc<dyn TileRenderer> {
    Arc::new(move |buffer: &mut Bitmap, region: &TileRegion| -> RenderResult<()> {
        if region.width_ratio < 1.0 {
            tiles.fetch_add(1, Ordering::SeqCst);
        }
        buffer.fill(Rgba::BLACK);
        Ok(())
    })
}

/// Fixed-size drawing callback painting the covered part of the tile black
fn fill_dest(buffer: &mut Bitmap, _source: Rect, dest: Rect) -> RenderResult<()> {
    let rect = PixelRect::new(
        dest.left as i32,
        dest.top as i32,
        dest.right as i32,
        dest.bottom as i32,
    );
    buffer.fill_rect(rect, Rgba::BLACK);
    Ok(())
}

fn square_view(renderer: Arc<dyn TileRenderer>) -> TilesView {
    let mut view = TilesView::new(ViewerConfig::default()).unwrap();
    view.set_view_size(1024.0, 1024.0).unwrap();
    view.set_renderer(Some(renderer));
    view
}

fn frame(view: &mut TilesView) -> (FrameOutcome, RecordingCanvas) {
    let mut canvas = RecordingCanvas::new();
    let outcome = view.draw(&mut canvas);
    (outcome, canvas)
}

fn draw_until_loaded(view: &mut TilesView) -> RecordingCanvas {
    let start = Instant::now();
    loop {
        let (outcome, canvas) = frame(view);
        if outcome.fully_loaded {
            return canvas;
        }
        assert!(start.elapsed() < DEADLINE, "view never finished loading");
        thread::sleep(Duration::from_millis(5));
    }
}

/// Tile bitmaps by grid index, for a view at scale 1 and offset 0
fn tile_bitmaps(canvas: &RecordingCanvas) -> HashMap<(i64, i64), Arc<Bitmap>> {
    canvas
        .ops()
        .iter()
        .filter_map(|op| match op {
            DrawOp::Bitmap { bitmap, src: None, dst } => {
                Some((((dst.left / 256.0) as i64, (dst.top / 256.0) as i64), bitmap.clone()))
            }
            _ => None,
        })
        .collect()
}

#[test]
#[serial]
fn test_first_frame_requests_tiles_and_later_frames_draw_them() {
    let renders = Arc::new(AtomicUsize::new(0));
    let mut view = square_view(counting_renderer(renders.clone()));
    assert_eq!(view.zoom_level(), ZoomLevel::NATIVE);

    let (outcome, _) = frame(&mut view);
    assert!(!outcome.fully_loaded);

    let canvas = draw_until_loaded(&mut view);
    let tiles = tile_bitmaps(&canvas);

    // 4x4 grid, plus one column and one row of background past the content
    assert_eq!(tiles.len(), 16);
    assert_eq!(canvas.fill_count(), 9);
    assert_eq!(renders.load(Ordering::SeqCst), 16);
    assert!(tiles.values().all(|bitmap| bitmap.pixel(0, 0) == Some(Rgba::BLACK)));
}

#[test]
#[serial]
fn test_redraw_sink_fires_when_tiles_complete() {
    let redraws = Arc::new(AtomicUsize::new(0));
    let counter = redraws.clone();
    let mut view = square_view(counting_renderer(Arc::new(AtomicUsize::new(0))));
    view.set_redraw_sink(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    frame(&mut view);
    let start = Instant::now();
    while redraws.load(Ordering::SeqCst) == 0 {
        assert!(start.elapsed() < DEADLINE, "no redraw requested");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
#[serial]
fn test_view_loaded_fires_once_per_viewport_change() {
    let loaded = Arc::new(AtomicUsize::new(0));
    let counter = loaded.clone();
    let mut view = square_view(counting_renderer(Arc::new(AtomicUsize::new(0))));
    view.set_view_loaded_listener(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    draw_until_loaded(&mut view);
    frame(&mut view);
    assert_eq!(loaded.load(Ordering::SeqCst), 1);

    view.on_scale(1.2, 512.0, 512.0);
    assert_eq!(view.zoom_level().get(), 12);
    draw_until_loaded(&mut view);
    frame(&mut view);
    frame(&mut view);
    assert_eq!(loaded.load(Ordering::SeqCst), 2);
}

#[test]
#[serial]
fn test_pinch_past_two_uses_level_eighteen() {
    let mut view = square_view(counting_renderer(Arc::new(AtomicUsize::new(0))));
    view.on_scale(2.03, 0.0, 0.0);

    assert_eq!(view.zoom_level().get(), 18);
    let visible = VisibleTiles::compute(view.viewport(), view.zoom_level());
    assert!((visible.zoom_diff - 2.03 / 1.8).abs() < 1e-4);

    // Level 18 tiles are requested and drawn stretched
    let canvas = draw_until_loaded(&mut view);
    let stretched_width = 256.0 * visible.zoom_diff + 1.0;
    let stretched = canvas.ops().iter().any(|op| {
        matches!(op, DrawOp::Bitmap { src: None, dst, .. }
            if (dst.width() - stretched_width).abs() < 1e-3)
    });
    assert!(stretched);
}

#[test]
#[serial]
fn test_invalidating_one_tile_rerenders_only_that_tile() {
    let renders = Arc::new(AtomicUsize::new(0));
    let mut view = square_view(counting_renderer(renders.clone()));
    let before = tile_bitmaps(&draw_until_loaded(&mut view));
    assert_eq!(renders.load(Ordering::SeqCst), 16);

    assert_eq!(view.invalidate(Rect::new(256.0, 256.0, 512.0, 512.0)), 1);

    let (outcome, canvas) = frame(&mut view);
    assert!(!outcome.fully_loaded);
    let during = tile_bitmaps(&canvas);
    assert!(!during.contains_key(&(1, 1)));
    assert_eq!(during.len(), 15);

    let after = tile_bitmaps(&draw_until_loaded(&mut view));
    assert_eq!(renders.load(Ordering::SeqCst), 17);
    for (index, bitmap) in &before {
        if *index == (1, 1) {
            assert!(!Arc::ptr_eq(bitmap, &after[index]));
        } else {
            assert!(Arc::ptr_eq(bitmap, &after[index]), "tile {:?} changed", index);
        }
    }
}

#[test]
#[serial]
fn test_fixed_size_source_leaves_margins_blank() {
    // 2000x1000 source: the image covers y 256..768 of the 1024 tall content
    let content = FixedSizeContent::new(2000.0, 1000.0);
    let mut view = square_view(Arc::new(content.renderer(fill_dest)));
    content.restrict_panning(&mut view);
    let tiles = tile_bitmaps(&draw_until_loaded(&mut view));

    assert_eq!(tiles[&(0, 0)].pixel(10, 10), Some(Rgba::WHITE));
    assert_eq!(tiles[&(0, 1)].pixel(10, 10), Some(Rgba::BLACK));
    assert_eq!(tiles[&(2, 3)].pixel(10, 10), Some(Rgba::WHITE));
}

/// Invalidate `source` and return the indices missing from the next frame
fn invalidate_source(content: FixedSizeContent, source: Rect) -> Vec<(i64, i64)> {
    let mut view = square_view(Arc::new(content.renderer(fill_dest)));
    let before = tile_bitmaps(&draw_until_loaded(&mut view));

    assert_eq!(content.invalidate(&mut view, source), 1);

    let during = tile_bitmaps(&frame(&mut view).1);
    let after = tile_bitmaps(&draw_until_loaded(&mut view));
    for (index, bitmap) in &during {
        assert!(Arc::ptr_eq(bitmap, &after[index]), "tile {:?} changed", index);
    }
    before
        .keys()
        .filter(|index| !during.contains_key(*index))
        .copied()
        .collect()
}

#[test]
#[serial]
fn test_fixed_size_invalidate_skips_letterbox_margin() {
    // 2000x1000 contained in 1024x1024: 0.512 content units per source pixel,
    // 256 units of margin above the image
    let content = FixedSizeContent::new(2000.0, 1000.0);
    let missing = invalidate_source(content, Rect::new(100.0, 100.0, 400.0, 400.0));
    assert_eq!(missing, vec![(0, 1)]);
}

#[test]
#[serial]
fn test_fixed_size_invalidate_follows_crop_offset() {
    // Cropped, the source starts 512 content units left of the view
    let content = FixedSizeContent::new(2000.0, 1000.0).with_mode(FitMode::Crop);
    let missing = invalidate_source(content, Rect::new(600.0, 50.0, 700.0, 150.0));
    assert_eq!(missing, vec![(0, 0)]);
}
