//! Per-frame tile culling and drawing
//!
//! Each frame computes the range of tile indices covering the view, walks it
//! as a spiral from the outer ring inwards and asks the pool for every tile
//! on the way. Tiles are submitted outer ring first, so the LIFO scheduler
//! renders the center of the view before its edges.

use crate::canvas::Canvas;
use crate::viewport::ViewportState;
use std::sync::Arc;
use tileview_cache::TilePool;
use tileview_render::{
    residual_scale, tile_size_on_content, Bitmap, PixelRect, Rect, Rgba, TileGrid, ZoomLevel,
    TILE_SIZE,
};

/// Inclusive rectangle of tile indices
///
/// Empty when `start > stop` on either axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub start_x: i64,
    pub start_y: i64,
    pub stop_x: i64,
    pub stop_y: i64,
}

impl TileRange {
    pub fn new(start_x: i64, start_y: i64, stop_x: i64, stop_y: i64) -> Self {
        Self {
            start_x,
            start_y,
            stop_x,
            stop_y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_x > self.stop_x || self.start_y > self.stop_y
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.start_x && x <= self.stop_x && y >= self.start_y && y <= self.stop_y
    }

    /// Number of indices in the range
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.stop_x - self.start_x + 1) * (self.stop_y - self.start_y + 1)) as usize
    }

    pub fn intersect(&self, other: &TileRange) -> TileRange {
        TileRange::new(
            self.start_x.max(other.start_x),
            self.start_y.max(other.start_y),
            self.stop_x.min(other.stop_x),
            self.stop_y.min(other.stop_y),
        )
    }
}

/// The tiles a frame has to deal with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleTiles {
    pub zoom_level: ZoomLevel,
    /// Stretch applied to tiles of `zoom_level` at the current scale
    pub zoom_diff: f32,
    /// Every index that overlaps the view, including indices outside the
    /// content
    pub screen: TileRange,
    /// The part of `screen` that exists in the tile grid
    pub grid: TileRange,
}

impl VisibleTiles {
    pub fn compute(viewport: &ViewportState, zoom_level: ZoomLevel) -> Self {
        let scale = viewport.scale;
        let tile_on_content = tile_size_on_content(zoom_level);

        let offset_x = viewport.offset_x / scale;
        let offset_y = viewport.offset_y / scale;
        let screen_width = viewport.view_width / scale;
        let screen_height = viewport.view_height / scale;

        let mut start_x = (offset_x / tile_on_content) as i64;
        let mut start_y = (offset_y / tile_on_content) as i64;
        let stop_x = ((offset_x + screen_width) / tile_on_content) as i64;
        let stop_y = ((offset_y + screen_height) / tile_on_content) as i64;

        // Truncation rounds towards zero, one more index is needed before it
        if offset_x < 0.0 {
            start_x -= 1;
        }
        if offset_y < 0.0 {
            start_y -= 1;
        }
        let screen = TileRange::new(start_x, start_y, stop_x, stop_y);

        let cells = TileGrid::for_content(
            viewport.content_width(),
            viewport.content_height(),
            zoom_level,
        );
        let grid = TileRange::new(0, 0, i64::from(cells.columns) - 1, i64::from(cells.rows) - 1);

        Self {
            zoom_level,
            zoom_diff: residual_scale(scale, zoom_level),
            screen,
            grid: screen.intersect(&grid),
        }
    }

    /// Where the tile at `(x, y)` lands in the view
    ///
    /// Stretched tiles get one extra pixel so rounding never leaves a seam.
    pub fn tile_rect(&self, x: i64, y: i64, viewport: &ViewportState) -> Rect {
        let size = TILE_SIZE as f32 * self.zoom_diff;
        let spread = if self.zoom_diff != 1.0 { 1.0 } else { 0.0 };
        let left = x as f32 * size - viewport.offset_x;
        let top = y as f32 * size - viewport.offset_y;
        Rect::new(left, top, left + size + spread, top + size + spread)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

/// Visits every index of a range once, ring by ring from the outside in
///
/// Each ring goes along the top row left to right, down the right column,
/// back along the bottom row and up the left column.
#[derive(Debug, Clone)]
pub struct Spiral {
    left: i64,
    top: i64,
    right: i64,
    bottom: i64,
    side: Side,
    cursor: i64,
}

impl Spiral {
    pub fn new(range: TileRange) -> Self {
        Self {
            left: range.start_x,
            top: range.start_y,
            right: range.stop_x,
            bottom: range.stop_y,
            side: Side::Top,
            cursor: range.start_x,
        }
    }
}

impl Iterator for Spiral {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.left > self.right || self.top > self.bottom {
                return None;
            }

            match self.side {
                Side::Top => {
                    if self.cursor <= self.right {
                        self.cursor += 1;
                        return Some((self.cursor - 1, self.top));
                    }
                    self.side = Side::Right;
                    self.cursor = self.top + 1;
                }
                Side::Right => {
                    if self.cursor <= self.bottom {
                        self.cursor += 1;
                        return Some((self.right, self.cursor - 1));
                    }
                    self.side = Side::Bottom;
                    self.cursor = self.right - 1;
                }
                Side::Bottom => {
                    // A single row was covered by the top pass
                    if self.top < self.bottom && self.cursor >= self.left {
                        self.cursor -= 1;
                        return Some((self.cursor + 1, self.bottom));
                    }
                    self.side = Side::Left;
                    self.cursor = self.bottom - 1;
                }
                Side::Left => {
                    if self.left < self.right && self.cursor > self.top {
                        self.cursor -= 1;
                        return Some((self.left, self.cursor + 1));
                    }
                    self.left += 1;
                    self.top += 1;
                    self.right -= 1;
                    self.bottom -= 1;
                    self.side = Side::Top;
                    self.cursor = self.left;
                }
            }
        }
    }
}

/// Result of drawing one frame of tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameOutcome {
    /// Every tile inside the grid was drawn from its final bitmap
    pub fully_loaded: bool,
    pub tiles_drawn: usize,
    pub placeholders_drawn: usize,
}

/// The part of the placeholder standing in for one tile
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlaceholderCrop {
    pub src: PixelRect,
    pub dst: Rect,
    /// Background to draw where the crop runs past the placeholder
    pub right_strip: Option<Rect>,
    pub bottom_strip: Option<Rect>,
}

/// Crop the placeholder for the tile at `(x, y)` drawn into `dst`
///
/// `ratio_x`/`ratio_y` are content units per placeholder pixel. Returns
/// `None` when the tile lies entirely past the placeholder.
#[allow(clippy::too_many_arguments)]
pub(crate) fn crop_placeholder(
    x: i64,
    y: i64,
    mut dst: Rect,
    placeholder: &Bitmap,
    ratio_x: f32,
    ratio_y: f32,
    scale: f32,
    zoom_diff: f32,
) -> Option<PlaceholderCrop> {
    let tile_on_screen = TILE_SIZE as f32 * zoom_diff;
    let per_tile_x = tile_on_screen / ratio_x / scale;
    let per_tile_y = tile_on_screen / ratio_y / scale;
    let width = placeholder.width() as i32;
    let height = placeholder.height() as i32;

    let mut src = PixelRect::new(
        (x as f32 * per_tile_x) as i32,
        (y as f32 * per_tile_y) as i32,
        ((x + 1) as f32 * per_tile_x) as i32,
        ((y + 1) as f32 * per_tile_y) as i32,
    );
    if src.left >= width || src.top >= height {
        return None;
    }

    let mut right_strip = None;
    if src.right > width {
        let overflow = (src.right - width) as f32 * tile_on_screen / per_tile_x;
        right_strip = Some(Rect::new(dst.right - overflow - 1.0, dst.top, dst.right, dst.bottom));
        dst.right -= overflow;
        src.right = width;
    }

    let mut bottom_strip = None;
    if src.bottom > height {
        let overflow = (src.bottom - height) as f32 * tile_on_screen / per_tile_y;
        bottom_strip = Some(Rect::new(
            dst.left,
            dst.bottom - overflow - 1.0,
            dst.right,
            dst.bottom,
        ));
        dst.bottom -= overflow;
        src.bottom = height;
    }

    Some(PlaceholderCrop {
        src,
        dst,
        right_strip,
        bottom_strip,
    })
}

/// What a visited index resolved to before anything is drawn
enum Slot {
    OutsideGrid,
    Ready(Arc<Bitmap>),
    Pending,
}

/// Draw the tiles covering the view
///
/// Tiles that are not rendered yet are replaced by the matching crop of the
/// placeholder, or by the background while there is no placeholder either.
/// Indices outside the grid get the background.
///
/// Every visible tile is requested before the placeholder so that, on the
/// LIFO render queue, the placeholder is the next job a worker picks up.
pub fn draw_tiles(
    pool: &mut TilePool,
    viewport: &ViewportState,
    zoom_level: ZoomLevel,
    background: Rgba,
    canvas: &mut dyn Canvas,
) -> FrameOutcome {
    let visible = VisibleTiles::compute(viewport, zoom_level);
    let content_width = viewport.content_width();
    let content_height = viewport.content_height();

    let slots: Vec<(i64, i64, Slot)> = Spiral::new(visible.screen)
        .map(|(x, y)| {
            let slot = if !visible.grid.contains(x, y) {
                Slot::OutsideGrid
            } else {
                match pool.get_tile(zoom_level, x, y, content_width, content_height) {
                    Some(bitmap) => Slot::Ready(bitmap),
                    None => Slot::Pending,
                }
            };
            (x, y, slot)
        })
        .collect();

    let placeholder = pool.get_placeholder(content_width, content_height);

    let mut outcome = FrameOutcome {
        fully_loaded: true,
        ..Default::default()
    };

    for (x, y, slot) in slots {
        let dst = visible.tile_rect(x, y, viewport);
        match slot {
            Slot::OutsideGrid => canvas.fill_rect(dst, background),
            Slot::Ready(bitmap) => {
                canvas.draw_bitmap(&bitmap, None, dst);
                outcome.tiles_drawn += 1;
            }
            Slot::Pending => {
                outcome.fully_loaded = false;
                match &placeholder {
                    Some(placeholder) => {
                        let drawn = draw_placeholder(
                            canvas, placeholder, x, y, dst, viewport, &visible, background,
                        );
                        if drawn {
                            outcome.placeholders_drawn += 1;
                        }
                    }
                    None => canvas.fill_rect(dst, background),
                }
            }
        }
    }

    outcome
}

#[allow(clippy::too_many_arguments)]
fn draw_placeholder(
    canvas: &mut dyn Canvas,
    placeholder: &Arc<Bitmap>,
    x: i64,
    y: i64,
    dst: Rect,
    viewport: &ViewportState,
    visible: &VisibleTiles,
    background: Rgba,
) -> bool {
    let ratio_x = viewport.content_width() / placeholder.width() as f32;
    let ratio_y = viewport.content_height() / placeholder.height() as f32;

    let crop = crop_placeholder(
        x,
        y,
        dst,
        placeholder,
        ratio_x,
        ratio_y,
        viewport.scale,
        visible.zoom_diff,
    );
    let Some(crop) = crop else {
        canvas.fill_rect(dst, background);
        return false;
    };

    for strip in [crop.right_strip, crop.bottom_strip].into_iter().flatten() {
        canvas.fill_rect(strip, background);
    }
    canvas.draw_bitmap(placeholder, Some(crop.src), crop.dst);
    true
}
