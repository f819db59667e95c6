//! Pan and zoom state of the view
//!
//! `offset_x`/`offset_y` locate the top-left corner of the view in content
//! pixels at the current scale. A point `(x, y)` of the unscaled content is
//! therefore drawn at `(x * scale - offset_x, y * scale - offset_y)`.

use crate::config::Insets;
use tileview_render::{Point, Rect};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewportState {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub view_width: f32,
    pub view_height: f32,
    pub padding: Insets,
    pub overscroll: Insets,
    /// Part of the content that pan limits apply to, in unscaled content
    /// units. The whole content box when unset.
    pub content_bounds: Option<Rect>,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
            view_width: 0.0,
            view_height: 0.0,
            padding: Insets::ZERO,
            overscroll: Insets::ZERO,
            content_bounds: None,
        }
    }
}

impl ViewportState {
    /// Viewport at scale 1 with the content box at the padding origin
    pub fn new(view_width: f32, view_height: f32, padding: Insets) -> Self {
        Self {
            offset_x: -padding.left,
            offset_y: -padding.top,
            view_width,
            view_height,
            padding,
            ..Default::default()
        }
    }

    /// Width of the content box at scale 1
    pub fn content_width(&self) -> f32 {
        (self.view_width - self.padding.horizontal()).max(0.0)
    }

    /// Height of the content box at scale 1
    pub fn content_height(&self) -> f32 {
        (self.view_height - self.padding.vertical()).max(0.0)
    }

    pub fn bounds(&self) -> Rect {
        self.content_bounds
            .unwrap_or_else(|| Rect::new(0.0, 0.0, self.content_width(), self.content_height()))
    }

    /// Content point (unscaled) to view coordinates
    pub fn content_to_view(&self, x: f32, y: f32) -> Point {
        Point::new(x * self.scale - self.offset_x, y * self.scale - self.offset_y)
    }

    /// View coordinates to a content point (unscaled)
    pub fn view_to_content(&self, x: f32, y: f32) -> Point {
        Point::new((x + self.offset_x) / self.scale, (y + self.offset_y) / self.scale)
    }

    /// Change the scale keeping the content under `(focus_x, focus_y)` in place
    pub fn scale_around(&mut self, new_scale: f32, focus_x: f32, focus_y: f32) {
        let ratio = new_scale / self.scale;
        self.offset_x = (self.offset_x + focus_x) * ratio - focus_x;
        self.offset_y = (self.offset_y + focus_y) * ratio - focus_y;
        self.scale = new_scale;
    }

    /// Offset that shows the content point `(x, y)` at the center of the
    /// content box, at the given scale
    pub fn offset_centering(&self, x: f32, y: f32, scale: f32) -> Point {
        Point::new(
            x * scale - self.padding.left - self.content_width() / 2.0,
            y * scale - self.padding.top - self.content_height() / 2.0,
        )
    }

    /// Pull the offset back inside the pan limits
    ///
    /// On an axis where the content (plus overscroll) is smaller than the
    /// content box, the content is centered instead.
    pub fn clamp_offset(&mut self) {
        let bounds = self.bounds();
        self.offset_x = clamp_axis(
            self.offset_x,
            bounds.left * self.scale,
            bounds.right * self.scale,
            self.padding.left,
            self.view_width - self.padding.right,
            self.overscroll.left,
            self.overscroll.right,
        );
        self.offset_y = clamp_axis(
            self.offset_y,
            bounds.top * self.scale,
            bounds.bottom * self.scale,
            self.padding.top,
            self.view_height - self.padding.bottom,
            self.overscroll.top,
            self.overscroll.bottom,
        );
    }
}

/// Clamp one axis. `start`/`end` are the content edges at the current scale,
/// `view_start`/`view_end` the content box edges in the view.
fn clamp_axis(
    offset: f32,
    start: f32,
    end: f32,
    view_start: f32,
    view_end: f32,
    overscroll_start: f32,
    overscroll_end: f32,
) -> f32 {
    let min = start - view_start - overscroll_start;
    let max = end - view_end + overscroll_end;
    if min > max {
        (start + end) / 2.0 - (view_start + view_end) / 2.0
    } else {
        offset.clamp(min, max)
    }
}
