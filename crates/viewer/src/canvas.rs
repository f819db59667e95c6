//! Drawing surface contract
//!
//! The viewer never talks to a graphics API directly. Hosts implement
//! [`Canvas`] on top of whatever they draw with; [`RecordingCanvas`] keeps
//! the calls for headless use.

use std::sync::Arc;
use tileview_render::{Bitmap, PixelRect, Rect, Rgba};

pub trait Canvas {
    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    /// Draw `src` of the bitmap (the whole bitmap when `None`) stretched
    /// into `dst`
    fn draw_bitmap(&mut self, bitmap: &Arc<Bitmap>, src: Option<PixelRect>, dst: Rect);

    /// Push the current transform
    fn save(&mut self);

    fn translate(&mut self, dx: f32, dy: f32);

    /// Pop the transform pushed by the matching `save`
    fn restore(&mut self);
}

/// One recorded canvas call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill { rect: Rect, color: Rgba },
    Bitmap { bitmap: Arc<Bitmap>, src: Option<PixelRect>, dst: Rect },
    Save,
    Translate { dx: f32, dy: f32 },
    Restore,
}

/// Canvas that records every call
///
/// Rectangles are recorded as passed, without applying the translation.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Number of bitmaps drawn
    pub fn bitmap_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Bitmap { .. }))
            .count()
    }

    /// Number of background fills
    pub fn fill_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Fill { .. }))
            .count()
    }
}

impl Canvas for RecordingCanvas {
    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.ops.push(DrawOp::Fill { rect, color });
    }

    fn draw_bitmap(&mut self, bitmap: &Arc<Bitmap>, src: Option<PixelRect>, dst: Rect) {
        self.ops.push(DrawOp::Bitmap {
            bitmap: bitmap.clone(),
            src,
            dst,
        });
    }

    fn save(&mut self) {
        self.ops.push(DrawOp::Save);
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        self.ops.push(DrawOp::Translate { dx, dy });
    }

    fn restore(&mut self) {
        self.ops.push(DrawOp::Restore);
    }
}
