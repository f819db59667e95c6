//! Transforms for content with intrinsic pixel dimensions
//!
//! A fixed-size source (a decoded image, a scanned page) is placed inside the
//! content box at scale 1 and centered. [`CenterCrop`] is the single
//! transform between content space and source space: tile rendering, tap
//! hit-testing, overlay layers and invalidation all go through it so that
//! what is drawn and what is hit always agree.

use crate::bitmap::Bitmap;
use crate::error::RenderResult;
use crate::geometry::{Point, Rect};
use crate::renderer::TileRenderer;
use crate::tile::TileRegion;
use serde::{Deserialize, Serialize};

/// How the source is fitted into the content box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitMode {
    /// The whole source is visible, centered with equal margins on the
    /// axis it does not fill
    #[default]
    Contain,

    /// The shorter source dimension fills the box, the longer one is
    /// centered with equal overflow on both sides
    Crop,
}

/// Content/source coordinate transform for one content size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterCrop {
    source_width: f32,
    source_height: f32,
    content_width: f32,
    content_height: f32,
    /// Content units per source pixel at scale 1
    initial_scale: f32,
    offset_x: f32,
    offset_y: f32,
}

/// Where a tile lands on the source, and which part of the tile buffer it covers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceMapping {
    /// Rectangle on the source, in source pixels, clipped to the source
    pub source: Rect,

    /// Rectangle in the tile buffer, in buffer pixels
    pub dest: Rect,
}

impl CenterCrop {
    pub fn new(
        source_width: f32,
        source_height: f32,
        content_width: f32,
        content_height: f32,
        mode: FitMode,
    ) -> Self {
        let scale_x = content_width / source_width;
        let scale_y = content_height / source_height;
        let initial_scale = match mode {
            FitMode::Contain => scale_x.min(scale_y),
            FitMode::Crop => scale_x.max(scale_y),
        };

        Self {
            source_width,
            source_height,
            content_width,
            content_height,
            initial_scale,
            offset_x: (content_width - source_width * initial_scale) / 2.0,
            offset_y: (content_height - source_height * initial_scale) / 2.0,
        }
    }

    /// Content units per source pixel at scale 1
    pub fn initial_scale(&self) -> f32 {
        self.initial_scale
    }

    /// Screen pixels per source pixel at the given view scale
    pub fn source_scale(&self, scale: f32) -> f32 {
        self.initial_scale * scale
    }

    /// Size on screen of a length measured in source pixels
    pub fn scaled(&self, source_pixels: f32, scale: f32) -> f32 {
        source_pixels * self.source_scale(scale)
    }

    pub fn content_to_source(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.offset_x) / self.initial_scale,
            (point.y - self.offset_y) / self.initial_scale,
        )
    }

    /// Convert ratios relative to the content size into source pixels
    pub fn content_ratio_to_source(&self, x_ratio: f32, y_ratio: f32) -> Point {
        self.content_to_source(Point::new(
            x_ratio * self.content_width,
            y_ratio * self.content_height,
        ))
    }

    pub fn source_to_content(&self, point: Point) -> Point {
        Point::new(
            self.offset_x + point.x * self.initial_scale,
            self.offset_y + point.y * self.initial_scale,
        )
    }

    pub fn content_rect_to_source(&self, rect: &Rect) -> Rect {
        let top_left = self.content_to_source(Point::new(rect.left, rect.top));
        let bottom_right = self.content_to_source(Point::new(rect.right, rect.bottom));
        Rect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }

    pub fn source_rect_to_content(&self, rect: &Rect) -> Rect {
        let top_left = self.source_to_content(Point::new(rect.left, rect.top));
        let bottom_right = self.source_to_content(Point::new(rect.right, rect.bottom));
        Rect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }

    /// The source image bounds in unscaled content units
    pub fn content_bounds(&self) -> Rect {
        self.source_rect_to_content(&Rect::new(0.0, 0.0, self.source_width, self.source_height))
    }

    /// Translation to apply before drawing in source coordinates at `scale`
    pub fn layer_origin(&self, scale: f32) -> Point {
        Point::new(self.offset_x * scale, self.offset_y * scale)
    }

    /// Map tap ratios onto the source, `None` when the tap missed the source
    pub fn tap_to_source(&self, x_ratio: f32, y_ratio: f32) -> Option<Point> {
        let point = self.content_ratio_to_source(x_ratio, y_ratio);
        let inside = point.x >= 0.0
            && point.x <= self.source_width
            && point.y >= 0.0
            && point.y <= self.source_height;
        inside.then_some(point)
    }

    /// Project a tile onto the source
    ///
    /// Returns `None` when the tile lies completely outside the source. At
    /// the source edges the tile may only be partly covered; the source
    /// rectangle is then clipped and the destination shrunk by the same
    /// amount, so callers never read outside the source.
    pub fn map_region(
        &self,
        region: &TileRegion,
        buffer_width: u32,
        buffer_height: u32,
    ) -> Option<SourceMapping> {
        let mut source = self.content_rect_to_source(&region.content_rect());

        if source.right <= 0.0
            || source.left >= self.source_width
            || source.bottom <= 0.0
            || source.top >= self.source_height
        {
            return None;
        }

        let mut dest = Rect::new(0.0, 0.0, buffer_width as f32, buffer_height as f32);
        let buffer_per_source = self.initial_scale * region.scale_for_buffer(buffer_width);

        if source.top < 0.0 {
            dest.top -= source.top * buffer_per_source;
            source.top = 0.0;
        }
        if source.left < 0.0 {
            dest.left -= source.left * buffer_per_source;
            source.left = 0.0;
        }
        if source.right > self.source_width {
            dest.right += (self.source_width - source.right) * buffer_per_source;
            source.right = self.source_width;
        }
        if source.bottom > self.source_height {
            dest.bottom += (self.source_height - source.bottom) * buffer_per_source;
            source.bottom = self.source_height;
        }

        Some(SourceMapping { source, dest })
    }
}

/// Renderer adapter for fixed-size sources
///
/// Wraps a callback that copies `source` (source pixels) into `dest` (buffer
/// pixels). Tiles outside the source are left with the background color.
pub struct FixedSizeRenderer<F> {
    source_width: f32,
    source_height: f32,
    mode: FitMode,
    draw: F,
}

impl<F> FixedSizeRenderer<F>
where
    F: Fn(&mut Bitmap, Rect, Rect) -> RenderResult<()> + Send + Sync,
{
    pub fn new(source_width: f32, source_height: f32, draw: F) -> Self {
        Self {
            source_width,
            source_height,
            mode: FitMode::default(),
            draw,
        }
    }

    pub fn with_mode(mut self, mode: FitMode) -> Self {
        self.mode = mode;
        self
    }
}

impl<F> TileRenderer for FixedSizeRenderer<F>
where
    F: Fn(&mut Bitmap, Rect, Rect) -> RenderResult<()> + Send + Sync,
{
    fn render(&self, buffer: &mut Bitmap, region: &TileRegion) -> RenderResult<()> {
        let crop = CenterCrop::new(
            self.source_width,
            self.source_height,
            region.content_width,
            region.content_height,
            self.mode,
        );

        match crop.map_region(region, buffer.width(), buffer.height()) {
            Some(mapping) => (self.draw)(buffer, mapping.source, mapping.dest),
            None => Ok(()),
        }
    }
}
