//! View helpers for content with intrinsic pixel dimensions
//!
//! Everything here converts through the same [`CenterCrop`] the
//! [`FixedSizeRenderer`] uses, so taps, overlays and animations line up with
//! the rendered tiles.

use crate::animation::AnimationCallback;
use crate::canvas::Canvas;
use crate::view::{Layer, TapHandler, TilesView};
use tileview_render::{
    zoom_level_for_scale, Bitmap, CenterCrop, FitMode, FixedSizeRenderer, Point, Rect,
    RenderResult, RoundingPolicy, ZoomLevel,
};

/// A source of `width` x `height` pixels placed in the view's content box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedSizeContent {
    pub source_width: f32,
    pub source_height: f32,
    pub mode: FitMode,
}

impl FixedSizeContent {
    pub fn new(source_width: f32, source_height: f32) -> Self {
        Self {
            source_width,
            source_height,
            mode: FitMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: FitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Transform for a content box of the given size
    pub fn crop(&self, content_width: f32, content_height: f32) -> CenterCrop {
        CenterCrop::new(
            self.source_width,
            self.source_height,
            content_width,
            content_height,
            self.mode,
        )
    }

    fn crop_for(&self, view: &TilesView) -> CenterCrop {
        self.crop(view.content_width(), view.content_height())
    }

    /// Renderer drawing `source` (source pixels) into `dest` (tile pixels)
    pub fn renderer<F>(&self, draw: F) -> FixedSizeRenderer<F>
    where
        F: Fn(&mut Bitmap, Rect, Rect) -> RenderResult<()> + Send + Sync,
    {
        FixedSizeRenderer::new(self.source_width, self.source_height, draw).with_mode(self.mode)
    }

    /// Limit panning to the source image
    pub fn restrict_panning(&self, view: &mut TilesView) {
        let bounds = self.crop_for(view).content_bounds();
        view.set_content_bounds(Some(bounds));
    }

    /// Where the source pixel `(x, y)` currently is in the view
    pub fn position_in_view(&self, view: &TilesView, x: f32, y: f32) -> Point {
        let content = self.crop_for(view).source_to_content(Point::new(x, y));
        view.position_in_view(content.x, content.y)
    }

    /// Center the view on the source pixel `(x, y)`
    pub fn animate_to(
        &self,
        view: &mut TilesView,
        x: f32,
        y: f32,
        zoom_level: Option<ZoomLevel>,
        callback: Option<Box<dyn AnimationCallback>>,
    ) {
        let content = self.crop_for(view).source_to_content(Point::new(x, y));
        view.animate_to(content.x, content.y, zoom_level, callback);
    }

    /// Fit `bounds` (source pixels) in the view, centered
    ///
    /// Picks the deepest zoom level whose scale still shows all of `bounds`.
    pub fn animate_to_bounds(
        &self,
        view: &mut TilesView,
        bounds: Rect,
        callback: Option<Box<dyn AnimationCallback>>,
    ) {
        let target = self.crop_for(view).source_rect_to_content(&bounds);
        let fit_x = view.content_width() / target.width();
        let fit_y = view.content_height() / target.height();
        // Snap down to tenths so rounding never picks a level past the fit
        let fit = (fit_x.min(fit_y) * 10.0).floor() / 10.0;
        let level = zoom_level_for_scale(fit, RoundingPolicy::Floor, view.zoom_bounds());

        let center_x = (target.left + target.right) / 2.0;
        let center_y = (target.top + target.bottom) / 2.0;
        view.animate_to(center_x, center_y, Some(level), callback);
    }

    /// Render again the tiles covering `rect`, given in source pixels
    ///
    /// Returns the number of tiles invalidated.
    pub fn invalidate(&self, view: &mut TilesView, rect: Rect) -> usize {
        let content = self.crop_for(view).source_rect_to_content(&rect);
        view.invalidate(content)
    }

    /// Overlay drawn in source pixel coordinates
    pub fn layer<F>(&self, draw: F) -> FixedSizeLayer<F>
    where
        F: Fn(&mut dyn Canvas, &SourceScale),
    {
        FixedSizeLayer { content: *self, draw }
    }

    /// Tap handler receiving source pixel coordinates and the number of
    /// screen pixels per source pixel
    ///
    /// Taps outside the source are ignored.
    pub fn tap_handler<F>(&self, handler: F) -> FixedSizeTapHandler<F>
    where
        F: Fn(f32, f32, f32),
    {
        FixedSizeTapHandler {
            content: *self,
            handler,
        }
    }
}

/// Scale information handed to a [`FixedSizeLayer`]
#[derive(Debug, Clone, Copy)]
pub struct SourceScale {
    crop: CenterCrop,
    scale: f32,
}

impl SourceScale {
    /// On-screen size of a length measured in source pixels
    pub fn scaled(&self, source_pixels: f32) -> f32 {
        self.crop.scaled(source_pixels, self.scale)
    }

    /// View scale, 1 meaning the content fits the view
    pub fn scale(&self) -> f32 {
        self.scale
    }
}

pub struct FixedSizeLayer<F> {
    content: FixedSizeContent,
    draw: F,
}

impl<F> Layer for FixedSizeLayer<F>
where
    F: Fn(&mut dyn Canvas, &SourceScale),
{
    fn render_layer(
        &self,
        canvas: &mut dyn Canvas,
        scale: f32,
        content_width: f32,
        content_height: f32,
    ) {
        let crop = self.content.crop(content_width, content_height);
        let origin = crop.layer_origin(scale);

        canvas.save();
        canvas.translate(origin.x, origin.y);
        (self.draw)(canvas, &SourceScale { crop, scale });
        canvas.restore();
    }
}

pub struct FixedSizeTapHandler<F> {
    content: FixedSizeContent,
    handler: F,
}

impl<F> TapHandler for FixedSizeTapHandler<F>
where
    F: Fn(f32, f32, f32),
{
    fn on_content_tapped(
        &self,
        x_ratio: f32,
        y_ratio: f32,
        content_width: f32,
        content_height: f32,
        scale: f32,
    ) {
        let crop = self.content.crop(content_width, content_height);
        if let Some(point) = crop.tap_to_source(x_ratio, y_ratio) {
            (self.handler)(point.x, point.y, crop.source_scale(scale));
        }
    }
}
