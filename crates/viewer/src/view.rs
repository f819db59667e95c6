//! The pan/zoom view
//!
//! `TilesView` turns gestures into viewport changes, keeps the zoom level in
//! step with the scale and draws the visible tiles every frame. It lives on
//! the UI thread; only tile rendering happens on worker threads, which call
//! back through the redraw sink when a tile is ready.

use crate::animation::{Animation, AnimationCallback, FollowUp, Motion};
use crate::canvas::Canvas;
use crate::config::{Insets, ViewerConfig};
use crate::error::ViewerResult;
use crate::traversal::{draw_tiles, FrameOutcome};
use crate::viewport::ViewportState;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;
use tileview_cache::{CacheStats, PoolConfig, TileEvent, TilePool};
use tileview_render::{
    zoom_level_for_scale, Point, Rect, RoundingPolicy, TileRenderer, ZoomBounds, ZoomLevel,
};

/// Called whenever the view needs to be drawn again, possibly from a
/// worker thread
pub type RedrawSink = Arc<dyn Fn() + Send + Sync>;

/// Drawn on top of the tiles every frame
///
/// The canvas is translated so that (0, 0) is the top-left corner of the
/// content at the current scale.
pub trait Layer {
    fn render_layer(
        &self,
        canvas: &mut dyn Canvas,
        scale: f32,
        content_width: f32,
        content_height: f32,
    );
}

impl<F> Layer for F
where
    F: Fn(&mut dyn Canvas, f32, f32, f32),
{
    fn render_layer(
        &self,
        canvas: &mut dyn Canvas,
        scale: f32,
        content_width: f32,
        content_height: f32,
    ) {
        self(canvas, scale, content_width, content_height)
    }
}

/// Receives taps on the content
///
/// The position is given as ratios of the content size, so `(0.5, 0.5)` is
/// the center of the content whatever the current pan and zoom.
pub trait TapHandler {
    fn on_content_tapped(
        &self,
        x_ratio: f32,
        y_ratio: f32,
        content_width: f32,
        content_height: f32,
        scale: f32,
    );
}

impl<F> TapHandler for F
where
    F: Fn(f32, f32, f32, f32, f32),
{
    fn on_content_tapped(
        &self,
        x_ratio: f32,
        y_ratio: f32,
        content_width: f32,
        content_height: f32,
        scale: f32,
    ) {
        self(x_ratio, y_ratio, content_width, content_height, scale)
    }
}

/// What the view is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Panning,
    Scaling,
    /// Snapping to the zoom level chosen when a pinch ended
    Settling,
    /// Running a double-tap or programmatic animation
    Animating,
}

type SharedSink = Arc<RwLock<Option<RedrawSink>>>;

fn fire(sink: &SharedSink) {
    let sink = sink.read().unwrap_or_else(PoisonError::into_inner).clone();
    if let Some(sink) = sink {
        sink();
    }
}

pub struct TilesView {
    config: ViewerConfig,
    bounds: ZoomBounds,
    viewport: ViewportState,
    zoom_level: ZoomLevel,
    state: GestureState,
    pool: TilePool,
    animation: Option<Animation>,
    redraw: SharedSink,
    layers: Vec<Box<dyn Layer>>,
    tap_handler: Option<Box<dyn TapHandler>>,
    zoom_listener: Option<Box<dyn Fn(ZoomLevel)>>,
    loaded_listener: Option<Box<dyn Fn()>>,
    /// The viewport changed since the last fully loaded frame
    load_pending: bool,
}

impl TilesView {
    /// Create a view without a size or renderer
    ///
    /// Fails when the configured zoom bounds are invalid.
    pub fn new(config: ViewerConfig) -> ViewerResult<Self> {
        let bounds = config.validate()?;

        let pool_config =
            PoolConfig::new(config.max_tasks.unwrap_or(0)).with_background(config.background);
        let pool = TilePool::new(pool_config);

        let redraw: SharedSink = Arc::new(RwLock::new(None));
        let sink = redraw.clone();
        pool.set_listener(move |event: TileEvent| {
            log::trace!("tile event {:?}", event);
            fire(&sink);
        });

        let mut viewport = ViewportState::new(0.0, 0.0, config.padding);
        viewport.overscroll = config.overscroll;

        Ok(Self {
            viewport,
            bounds,
            zoom_level: zoom_level_for_scale(1.0, RoundingPolicy::Round, bounds),
            state: GestureState::Idle,
            pool,
            animation: None,
            redraw,
            layers: Vec::new(),
            tap_handler: None,
            zoom_listener: None,
            loaded_listener: None,
            load_pending: true,
            config,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn scale(&self) -> f32 {
        self.viewport.scale
    }

    pub fn zoom_level(&self) -> ZoomLevel {
        self.zoom_level
    }

    pub fn zoom_bounds(&self) -> ZoomBounds {
        self.bounds
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn content_width(&self) -> f32 {
        self.viewport.content_width()
    }

    pub fn content_height(&self) -> f32 {
        self.viewport.content_height()
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn pool(&self) -> &TilePool {
        &self.pool
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.pool.stats()
    }

    /// Install the renderer, or stop rendering with `None`
    ///
    /// Every cached tile is dropped.
    pub fn set_renderer(&mut self, renderer: Option<Arc<dyn TileRenderer>>) {
        self.pool.configure(renderer, self.config.concurrency_safe);
        self.viewport_changed();
    }

    /// Resize the view
    ///
    /// The content box follows the view size, so tiles rendered for the old
    /// size are dropped. The render queue capacity is derived from the new
    /// size unless the configuration fixes it.
    pub fn set_view_size(&mut self, width: f32, height: f32) -> ViewerResult<()> {
        self.config.validate_view_size(width, height)?;

        let first_layout = self.viewport.view_width <= 0.0 || self.viewport.view_height <= 0.0;
        self.viewport.view_width = width;
        self.viewport.view_height = height;
        if first_layout {
            self.viewport.offset_x = -self.viewport.padding.left;
            self.viewport.offset_y = -self.viewport.padding.top;
        }
        self.viewport.clamp_offset();

        self.pool.set_capacity(self.config.max_tasks_for(width, height));
        self.viewport_changed();
        Ok(())
    }

    /// Change the reachable zoom levels
    ///
    /// Invalid or inverted bounds are rejected and the current ones kept.
    pub fn set_zoom_bounds(&mut self, min: u32, max: u32) -> ViewerResult<()> {
        let bounds = match ZoomBounds::new(min, max) {
            Ok(bounds) => bounds,
            Err(err) => {
                log::warn!("rejected zoom bounds {}..{}: {}", min, max, err);
                return Err(err.into());
            }
        };

        self.bounds = bounds;
        self.config.min_zoom_level = min;
        self.config.max_zoom_level = max;

        let scale = bounds.clamp_scale(self.viewport.scale);
        if scale != self.viewport.scale {
            let center = self.view_center();
            self.viewport.scale_around(scale, center.x, center.y);
            self.viewport.clamp_offset();
            self.viewport_changed();
        }
        self.update_zoom_level(RoundingPolicy::Round);
        Ok(())
    }

    pub fn set_padding(&mut self, padding: Insets) -> ViewerResult<()> {
        let view_width = self.viewport.view_width;
        let view_height = self.viewport.view_height;
        if view_width > 0.0 && view_height > 0.0 {
            ViewerConfig {
                padding,
                ..self.config.clone()
            }
            .validate_view_size(view_width, view_height)?;
        }

        self.config.padding = padding;
        self.viewport.padding = padding;
        self.viewport.clamp_offset();
        self.viewport_changed();
        Ok(())
    }

    pub fn set_overscroll(&mut self, overscroll: Insets) {
        self.config.overscroll = overscroll;
        self.viewport.overscroll = overscroll;
        self.viewport.clamp_offset();
        self.viewport_changed();
    }

    /// Restrict panning to part of the content, in unscaled content units
    pub fn set_content_bounds(&mut self, bounds: Option<Rect>) {
        self.viewport.content_bounds = bounds;
        self.viewport.clamp_offset();
        self.viewport_changed();
    }

    pub fn set_redraw_sink(&mut self, sink: impl Fn() + Send + Sync + 'static) {
        let sink: RedrawSink = Arc::new(sink);
        *self.redraw.write().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    /// Called with the new level each time the zoom level changes
    pub fn set_zoom_level_listener(&mut self, listener: impl Fn(ZoomLevel) + 'static) {
        self.zoom_listener = Some(Box::new(listener));
    }

    /// Called on the first fully loaded frame after each viewport change
    pub fn set_view_loaded_listener(&mut self, listener: impl Fn() + 'static) {
        self.loaded_listener = Some(Box::new(listener));
    }

    pub fn add_layer(&mut self, layer: impl Layer + 'static) {
        self.layers.push(Box::new(layer));
        self.request_redraw();
    }

    pub fn clear_layers(&mut self) {
        self.layers.clear();
        self.request_redraw();
    }

    pub fn set_tap_handler(&mut self, handler: impl TapHandler + 'static) {
        self.tap_handler = Some(Box::new(handler));
    }

    /// A finger touched the view
    pub fn on_down(&mut self) {
        self.cancel_animation();
        self.state = GestureState::Idle;
    }

    /// The last finger left the view
    pub fn on_up(&mut self) {
        if self.state == GestureState::Panning {
            self.state = GestureState::Idle;
        }
    }

    /// Move the content by `(dx, dy)` view pixels
    ///
    /// Positive values move the view towards the bottom-right of the content.
    pub fn on_pan_delta(&mut self, dx: f32, dy: f32) {
        self.cancel_animation();
        self.viewport.offset_x += dx;
        self.viewport.offset_y += dy;
        self.viewport.clamp_offset();
        self.state = GestureState::Panning;
        self.viewport_changed();
    }

    /// Multiply the scale by `factor` around the view point `(focus_x, focus_y)`
    pub fn on_scale(&mut self, factor: f32, focus_x: f32, focus_y: f32) {
        self.cancel_animation();
        let scale = self.bounds.clamp_scale(self.viewport.scale * factor);
        self.viewport.scale_around(scale, focus_x, focus_y);
        self.viewport.clamp_offset();
        self.update_zoom_level(RoundingPolicy::Round);
        self.state = GestureState::Scaling;
        self.viewport_changed();
    }

    /// The pinch ended
    ///
    /// The zoom level is snapped in the direction of the last scale factor and
    /// the scale settles on that level's factor.
    pub fn on_scale_end(&mut self, focus_x: f32, focus_y: f32, last_factor: f32) {
        let policy = if last_factor < 1.0 {
            RoundingPolicy::Floor
        } else if last_factor > 1.0 {
            RoundingPolicy::Ceil
        } else {
            RoundingPolicy::Round
        };
        self.settle(policy, Point::new(focus_x, focus_y), Instant::now());
    }

    /// Zoom in around the tapped point
    pub fn on_double_tap(&mut self, x: f32, y: f32) {
        self.cancel_animation();
        let target = (self.viewport.scale * self.config.double_tap_scale * 10.0).round() / 10.0;
        let target = self.bounds.clamp_scale(target);

        let motion = Motion::Scale {
            from: self.viewport.scale,
            to: target,
            focus: Point::new(x, y),
        };
        let duration = self.config.double_tap_duration();
        self.start_animation(
            Animation::new(motion, Instant::now(), duration, FollowUp::Settle),
            GestureState::Animating,
        );
    }

    /// Single tap at the view point `(x, y)`
    pub fn on_tap(&mut self, x: f32, y: f32) {
        let Some(handler) = &self.tap_handler else {
            return;
        };
        let content_width = self.viewport.content_width();
        let content_height = self.viewport.content_height();
        if content_width <= 0.0 || content_height <= 0.0 {
            return;
        }

        let point = self.viewport.view_to_content(x, y);
        handler.on_content_tapped(
            point.x / content_width,
            point.y / content_height,
            content_width,
            content_height,
            self.viewport.scale,
        );
    }

    /// Center the content point `(x, y)` and zoom to `zoom_level`
    ///
    /// `(x, y)` is in unscaled content units. The current level is kept when
    /// `zoom_level` is `None`. A running animation is cancelled first.
    pub fn animate_to(
        &mut self,
        x: f32,
        y: f32,
        zoom_level: Option<ZoomLevel>,
        callback: Option<Box<dyn AnimationCallback>>,
    ) {
        self.cancel_animation();
        let level = self.bounds.clamp(zoom_level.unwrap_or(self.zoom_level));

        let padding = self.viewport.padding;
        let center = self.viewport.view_to_content(
            padding.left + self.viewport.content_width() / 2.0,
            padding.top + self.viewport.content_height() / 2.0,
        );
        let motion = Motion::Center {
            from_scale: self.viewport.scale,
            to_scale: level.factor(),
            from: center,
            to: Point::new(x, y),
        };

        let duration = self.config.double_tap_duration();
        let animation = Animation::new(motion, Instant::now(), duration, FollowUp::Nothing)
            .with_callback(callback);
        self.start_animation(animation, GestureState::Animating);
    }

    /// Advance the running animation to `now`
    ///
    /// Returns `true` while an animation is still running, in which case the
    /// host should draw and tick again on its next frame.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation.take() else {
            return false;
        };

        // A settle keeps the level it snapped to; only the residual scale moves
        let settling = self.state == GestureState::Settling;

        if !animation.is_finished(now) {
            animation.motion.apply(&mut self.viewport, animation.progress(now));
            self.viewport.clamp_offset();
            if !settling {
                self.update_zoom_level(RoundingPolicy::Round);
            }
            self.animation = Some(animation);
            self.viewport_changed();
            return true;
        }

        animation.motion.apply(&mut self.viewport, 1.0);
        self.viewport.clamp_offset();
        if !settling {
            self.update_zoom_level(RoundingPolicy::Round);
        }
        self.state = GestureState::Idle;
        self.viewport_changed();

        let follow_up = animation.follow_up;
        let focus = match animation.motion {
            Motion::Scale { focus, .. } => focus,
            Motion::Center { .. } => self.view_center(),
        };
        animation.finish();

        if follow_up == FollowUp::Settle {
            self.settle(RoundingPolicy::Round, focus, now);
        }
        self.animation.is_some()
    }

    /// Draw the visible tiles and the layers
    pub fn draw(&mut self, canvas: &mut dyn Canvas) -> FrameOutcome {
        let outcome = draw_tiles(
            &mut self.pool,
            &self.viewport,
            self.zoom_level,
            self.config.background,
            canvas,
        );

        if !self.layers.is_empty() {
            let content_width = self.viewport.content_width();
            let content_height = self.viewport.content_height();
            for layer in &self.layers {
                canvas.save();
                canvas.translate(-self.viewport.offset_x, -self.viewport.offset_y);
                layer.render_layer(canvas, self.viewport.scale, content_width, content_height);
                canvas.restore();
            }
        }

        if outcome.fully_loaded && self.load_pending {
            self.load_pending = false;
            log::debug!("view loaded at zoom level {}", self.zoom_level);
            if let Some(listener) = &self.loaded_listener {
                listener();
            }
        }

        outcome
    }

    /// Drop the tiles overlapping `rect` (unscaled content units) so they
    /// render again
    pub fn invalidate(&mut self, rect: Rect) -> usize {
        let invalidated = self.pool.invalidate_region(rect);
        self.load_pending = true;
        self.request_redraw();
        invalidated
    }

    /// Where the content point `(x, y)` currently is in the view
    pub fn position_in_view(&self, x: f32, y: f32) -> Point {
        self.viewport.content_to_view(x, y)
    }

    pub fn request_redraw(&self) {
        fire(&self.redraw);
    }

    fn view_center(&self) -> Point {
        Point::new(self.viewport.view_width / 2.0, self.viewport.view_height / 2.0)
    }

    fn settle(&mut self, policy: RoundingPolicy, focus: Point, now: Instant) {
        self.update_zoom_level(policy);

        let target = self.zoom_level.factor();
        if (self.viewport.scale - target).abs() <= f32::EPSILON {
            self.state = GestureState::Idle;
            return;
        }

        let motion = Motion::Scale {
            from: self.viewport.scale,
            to: target,
            focus,
        };
        self.start_animation(
            Animation::new(motion, now, self.config.settle_duration(), FollowUp::Nothing),
            GestureState::Settling,
        );
    }

    fn start_animation(&mut self, animation: Animation, state: GestureState) {
        self.cancel_animation();
        log::trace!(
            "animating scale {} -> {} over {:?}",
            self.viewport.scale,
            animation.motion.target_scale(),
            animation.duration
        );
        self.animation = Some(animation);
        self.state = state;
        self.request_redraw();
    }

    fn cancel_animation(&mut self) {
        if let Some(animation) = self.animation.take() {
            animation.cancel();
        }
    }

    fn update_zoom_level(&mut self, policy: RoundingPolicy) {
        let level = zoom_level_for_scale(self.viewport.scale, policy, self.bounds);
        if level == self.zoom_level {
            return;
        }
        log::debug!("zoom level {} -> {}", self.zoom_level, level);
        self.zoom_level = level;
        if let Some(listener) = &self.zoom_listener {
            listener(level);
        }
    }

    fn viewport_changed(&mut self) {
        self.load_pending = true;
        self.request_redraw();
    }
}
