//! Viewer configuration

use crate::error::{ViewerError, ViewerResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tileview_render::zoom::{MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL};
use tileview_render::{Rgba, ZoomBounds, TILE_SIZE};

/// Per-edge distances in view pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Insets {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Insets {
    pub const ZERO: Insets = Insets::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

/// Screen coverage assumed per tile when sizing the render queue
const TILE_COVERAGE: f32 = 0.9;

/// Render queue capacity for a view of the given size
///
/// Enough tasks for every tile that can be on screen at once, plus one row
/// and one column of margin, with tiles shrunk slightly so a zoom-out in
/// progress still fits.
pub fn capacity_for_view(width: f32, height: f32) -> usize {
    if !(width > 0.0 && height > 0.0) {
        return 0;
    }
    let tile = TILE_SIZE as f32 * TILE_COVERAGE;
    let columns = (width / tile).ceil() as usize + 1;
    let rows = (height / tile).ceil() as usize + 1;
    columns * rows
}

/// Settings of a [`TilesView`](crate::TilesView)
///
/// Every field has a default, so partial configurations deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Lowest reachable zoom level (5-9 shows the content smaller than the view)
    pub min_zoom_level: u32,

    /// Highest reachable zoom level
    pub max_zoom_level: u32,

    /// Space between the view edges and the content box
    pub padding: Insets,

    /// Extra pannable distance past each content edge; negative values keep
    /// that edge out of sight
    pub overscroll: Insets,

    /// Color drawn where no tile or placeholder is available
    pub background: Rgba,

    /// Render queue capacity; derived from the view size when unset
    pub max_tasks: Option<usize>,

    /// Whether the renderer may run on several workers at once
    pub concurrency_safe: bool,

    /// Scale multiplier applied by a double tap
    pub double_tap_scale: f32,

    pub double_tap_duration_ms: u64,

    /// Duration of the snap to the nearest zoom level after a pinch
    pub settle_duration_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            min_zoom_level: MIN_ZOOM_LEVEL,
            max_zoom_level: MAX_ZOOM_LEVEL,
            padding: Insets::ZERO,
            overscroll: Insets::ZERO,
            background: Rgba::WHITE,
            max_tasks: None,
            concurrency_safe: false,
            double_tap_scale: 2.0,
            double_tap_duration_ms: 400,
            settle_duration_ms: 200,
        }
    }
}

impl ViewerConfig {
    pub fn with_zoom_levels(mut self, min: u32, max: u32) -> Self {
        self.min_zoom_level = min;
        self.max_zoom_level = max;
        self
    }

    pub fn with_padding(mut self, padding: Insets) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_overscroll(mut self, overscroll: Insets) -> Self {
        self.overscroll = overscroll;
        self
    }

    pub fn with_background(mut self, background: Rgba) -> Self {
        self.background = background;
        self
    }

    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = Some(max_tasks);
        self
    }

    pub fn with_concurrency_safe(mut self, concurrency_safe: bool) -> Self {
        self.concurrency_safe = concurrency_safe;
        self
    }

    pub fn double_tap_duration(&self) -> Duration {
        Duration::from_millis(self.double_tap_duration_ms)
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_duration_ms)
    }

    /// Render queue capacity to use for a view of the given size
    pub fn max_tasks_for(&self, width: f32, height: f32) -> usize {
        self.max_tasks
            .unwrap_or_else(|| capacity_for_view(width, height))
    }

    /// Check the zoom bounds and return them
    pub fn validate(&self) -> ViewerResult<ZoomBounds> {
        let bounds = ZoomBounds::new(self.min_zoom_level, self.max_zoom_level)?;
        Ok(bounds)
    }

    /// Check that a view of this size leaves room for content
    pub(crate) fn validate_view_size(&self, width: f32, height: f32) -> ViewerResult<()> {
        let content_width = width - self.padding.horizontal();
        let content_height = height - self.padding.vertical();
        let has_content = content_width > 0.0 && content_height > 0.0;
        if !has_content || !width.is_finite() || !height.is_finite() {
            return Err(ViewerError::InvalidViewSize { width, height });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tileview_render::ZoomError;

    #[test]
    fn test_default_config() {
        let config = ViewerConfig::default();
        assert_eq!(config.min_zoom_level, 5);
        assert_eq!(config.max_zoom_level, 266);
        assert_eq!(config.double_tap_duration(), Duration::from_millis(400));
        assert_eq!(config.settle_duration(), Duration::from_millis(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_capacity_for_view() {
        // 1080x1920: ceil(1080/230.4) = 5, ceil(1920/230.4) = 9
        assert_eq!(capacity_for_view(1080.0, 1920.0), 6 * 10);
        assert_eq!(capacity_for_view(100.0, 100.0), 4);
        assert_eq!(capacity_for_view(0.0, 500.0), 0);
    }

    #[test]
    fn test_max_tasks_override() {
        let config = ViewerConfig::default();
        assert_eq!(config.max_tasks_for(100.0, 100.0), 4);

        let config = config.with_max_tasks(0);
        assert_eq!(config.max_tasks_for(100.0, 100.0), 0);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = ViewerConfig::default().with_zoom_levels(18, 10);
        assert_eq!(
            config.validate(),
            Err(ViewerError::Zoom(ZoomError::InvertedBounds { min: 18, max: 10 }))
        );

        let config = ViewerConfig::default().with_zoom_levels(5, 13);
        assert!(matches!(config.validate(), Err(ViewerError::Zoom(ZoomError::InvalidLevel(13)))));
    }

    #[test]
    fn test_view_size_leaves_room_for_content() {
        let config = ViewerConfig::default().with_padding(Insets::uniform(50.0));
        assert!(config.validate_view_size(200.0, 200.0).is_ok());
        assert!(config.validate_view_size(100.0, 200.0).is_err());
        assert!(config.validate_view_size(f32::NAN, 200.0).is_err());
    }

    #[test]
    fn test_partial_config_deserializes() {
        let json = r#"{
            "max_zoom_level": 42,
            "padding": {"left": 8.0, "top": 0.0, "right": 8.0, "bottom": 0.0}
        }"#;
        let config: ViewerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_zoom_level, 42);
        assert_eq!(config.padding.horizontal(), 16.0);
        assert_eq!(config.min_zoom_level, 5);
        assert_eq!(config.background, Rgba::WHITE);

        let json = serde_json::to_string(&config).unwrap();
        let back: ViewerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
