//! Tile pool configuration
//!
//! Settings are plain values with `with_*` builders. The pool never reads
//! them from the environment or from disk; the host decides where they come
//! from.

use std::time::Duration;
use tileview_render::Rgba;

/// Configuration for a [`TilePool`](crate::TilePool).
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Color every tile buffer is cleared to before the renderer runs
    pub background: Rgba,

    /// Render queue capacity. The pool keeps up to twice as many tiles
    /// resident so tiles scrolled just off-screen can be shown again at once.
    pub max_tasks: usize,

    /// The placeholder is rendered at `content / placeholder_divisor`
    pub placeholder_divisor: u32,

    /// Longest a worker waits for a job before checking for shutdown
    pub poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            background: Rgba::WHITE,
            max_tasks: 16,
            placeholder_divisor: 2,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl PoolConfig {
    pub fn new(max_tasks: usize) -> Self {
        Self {
            max_tasks,
            ..Self::default()
        }
    }

    /// Sets the tile background color.
    pub fn with_background(mut self, background: Rgba) -> Self {
        self.background = background;
        self
    }

    /// Sets the render queue capacity.
    pub fn with_max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    /// Sets the placeholder downscale divisor (at least 1).
    pub fn with_placeholder_divisor(mut self, divisor: u32) -> Self {
        self.placeholder_divisor = divisor.max(1);
        self
    }

    /// Sets the worker poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Maximum number of tiles kept in the pool
    pub fn resident_ceiling(&self) -> usize {
        self.max_tasks.saturating_mul(2)
    }

    /// Pixel size of the placeholder for content of the given size
    pub fn placeholder_size(&self, content_width: f32, content_height: f32) -> (u32, u32) {
        let divisor = self.placeholder_divisor.max(1) as f32;
        let side = |extent: f32| ((extent / divisor) as u32).max(1);
        (side(content_width), side(content_height))
    }
}
