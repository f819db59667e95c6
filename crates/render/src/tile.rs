//! Tile grid geometry
//!
//! Divides the content into fixed-size tiles for each zoom level. A tile is
//! always `TILE_SIZE` x `TILE_SIZE` pixels once rendered; what changes with
//! the zoom level is how much of the content a single tile covers.

use crate::geometry::Rect;
use crate::zoom::ZoomLevel;
use std::fmt;

/// Fixed tile size in pixels (256x256)
pub const TILE_SIZE: u32 = 256;

/// Unique identity of a grid cell at one zoom level
///
/// (0, 0) is the top-left tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub zoom_level: ZoomLevel,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(zoom_level: ZoomLevel, x: u32, y: u32) -> Self {
        Self { zoom_level, x, y }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{},{}", self.zoom_level, self.x, self.y)
    }
}

/// Number of tile columns and rows covering the content at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub columns: u32,
    pub rows: u32,
}

impl TileGrid {
    /// Calculate the grid for content of the given logical size
    ///
    /// The content is first scaled by the level factor, then divided into
    /// tiles, rounding up so partially covered cells still get a tile.
    pub fn for_content(content_width: f32, content_height: f32, zoom_level: ZoomLevel) -> Self {
        let factor = zoom_level.factor();
        let cells = |extent: f32| -> u32 {
            if extent <= 0.0 {
                0
            } else {
                (extent * factor / TILE_SIZE as f32).ceil() as u32
            }
        };

        Self {
            columns: cells(content_width),
            rows: cells(content_height),
        }
    }

    /// Check whether a (possibly negative) index lies inside the grid
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.columns) && y < i64::from(self.rows)
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// Row-major index of a cell, `None` when outside the grid
    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.columns && y < self.rows {
            Some(y as usize * self.columns as usize + x as usize)
        } else {
            None
        }
    }
}

/// Size of one tile measured in unscaled content units
pub fn tile_size_on_content(zoom_level: ZoomLevel) -> f32 {
    TILE_SIZE as f32 / zoom_level.factor()
}

/// Rectangle covered by a tile, in unscaled content units
pub fn tile_content_rect(key: &TileKey) -> Rect {
    let size = tile_size_on_content(key.zoom_level);
    Rect::from_xywh(key.x as f32 * size, key.y as f32 * size, size, size)
}

/// The part of the content a renderer is asked to draw
///
/// All ratios are relative to `content_width`/`content_height`, so
/// `[x_ratio, x_ratio + width_ratio]` spans the horizontal extent of the
/// region. Regions of edge tiles may extend past 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRegion {
    pub x_ratio: f32,
    pub y_ratio: f32,
    pub width_ratio: f32,
    pub height_ratio: f32,
    pub content_width: f32,
    pub content_height: f32,
}

impl TileRegion {
    /// Region covered by a grid tile
    pub fn for_tile(key: &TileKey, content_width: f32, content_height: f32) -> Self {
        let rect = tile_content_rect(key);
        Self {
            x_ratio: rect.left / content_width,
            y_ratio: rect.top / content_height,
            width_ratio: rect.width() / content_width,
            height_ratio: rect.height() / content_height,
            content_width,
            content_height,
        }
    }

    /// Region covering the whole content, used for placeholders
    pub fn full(content_width: f32, content_height: f32) -> Self {
        Self {
            x_ratio: 0.0,
            y_ratio: 0.0,
            width_ratio: 1.0,
            height_ratio: 1.0,
            content_width,
            content_height,
        }
    }

    /// Region in unscaled content units
    pub fn content_rect(&self) -> Rect {
        Rect::from_xywh(
            self.x_ratio * self.content_width,
            self.y_ratio * self.content_height,
            self.width_ratio * self.content_width,
            self.height_ratio * self.content_height,
        )
    }

    /// Buffer pixels per content unit when drawing into a buffer this wide
    pub fn scale_for_buffer(&self, buffer_width: u32) -> f32 {
        buffer_width as f32 / (self.width_ratio * self.content_width)
    }
}
