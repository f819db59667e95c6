//! Tileview Render Library
//!
//! Zoom-level model, tile grid geometry, raster buffers and the renderer
//! contract used to rasterize tiles of arbitrarily large content.

pub mod bitmap;
pub mod error;
pub mod fixed_size;
pub mod geometry;
pub mod renderer;
pub mod tile;
pub mod zoom;

pub use bitmap::{Bitmap, Rgba};
pub use error::{RenderError, RenderResult, ZoomError};
pub use fixed_size::{CenterCrop, FitMode, FixedSizeRenderer, SourceMapping};
pub use geometry::{PixelRect, Point, Rect};
pub use renderer::TileRenderer;
pub use tile::{tile_content_rect, tile_size_on_content, TileGrid, TileKey, TileRegion, TILE_SIZE};
pub use zoom::{residual_scale, zoom_level_for_scale, RoundingPolicy, ZoomBounds, ZoomLevel};
