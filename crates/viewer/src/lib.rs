//! Tileview Viewer Library
//!
//! Pan and pinch-zoom over content larger than can be rasterized at once.
//! The view keeps a viewport, picks the zoom level whose tiles best match
//! the scale, and draws the visible tiles from a [`TilePool`] that renders
//! them in the background.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tileview_render::{Bitmap, RenderResult, Rgba, TileRegion, TileRenderer};
//! use tileview_viewer::{RecordingCanvas, TilesView, ViewerConfig};
//!
//! let mut view = TilesView::new(ViewerConfig::default()).unwrap();
//! view.set_view_size(1080.0, 1920.0).unwrap();
//!
//! let renderer: Arc<dyn TileRenderer> =
//!     Arc::new(|buffer: &mut Bitmap, region: &TileRegion| -> RenderResult<()> {
//!         if region.x_ratio < 0.5 {
//!             buffer.fill(Rgba::BLACK);
//!         }
//!         Ok(())
//!     });
//! view.set_renderer(Some(renderer));
//! view.set_redraw_sink(|| { /* schedule a frame */ });
//!
//! let mut canvas = RecordingCanvas::new();
//! view.on_scale(1.5, 540.0, 960.0);
//! view.draw(&mut canvas);
//! ```

pub mod animation;
pub mod canvas;
pub mod config;
pub mod error;
pub mod fixed_size;
pub mod traversal;
pub mod view;
pub mod viewport;

pub use animation::{decelerate, AnimationCallback, AnimationEnd};
pub use canvas::{Canvas, DrawOp, RecordingCanvas};
pub use config::{capacity_for_view, Insets, ViewerConfig};
pub use error::{ViewerError, ViewerResult};
pub use fixed_size::{FixedSizeContent, FixedSizeLayer, FixedSizeTapHandler, SourceScale};
pub use traversal::{draw_tiles, FrameOutcome, Spiral, TileRange, VisibleTiles};
pub use view::{GestureState, Layer, RedrawSink, TapHandler, TilesView};
pub use viewport::ViewportState;

pub use tileview_cache::{CacheStats, TileEvent, TilePool};
