//! Error types for the viewer

use thiserror::Error;
use tileview_render::ZoomError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewerError {
    /// Zoom bounds or level rejected
    #[error(transparent)]
    Zoom(#[from] ZoomError),

    /// Padding leaves no room for content, or the size is not finite
    #[error("invalid view size {width}x{height}")]
    InvalidViewSize { width: f32, height: f32 },
}

pub type ViewerResult<T> = Result<T, ViewerError>;
