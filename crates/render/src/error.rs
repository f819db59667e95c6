//! Error types for tile rendering and zoom configuration

use thiserror::Error;

/// Errors raised while producing the pixels of a tile
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer callback reported a failure
    #[error("renderer failed: {0}")]
    Failed(String),

    /// The renderer callback panicked
    #[error("renderer panicked: {0}")]
    Panicked(String),

    /// The renderer left the buffer at a size other than the one requested
    #[error("invalid buffer size {width}x{height}")]
    InvalidBuffer { width: u32, height: u32 },
}

impl RenderError {
    /// Build a `Failed` error from anything printable
    pub fn failed(message: impl Into<String>) -> Self {
        RenderError::Failed(message.into())
    }
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors raised when building zoom levels or zoom bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ZoomError {
    /// The value is not 5-9, 10, or 10 plus a power of two
    #[error("invalid zoom level {0}")]
    InvalidLevel(u32),

    /// The minimum zoom level is greater than the maximum
    #[error("min zoom level {min} exceeds max zoom level {max}")]
    InvertedBounds { min: u32, max: u32 },
}
