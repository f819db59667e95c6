//! The pixel-producing callback contract

use crate::bitmap::Bitmap;
use crate::error::RenderResult;
use crate::tile::TileRegion;

/// Draws a region of the content into a buffer
///
/// The buffer has already been filled with the background color and
/// represents exactly `region`; the renderer should draw at (0, 0) and fill
/// the whole buffer. Renderers run on worker threads and may be called
/// concurrently unless the cache was configured as not concurrency-safe.
pub trait TileRenderer: Send + Sync {
    fn render(&self, buffer: &mut Bitmap, region: &TileRegion) -> RenderResult<()>;
}

impl<F> TileRenderer for F
where
    F: Fn(&mut Bitmap, &TileRegion) -> RenderResult<()> + Send + Sync,
{
    fn render(&self, buffer: &mut Bitmap, region: &TileRegion) -> RenderResult<()> {
        self(buffer, region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Rgba;
    use crate::error::RenderError;
    use std::sync::Arc;

    #[test]
    fn test_closure_renderer() {
        let renderer: Arc<dyn TileRenderer> =
            Arc::new(|buffer: &mut Bitmap, region: &TileRegion| -> RenderResult<()> {
                if region.width_ratio > 0.5 {
                    buffer.fill(Rgba::WHITE);
                }
                Ok(())
            });

        let mut buffer = Bitmap::filled(2, 2, Rgba::BLACK);
        renderer.render(&mut buffer, &TileRegion::full(10.0, 10.0)).unwrap();
        assert_eq!(buffer.pixel(0, 0), Some(Rgba::WHITE));
    }

    #[test]
    fn test_closure_renderer_error() {
        let renderer = |_: &mut Bitmap, _: &TileRegion| -> RenderResult<()> {
            Err(RenderError::failed("decoder closed"))
        };

        let mut buffer = Bitmap::new(1, 1);
        let err = renderer.render(&mut buffer, &TileRegion::full(1.0, 1.0)).unwrap_err();
        assert_eq!(err.to_string(), "renderer failed: decoder closed");
    }
}
