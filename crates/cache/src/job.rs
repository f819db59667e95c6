//! Render jobs and their execution on worker threads

use crate::cell::TileCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tileview_render::{
    Bitmap, RenderError, RenderResult, Rgba, TileKey, TileRegion, TileRenderer, TILE_SIZE,
};
use tileview_scheduler::{panic_message, CancellationToken, JobExecutor};

/// Something a render job reports back to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileEvent {
    /// A tile bitmap was installed
    Rendered(TileKey),
    /// The renderer failed on a tile; it is retried on the next request
    Failed(TileKey),
    /// The whole-content placeholder was installed
    PlaceholderRendered,
}

/// Receives tile events, typically to schedule a redraw
///
/// Called on worker threads.
pub trait TilePoolListener: Send + Sync {
    fn on_tile_event(&self, event: TileEvent);
}

impl<F> TilePoolListener for F
where
    F: Fn(TileEvent) + Send + Sync,
{
    fn on_tile_event(&self, event: TileEvent) {
        self(event)
    }
}

pub(crate) type SharedListener = Arc<RwLock<Option<Arc<dyn TilePoolListener>>>>;

/// Work handed to the scheduler
#[derive(Debug)]
pub(crate) enum RenderJob {
    Tile {
        key: TileKey,
        cell: Arc<TileCell>,
        content_width: f32,
        content_height: f32,
    },
    Placeholder {
        cell: Arc<TileCell>,
        width: u32,
        height: u32,
        content_width: f32,
        content_height: f32,
    },
}

impl RenderJob {
    pub(crate) fn cell(&self) -> &Arc<TileCell> {
        match self {
            RenderJob::Tile { cell, .. } | RenderJob::Placeholder { cell, .. } => cell,
        }
    }
}

/// Build the executor the worker pool runs every job through
pub(crate) fn executor(
    renderer: Arc<dyn TileRenderer>,
    background: Rgba,
    listener: SharedListener,
) -> JobExecutor<RenderJob> {
    Arc::new(move |job: RenderJob, _token: &CancellationToken| {
        run(job, renderer.as_ref(), background, &listener);
    })
}

fn run(job: RenderJob, renderer: &dyn TileRenderer, background: Rgba, listener: &SharedListener) {
    let (cell, region, width, height, key) = match job {
        RenderJob::Tile {
            key,
            cell,
            content_width,
            content_height,
        } => (
            cell,
            TileRegion::for_tile(&key, content_width, content_height),
            TILE_SIZE,
            TILE_SIZE,
            Some(key),
        ),
        RenderJob::Placeholder {
            cell,
            width,
            height,
            content_width,
            content_height,
        } => (
            cell,
            TileRegion::full(content_width, content_height),
            width,
            height,
            None,
        ),
    };

    // Evicted or invalidated between dequeue and now
    if cell.is_deleted() {
        log::trace!("skipping deleted tile {:?}", key);
        return;
    }

    let mut buffer = Bitmap::filled(width, height, background);
    let result = render_guarded(renderer, &mut buffer, &region)
        .and_then(|()| check_buffer(&buffer, width, height));

    let event = match result {
        Ok(()) => {
            if !cell.install(buffer) {
                log::trace!("discarding render of deleted tile {:?}", key);
                return;
            }
            match key {
                Some(key) => TileEvent::Rendered(key),
                None => TileEvent::PlaceholderRendered,
            }
        }
        Err(err) => {
            match key {
                Some(key) => log::warn!("failed to render tile {}: {}", key, err),
                None => log::warn!("failed to render placeholder: {}", err),
            }
            if !cell.fail() {
                return;
            }
            match key {
                Some(key) => TileEvent::Failed(key),
                None => return,
            }
        }
    };

    notify(listener, event);
}

fn render_guarded(
    renderer: &dyn TileRenderer,
    buffer: &mut Bitmap,
    region: &TileRegion,
) -> RenderResult<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(buffer, region))) {
        Ok(result) => result,
        Err(payload) => Err(RenderError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// The renderer may replace the buffer, but not with one of another size
fn check_buffer(buffer: &Bitmap, width: u32, height: u32) -> RenderResult<()> {
    if buffer.width() == width && buffer.height() == height {
        Ok(())
    } else {
        Err(RenderError::InvalidBuffer {
            width: buffer.width(),
            height: buffer.height(),
        })
    }
}

fn notify(listener: &SharedListener, event: TileEvent) {
    let listener = listener
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    if let Some(listener) = listener {
        listener.on_tile_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::TileState;
    use std::sync::Mutex;
    use tileview_render::ZoomLevel;

    fn shared(events: Arc<Mutex<Vec<TileEvent>>>) -> SharedListener {
        let listener: Arc<dyn TilePoolListener> = Arc::new(move |event: TileEvent| {
            events.lock().unwrap().push(event);
        });
        Arc::new(RwLock::new(Some(listener)))
    }

    fn tile_job(cell: Arc<TileCell>) -> RenderJob {
        RenderJob::Tile {
            key: TileKey::new(ZoomLevel::NATIVE, 1, 0),
            cell,
            content_width: 1024.0,
            content_height: 1024.0,
        }
    }

    #[test]
    fn test_tile_job_installs_bitmap() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let renderer = |buffer: &mut Bitmap, region: &TileRegion| -> RenderResult<()> {
            assert_eq!(region.x_ratio, 0.25);
            buffer.set_pixel(0, 0, Rgba::BLACK);
            Ok(())
        };

        let cell = Arc::new(TileCell::new());
        run(tile_job(cell.clone()), &renderer, Rgba::WHITE, &shared(events.clone()));

        let bitmap = cell.bitmap().unwrap();
        assert_eq!(bitmap.width(), TILE_SIZE);
        assert_eq!(bitmap.pixel(0, 0), Some(Rgba::BLACK));
        assert_eq!(bitmap.pixel(1, 1), Some(Rgba::WHITE));
        assert_eq!(
            *events.lock().unwrap(),
            vec![TileEvent::Rendered(TileKey::new(ZoomLevel::NATIVE, 1, 0))]
        );
    }

    #[test]
    fn test_deleted_cell_is_not_rendered() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let renderer = |_: &mut Bitmap, _: &TileRegion| -> RenderResult<()> {
            panic!("must not render a deleted tile")
        };

        let cell = Arc::new(TileCell::new());
        cell.mark_deleted();
        run(tile_job(cell.clone()), &renderer, Rgba::WHITE, &shared(events.clone()));

        assert_eq!(cell.state(), TileState::Deleted);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panicking_renderer_marks_failed() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let renderer = |_: &mut Bitmap, _: &TileRegion| -> RenderResult<()> { panic!("boom") };

        let cell = Arc::new(TileCell::new());
        run(tile_job(cell.clone()), &renderer, Rgba::WHITE, &shared(events.clone()));

        assert_eq!(cell.state(), TileState::Failed);
        assert!(matches!(events.lock().unwrap()[0], TileEvent::Failed(_)));
    }

    #[test]
    fn test_resized_buffer_marks_failed() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let renderer = |buffer: &mut Bitmap, _: &TileRegion| -> RenderResult<()> {
            *buffer = Bitmap::new(16, 16);
            Ok(())
        };

        let cell = Arc::new(TileCell::new());
        run(tile_job(cell.clone()), &renderer, Rgba::WHITE, &shared(events.clone()));

        assert_eq!(cell.state(), TileState::Failed);
        assert!(cell.bitmap().is_none());
        assert!(matches!(events.lock().unwrap()[0], TileEvent::Failed(_)));
        assert!(matches!(
            check_buffer(&Bitmap::new(16, 16), TILE_SIZE, TILE_SIZE),
            Err(RenderError::InvalidBuffer { width: 16, height: 16 })
        ));
    }

    #[test]
    fn test_placeholder_job() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let renderer = |buffer: &mut Bitmap, region: &TileRegion| -> RenderResult<()> {
            assert_eq!(*region, TileRegion::full(200.0, 100.0));
            buffer.fill(Rgba::BLACK);
            Ok(())
        };

        let cell = Arc::new(TileCell::new());
        let job = RenderJob::Placeholder {
            cell: cell.clone(),
            width: 100,
            height: 50,
            content_width: 200.0,
            content_height: 100.0,
        };
        run(job, &renderer, Rgba::WHITE, &shared(events.clone()));

        let bitmap = cell.bitmap().unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (100, 50));
        assert_eq!(*events.lock().unwrap(), vec![TileEvent::PlaceholderRendered]);
    }
}
