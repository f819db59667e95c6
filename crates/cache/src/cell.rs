//! Render state of a single tile
//!
//! A cell is shared between the pool (UI thread) and at most one render job
//! (worker thread). The state is atomic so the UI thread can read it without
//! locking; the bitmap sits behind a mutex that also serializes the
//! "install or discard" decision against deletion.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tileview_render::Bitmap;

/// Lifecycle of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TileState {
    /// A render job is queued or running
    Rendering = 0,
    /// The bitmap is available
    Rendered = 1,
    /// Soft-deleted: evicted or invalidated. Never leaves this state.
    Deleted = 2,
    /// The renderer failed; the next request renders again
    Failed = 3,
}

impl TileState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TileState::Rendering,
            1 => TileState::Rendered,
            2 => TileState::Deleted,
            _ => TileState::Failed,
        }
    }
}

#[derive(Debug)]
pub struct TileCell {
    state: AtomicU8,
    bitmap: Mutex<Option<Arc<Bitmap>>>,
}

impl TileCell {
    /// New cell in the `Rendering` state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(TileState::Rendering as u8),
            bitmap: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<Bitmap>>> {
        self.bitmap.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> TileState {
        TileState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The rendered bitmap, if any
    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        self.lock().clone()
    }

    /// Install a finished render
    ///
    /// Only succeeds while the cell is still `Rendering`. Returns `false`
    /// when the result must be discarded.
    pub fn install(&self, bitmap: Bitmap) -> bool {
        let mut slot = self.lock();
        if self.state() != TileState::Rendering {
            return false;
        }
        *slot = Some(Arc::new(bitmap));
        self.state.store(TileState::Rendered as u8, Ordering::Release);
        true
    }

    /// Record a renderer failure, unless the cell was deleted meanwhile
    pub fn fail(&self) -> bool {
        let _slot = self.lock();
        if self.state() != TileState::Rendering {
            return false;
        }
        self.state.store(TileState::Failed as u8, Ordering::Release);
        true
    }

    /// Soft-delete the cell and drop its bitmap
    pub fn mark_deleted(&self) {
        let mut slot = self.lock();
        self.state.store(TileState::Deleted as u8, Ordering::Release);
        *slot = None;
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == TileState::Deleted
    }
}

impl Default for TileCell {
    fn default() -> Self {
        Self::new()
    }
}
