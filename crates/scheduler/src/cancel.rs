//! Cancellation tokens for queued render jobs
//!
//! A token travels with its job through the queue. Cancelling a job that has
//! not started yet is synchronous: the job is removed from the queue and its
//! token flipped. A job that already started is never preempted; workers
//! check the token once before running it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cancellation token for cooperative job cancellation
///
/// Multiple clones share the same underlying state.
///
/// # Example
///
/// ```
/// use tileview_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this token
    ///
    /// All clones observe the cancellation. Calling it again has no effect.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if this token has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
