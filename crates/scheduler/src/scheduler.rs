//! Render scheduler
//!
//! Thread-safe wrapper around the bounded LIFO queue. The UI thread submits
//! and cancels jobs; worker threads block in `wait_job` until work arrives.

use crate::cancel::CancellationToken;
use crate::lifo::{JobId, LifoQueue, PushOutcome, QueuedJob};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total jobs accepted into the queue
    pub jobs_submitted: u64,

    /// Total jobs handed to a worker and finished
    pub jobs_completed: u64,

    /// Jobs removed before running (evicted, cancelled or drained)
    pub jobs_cancelled: u64,

    /// Jobs refused because the queue admits nothing or is shut down
    pub jobs_rejected: u64,

    /// Current queue size
    pub queue_size: usize,
}

impl SchedulerStats {
    /// Jobs accepted but neither completed nor cancelled yet
    ///
    /// Includes jobs a worker is currently running.
    pub fn pending_jobs(&self) -> u64 {
        self.jobs_submitted
            .saturating_sub(self.jobs_completed)
            .saturating_sub(self.jobs_cancelled)
    }
}

/// Result of submitting a job
#[derive(Debug)]
pub enum Submission<J> {
    /// Queued; `evicted` holds the jobs pushed out of the back to make room.
    /// Their tokens are already cancelled.
    Queued {
        id: JobId,
        token: CancellationToken,
        evicted: Vec<J>,
    },

    /// Not queued, the job is handed back untouched
    Rejected(J),
}

/// Bounded LIFO render scheduler
///
/// # Example
///
/// ```
/// use tileview_scheduler::{RenderScheduler, Submission};
///
/// let scheduler = RenderScheduler::new(2);
/// scheduler.submit("a");
/// scheduler.submit("b");
///
/// // Full: "a" is the oldest and gets evicted
/// match scheduler.submit("c") {
///     Submission::Queued { evicted, .. } => assert_eq!(evicted, vec!["a"]),
///     Submission::Rejected(_) => unreachable!(),
/// }
///
/// // Most recent first
/// let job = scheduler.next_job().unwrap();
/// assert_eq!(job.job, "c");
/// scheduler.complete_job(job.id);
/// ```
#[derive(Debug)]
pub struct RenderScheduler<J> {
    state: Mutex<SchedulerState<J>>,
    available: Condvar,
}

#[derive(Debug)]
struct SchedulerState<J> {
    queue: LifoQueue<J>,
    stats: SchedulerStats,
    shut_down: bool,
}

impl<J> RenderScheduler<J> {
    /// Create a scheduler whose queue holds at most `capacity` jobs
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                queue: LifoQueue::new(capacity),
                stats: SchedulerStats::default(),
                shut_down: false,
            }),
            available: Condvar::new(),
        }
    }

    // A panicking job never runs while the lock is held, but recover anyway
    // so one bad render cannot wedge the queue.
    fn lock(&self) -> MutexGuard<'_, SchedulerState<J>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit a job to the front of the queue
    pub fn submit(&self, job: J) -> Submission<J> {
        let mut state = self.lock();
        if state.shut_down {
            state.stats.jobs_rejected += 1;
            return Submission::Rejected(job);
        }

        match state.queue.push(job) {
            PushOutcome::Queued { id, token, evicted } => {
                state.stats.jobs_submitted += 1;
                state.stats.jobs_cancelled += evicted.len() as u64;
                if !evicted.is_empty() {
                    log::trace!("render queue full, evicted {} job(s)", evicted.len());
                }
                drop(state);

                self.available.notify_one();
                Submission::Queued {
                    id,
                    token,
                    evicted: evicted.into_iter().map(|entry| entry.job).collect(),
                }
            }
            PushOutcome::Rejected(job) => {
                state.stats.jobs_rejected += 1;
                Submission::Rejected(job)
            }
        }
    }

    /// Take the most recently submitted job without blocking
    pub fn next_job(&self) -> Option<QueuedJob<J>> {
        let mut state = self.lock();
        if state.shut_down {
            return None;
        }
        state.queue.pop()
    }

    /// Take the next job, waiting up to `timeout` for one to arrive
    ///
    /// Returns `None` on timeout or once the scheduler is shut down.
    pub fn wait_job(&self, timeout: Duration) -> Option<QueuedJob<J>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if state.shut_down {
                return None;
            }
            if let Some(job) = state.queue.pop() {
                return Some(job);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            state = match self.available.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Record that a job taken with `next_job`/`wait_job` has finished
    pub fn complete_job(&self, _job_id: JobId) {
        self.lock().stats.jobs_completed += 1;
    }

    /// Remove a job that has not started yet
    ///
    /// Returns the job if it was still queued. A running job is unaffected.
    pub fn cancel_job(&self, job_id: JobId) -> Option<J> {
        let mut state = self.lock();
        let removed = state.queue.remove(job_id)?;
        state.stats.jobs_cancelled += 1;
        Some(removed.job)
    }

    /// Change the queue capacity, returning any jobs evicted from the back
    pub fn set_capacity(&self, capacity: usize) -> Vec<J> {
        let mut state = self.lock();
        let evicted = state.queue.set_capacity(capacity);
        state.stats.jobs_cancelled += evicted.len() as u64;
        evicted.into_iter().map(|entry| entry.job).collect()
    }

    pub fn capacity(&self) -> usize {
        self.lock().queue.capacity()
    }

    /// Stop handing out jobs
    ///
    /// Drains the queue, cancels every queued token and wakes all waiting
    /// workers. Safe to call more than once; later calls return nothing.
    pub fn shutdown(&self) -> Vec<J> {
        let mut state = self.lock();
        state.shut_down = true;

        let drained = state.queue.drain();
        state.stats.jobs_cancelled += drained.len() as u64;
        drop(state);

        self.available.notify_all();
        drained.into_iter().map(|entry| entry.job).collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }

    /// Number of jobs waiting in the queue
    pub fn pending_jobs(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.lock();
        let mut stats = state.stats.clone();
        stats.queue_size = state.queue.len();
        stats
    }
}
