//! Tileview Scheduler Library
//!
//! Bounded LIFO render queue with cancellable jobs and a worker pool.
//!
//! Tiles requested last are the ones the user is looking at now, so the
//! queue runs the newest job first and, when full, evicts the oldest one.
//! Evicted jobs are handed back to the submitter so it can release whatever
//! state it attached to them.
//!
//! # Example
//!
//! ```
//! use tileview_scheduler::{RenderScheduler, Submission};
//!
//! let scheduler = RenderScheduler::new(8);
//!
//! let Submission::Queued { id, token, .. } = scheduler.submit((0, 0)) else {
//!     unreachable!()
//! };
//!
//! // The tile scrolled away before a worker picked it up
//! assert_eq!(scheduler.cancel_job(id), Some((0, 0)));
//! assert!(token.is_cancelled());
//! ```

mod cancel;
mod lifo;
mod scheduler;
mod worker;

pub use cancel::CancellationToken;
pub use lifo::{JobId, LifoQueue, PushOutcome, QueuedJob};
pub use scheduler::{RenderScheduler, SchedulerStats, Submission};
pub use worker::{panic_message, JobExecutor, WorkerPool, WorkerPoolConfig};
