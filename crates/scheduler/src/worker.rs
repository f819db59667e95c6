//! Render worker pool
//!
//! Workers run on named threads, pull jobs from a shared `RenderScheduler`
//! and hand each one to the executor callback. Shutting the pool down never
//! waits for a render in progress.

use crate::cancel::CancellationToken;
use crate::scheduler::RenderScheduler;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback invoked by a worker for every job it takes
///
/// The token is checked once before the call; a job that was evicted while
/// queued is never executed. Long renders may poll it too.
pub type JobExecutor<J> = Arc<dyn Fn(J, &CancellationToken) + Send + Sync>;

/// Configuration for the render worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads to spawn.
    /// Default: number of logical CPU cores.
    pub num_workers: usize,

    /// Longest a worker waits for a job before checking for shutdown.
    /// Default: 100ms.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl WorkerPoolConfig {
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Self::default()
        }
    }

    /// One worker for a renderer that is not safe to call concurrently,
    /// one per core otherwise
    pub fn for_renderer(concurrency_safe: bool) -> Self {
        if concurrency_safe {
            Self::default()
        } else {
            Self::new(1)
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Pool of render worker threads
///
/// # Example
///
/// ```
/// use tileview_scheduler::{CancellationToken, RenderScheduler, WorkerPool, WorkerPoolConfig};
/// use std::sync::{mpsc, Arc, Mutex};
/// use std::time::Duration;
///
/// let scheduler = Arc::new(RenderScheduler::new(16));
/// let (tx, rx) = mpsc::channel();
/// let tx = Mutex::new(tx);
///
/// let executor = Arc::new(move |tile: u32, _token: &CancellationToken| {
///     let _ = tx.lock().unwrap().send(tile * 2);
/// });
///
/// let mut pool = WorkerPool::new(scheduler.clone(), executor, WorkerPoolConfig::new(2));
/// scheduler.submit(21);
/// assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(42));
///
/// pool.shutdown();
/// pool.join();
/// ```
pub struct WorkerPool<J> {
    workers: Vec<Worker>,
    shutdown: Arc<AtomicBool>,
    scheduler: Arc<RenderScheduler<J>>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawn the workers
    ///
    /// A worker thread that fails to spawn is logged and skipped.
    pub fn new(
        scheduler: Arc<RenderScheduler<J>>,
        executor: JobExecutor<J>,
        config: WorkerPoolConfig,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.num_workers);

        for id in 0..config.num_workers {
            match Worker::spawn(
                id,
                scheduler.clone(),
                executor.clone(),
                shutdown.clone(),
                config.poll_interval,
            ) {
                Ok(worker) => workers.push(worker),
                Err(err) => log::error!("failed to spawn render worker {}: {}", id, err),
            }
        }

        log::debug!("started {} render worker(s)", workers.len());
        Self {
            workers,
            shutdown,
            scheduler,
        }
    }
}

impl<J> WorkerPool<J> {
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Signal every worker to stop and drain the queue
    ///
    /// Returns the jobs that never ran. Does not wait for running jobs, so it
    /// is safe to call from inside an executor. Reentrant.
    pub fn shutdown(&self) -> Vec<J> {
        self.shutdown.store(true, Ordering::Release);
        self.scheduler.shutdown()
    }

    /// Wait for the workers to exit
    ///
    /// The calling thread is skipped if it is one of the workers.
    pub fn join(&mut self) {
        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            worker.join(current);
        }
    }
}

impl<J> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.scheduler.shutdown();
    }
}

/// A single worker thread
struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn<J: Send + 'static>(
        id: usize,
        scheduler: Arc<RenderScheduler<J>>,
        executor: JobExecutor<J>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> std::io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("tileview-render-worker-{}", id))
            .spawn(move || {
                Self::run(scheduler, executor, shutdown, poll_interval);
            })?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    fn run<J>(
        scheduler: Arc<RenderScheduler<J>>,
        executor: JobExecutor<J>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        while !shutdown.load(Ordering::Acquire) {
            let Some(queued) = scheduler.wait_job(poll_interval) else {
                continue;
            };

            let job_id = queued.id;
            if !queued.token.is_cancelled() {
                let token = queued.token;
                let job = queued.job;
                let result = panic::catch_unwind(AssertUnwindSafe(|| executor(job, &token)));
                if let Err(payload) = result {
                    log::error!("render job {} panicked: {}", job_id, panic_message(&payload));
                }
            }

            scheduler.complete_job(job_id);
        }
    }

    fn join(mut self, current: thread::ThreadId) {
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == current {
                return;
            }
            if thread.join().is_err() {
                log::error!("render worker thread panicked");
            }
        }
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn num_cpus() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
