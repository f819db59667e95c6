//! Bounded last-in-first-out job queue
//!
//! New jobs are pushed to the front and taken from the front, so the most
//! recently requested tile renders first. When the queue is full the job at
//! the back (the oldest, lowest priority) is evicted to make room.

use crate::cancel::CancellationToken;
use std::collections::VecDeque;

/// Unique job identifier
pub type JobId = u64;

/// A job waiting in the queue
#[derive(Debug)]
pub struct QueuedJob<J> {
    /// Unique job identifier
    pub id: JobId,

    /// Job payload
    pub job: J,

    /// Token flipped when the job is evicted or cancelled
    pub token: CancellationToken,
}

/// Result of pushing a job
#[derive(Debug)]
pub enum PushOutcome<J> {
    /// The job was queued; older jobs may have been evicted to make room
    Queued {
        id: JobId,
        token: CancellationToken,
        evicted: Vec<QueuedJob<J>>,
    },

    /// The queue admits no job at all (capacity 0); the job is handed back
    Rejected(J),
}

/// Bounded LIFO queue
///
/// Not thread-safe on its own; `RenderScheduler` wraps it in a mutex.
#[derive(Debug)]
pub struct LifoQueue<J> {
    entries: VecDeque<QueuedJob<J>>,
    capacity: usize,
    next_job_id: JobId,
}

impl<J> LifoQueue<J> {
    /// Create an empty queue holding at most `capacity` jobs
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_job_id: 1,
        }
    }

    /// Push a job to the front
    ///
    /// Evicts from the back until the new job fits. Evicted jobs have their
    /// token cancelled and are returned so the owner can clean up after them.
    pub fn push(&mut self, job: J) -> PushOutcome<J> {
        if self.capacity == 0 {
            return PushOutcome::Rejected(job);
        }

        let mut evicted = Vec::new();
        while self.entries.len() >= self.capacity {
            match self.entries.pop_back() {
                Some(oldest) => {
                    oldest.token.cancel();
                    evicted.push(oldest);
                }
                None => break,
            }
        }

        let id = self.next_job_id;
        self.next_job_id += 1;

        let token = CancellationToken::new();
        self.entries.push_front(QueuedJob {
            id,
            job,
            token: token.clone(),
        });

        PushOutcome::Queued { id, token, evicted }
    }

    /// Take the most recently pushed job
    pub fn pop(&mut self) -> Option<QueuedJob<J>> {
        self.entries.pop_front()
    }

    /// Remove a job that has not started yet
    pub fn remove(&mut self, job_id: JobId) -> Option<QueuedJob<J>> {
        let index = self.entries.iter().position(|entry| entry.id == job_id)?;
        let removed = self.entries.remove(index)?;
        removed.token.cancel();
        Some(removed)
    }

    /// Change the capacity, evicting from the back if the queue is now too long
    pub fn set_capacity(&mut self, capacity: usize) -> Vec<QueuedJob<J>> {
        self.capacity = capacity;

        let mut evicted = Vec::new();
        while self.entries.len() > capacity {
            if let Some(oldest) = self.entries.pop_back() {
                oldest.token.cancel();
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Remove every queued job, cancelling their tokens
    pub fn drain(&mut self) -> Vec<QueuedJob<J>> {
        self.entries
            .drain(..)
            .map(|entry| {
                entry.token.cancel();
                entry
            })
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued job ids from front (next to run) to back (next to evict)
    pub fn ids(&self) -> Vec<JobId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }
}
