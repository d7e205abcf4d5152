//! Worker thread implementation
//!
//! A `Worker` owns `K` buckets, a private RNG, and a rate limiter. Each step
//! picks a bucket uniformly at random, allocates one buffer into it, and lets
//! the bucket clear itself when it reaches capacity. Between steps the worker
//! sleeps for the limiter's interval and then checks the cancellation signal.
//!
//! Workers share nothing but the read-only configuration and the cancellation
//! token, so the loop takes no locks.
//!
//! # Example
//!
//! ```
//! use heapchurn::config::Config;
//! use heapchurn::worker::{CancellationToken, Worker, WorkerState};
//! use std::sync::Arc;
//!
//! let mut config = Config::default();
//! config.workload.buffer_size = 1024;
//! config.workload.alloc_rate = 1000.0;
//! config.runtime.max_steps = Some(10);
//!
//! let mut worker = Worker::new(0, Arc::new(config), 42)?;
//! worker.run(&CancellationToken::new())?;
//!
//! assert_eq!(worker.state(), WorkerState::Stopped);
//! assert_eq!(worker.stats().steps(), 10);
//! # Ok::<(), heapchurn::error::ChurnError>(())
//! ```

pub mod bucket;
pub mod cancel;
pub mod pool;
pub mod rate;

pub use bucket::{Bucket, Buffer};
pub use cancel::{CancellationToken, WaitOutcome};
pub use pool::{JoinSummary, WorkerPool};
pub use rate::RateLimiter;

use crate::config::Config;
use crate::error::ChurnError;
use crate::stats::WorkerStats;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Seed for worker `id` in a run seeded with `run_seed`
#[inline]
pub fn worker_seed(run_seed: u64, id: usize) -> u64 {
    run_seed.wrapping_add(id as u64)
}

/// Worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Stopped,
}

/// Result of one allocation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    /// Index of the bucket the buffer went into
    pub bucket: usize,
    /// Whether that append filled and emptied the bucket
    pub cleared: bool,
}

/// Allocation worker
pub struct Worker {
    id: usize,
    config: Arc<Config>,
    seed: u64,
    buckets: Vec<Bucket>,
    rng: Xoshiro256PlusPlus,
    limiter: RateLimiter,
    /// Buffers across all buckets
    held_buffers: u64,
    state: WorkerState,
    stats: WorkerStats,
}

impl Worker {
    /// Create a worker with its buckets and limiter
    ///
    /// The RNG is seeded with `worker_seed(run_seed, id)`.
    ///
    /// # Errors
    ///
    /// Returns `ChurnError::Config` if the allocation rate cannot be paced.
    pub fn new(id: usize, config: Arc<Config>, run_seed: u64) -> Result<Self, ChurnError> {
        let workload = &config.workload;
        let limiter = RateLimiter::new(workload.alloc_rate)?;
        let buckets = (0..workload.buckets_per_worker)
            .map(|_| Bucket::new(workload.bucket_capacity))
            .collect();
        let seed = worker_seed(run_seed, id);

        Ok(Self {
            id,
            config,
            seed,
            buckets,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            limiter,
            held_buffers: 0,
            state: WorkerState::Running,
            stats: WorkerStats::new(),
        })
    }

    /// Perform one allocation step
    ///
    /// Does not sleep and does not look at the cancellation signal; `run`
    /// wraps this with pacing and shutdown.
    ///
    /// # Errors
    ///
    /// `ChurnError::ResourceExhausted` if the buffer cannot be allocated. The
    /// step is not retried.
    pub fn step(&mut self) -> Result<StepOutcome, ChurnError> {
        let start = Instant::now();
        let size = self.config.workload.buffer_size;

        let bucket = self.rng.gen_range(0..self.buckets.len());
        let buffer = Buffer::allocate(size, self.config.workload.touch_pages)
            .map_err(|_| ChurnError::ResourceExhausted { worker: self.id, bytes: size })?;

        self.held_buffers += 1;
        let held_at_append = self.held_buffers;
        let cleared = self.buckets[bucket].append(buffer);
        if cleared {
            self.held_buffers -= self.config.workload.bucket_capacity as u64;
        }

        self.stats.record_step(size, cleared, held_at_append, start.elapsed());

        if self.config.runtime.debug {
            debug!(worker = self.id, bucket, "worker {} appended to bucket {}", self.id, bucket);
            if cleared {
                debug!(worker = self.id, bucket, "worker {} cleared bucket {}", self.id, bucket);
            }
        }

        Ok(StepOutcome { bucket, cleared })
    }

    /// Run until cancelled (or until `runtime.max_steps` steps are done)
    ///
    /// All buckets are released and the worker is `Stopped` when this
    /// returns, whether it returns `Ok` or `Err`.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<(), ChurnError> {
        let started = Instant::now();
        debug!(worker = self.id, seed = self.seed, "worker started");

        let result = self.run_loop(cancel);

        self.release();
        self.state = WorkerState::Stopped;
        self.stats.set_run_time(started.elapsed());

        match result {
            Ok(()) => info!(
                worker = self.id,
                steps = self.stats.steps(),
                clears = self.stats.clears(),
                "worker stopped"
            ),
            Err(ref e) => error!(worker = self.id, error = %e, "worker failed"),
        }
        result
    }

    fn run_loop(&mut self, cancel: &CancellationToken) -> Result<(), ChurnError> {
        let max_steps = self.config.runtime.max_steps;
        loop {
            self.step()?;

            if max_steps.map_or(false, |max| self.stats.steps() >= max) {
                return Ok(());
            }
            if cancel.wait(self.limiter.next_delay()) == WaitOutcome::Cancelled {
                return Ok(());
            }
            if cancel.is_cancelled() {
                return Ok(());
            }
        }
    }

    /// Drop every buffer this worker holds
    fn release(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.held_buffers = 0;
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// The seed this worker's RNG started from
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Buffers currently held across all buckets
    pub fn held_buffers(&self) -> u64 {
        self.held_buffers
    }

    /// Current length of every bucket, in index order
    pub fn bucket_lengths(&self) -> Vec<usize> {
        self.buckets.iter().map(Bucket::len).collect()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Consume the worker and return its statistics
    pub fn into_stats(self) -> WorkerStats {
        self.stats
    }
}
