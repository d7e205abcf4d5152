//! Statistics collection
//!
//! Each worker owns one `WorkerStats` and updates it without synchronization;
//! the pool hands the finished values back on join and the coordinator merges
//! them into run totals.
//!
//! # Example
//!
//! ```
//! use heapchurn::stats::WorkerStats;
//! use std::time::Duration;
//!
//! let mut stats = WorkerStats::new();
//! stats.record_step(65536, false, 1, Duration::from_micros(40));
//! stats.record_step(65536, true, 2, Duration::from_micros(55));
//!
//! assert_eq!(stats.steps(), 2);
//! assert_eq!(stats.clears(), 1);
//! assert_eq!(stats.bytes_allocated(), 131072);
//! ```

pub mod histogram;

use crate::Result;
use histogram::LatencyHistogram;
use std::time::Duration;

/// Allocation statistics for one worker (or, after `merge`, for many)
#[derive(Debug, Clone, Default)]
pub struct WorkerStats {
    steps: u64,
    clears: u64,
    bytes_allocated: u64,
    peak_held_buffers: u64,
    step_latency: LatencyHistogram,
    run_time: Duration,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one allocation step
    ///
    /// `held_buffers` is the worker's total buffer count at the instant the
    /// new buffer was appended, before any clear the append triggered.
    #[inline]
    pub fn record_step(&mut self, bytes: usize, cleared: bool, held_buffers: u64, latency: Duration) {
        self.steps += 1;
        self.bytes_allocated += bytes as u64;
        if cleared {
            self.clears += 1;
        }
        self.peak_held_buffers = self.peak_held_buffers.max(held_buffers);
        self.step_latency.record(latency);
    }

    /// Wall time the worker spent in its loop
    pub fn set_run_time(&mut self, run_time: Duration) {
        self.run_time = run_time;
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn clears(&self) -> u64 {
        self.clears
    }

    pub fn bytes_allocated(&self) -> u64 {
        self.bytes_allocated
    }

    /// Highest number of buffers held at once
    ///
    /// For merged stats this is the sum of per-worker peaks, an upper bound on
    /// the pool-wide peak since workers need not peak together.
    pub fn peak_held_buffers(&self) -> u64 {
        self.peak_held_buffers
    }

    pub fn step_latency(&self) -> &LatencyHistogram {
        &self.step_latency
    }

    /// Longest per-worker run time (for merged stats)
    pub fn run_time(&self) -> Duration {
        self.run_time
    }

    /// Merge another worker's statistics into this one
    pub fn merge(&mut self, other: &WorkerStats) -> Result<()> {
        self.steps += other.steps;
        self.clears += other.clears;
        self.bytes_allocated += other.bytes_allocated;
        self.peak_held_buffers += other.peak_held_buffers;
        self.run_time = self.run_time.max(other.run_time);
        self.step_latency.merge(&other.step_latency)?;
        Ok(())
    }
}

/// Merge a set of per-worker statistics into run totals
pub fn aggregate<'a>(stats: impl IntoIterator<Item = &'a WorkerStats>) -> Result<WorkerStats> {
    let mut total = WorkerStats::new();
    for s in stats {
        total.merge(s)?;
    }
    Ok(total)
}
