//! Allocation latency histogram using HdrHistogram
//!
//! Each worker records how long one allocation step takes (buffer allocation,
//! zero-fill, and append, including any bucket clear it triggers). Under
//! memory pressure the tail of this distribution is what moves first.
//!
//! # Example
//!
//! ```
//! use heapchurn::stats::histogram::LatencyHistogram;
//! use std::time::Duration;
//!
//! let mut hist = LatencyHistogram::new();
//! hist.record(Duration::from_micros(12));
//! hist.record(Duration::from_micros(480));
//!
//! let p99 = hist.percentile(99.0);
//! assert!(p99.is_some());
//! ```

use crate::Result;
use hdrhistogram::Histogram;
use std::time::Duration;

/// Upper bound on a recorded sample: one hour, in nanoseconds
const MAX_TRACKABLE_NANOS: u64 = 3_600_000_000_000;

/// Latency histogram wrapper
///
/// Tracks 1ns to 1 hour with 3 significant digits (0.1% precision).
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(1, MAX_TRACKABLE_NANOS, 3)
            .expect("histogram bounds are valid constants");

        Self { histogram }
    }

    /// Record a latency sample, clamped to the trackable range
    #[inline]
    pub fn record(&mut self, latency: Duration) {
        let nanos = latency.as_nanos().min(MAX_TRACKABLE_NANOS as u128) as u64;
        let _ = self.histogram.record(nanos.max(1));
    }

    /// Latency at `percentile` (0.0 - 100.0), or None if empty
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.value_at_percentile(percentile)))
    }

    pub fn min(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.min()))
    }

    pub fn max(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.max()))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        Some(Duration::from_nanos(self.histogram.mean() as u64))
    }

    /// Number of samples recorded
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histogram.len() == 0
    }

    /// Merge another histogram into this one
    ///
    /// Used to aggregate the per-worker histograms once the pool has joined.
    ///
    /// # Errors
    ///
    /// Returns an error if the histograms have incompatible configurations.
    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<()> {
        self.histogram
            .add(&other.histogram)
            .map_err(|e| anyhow::anyhow!("Failed to merge histograms: {}", e))?;
        Ok(())
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}
