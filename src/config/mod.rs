//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! A `Config` is built once at startup and shared read-only with every worker.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::output::text::format_bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Reference buffer size: 64 KiB
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
/// Reference number of buckets per worker
pub const DEFAULT_BUCKETS_PER_WORKER: usize = 16;
/// Reference bucket capacity (buffers)
pub const DEFAULT_BUCKET_CAPACITY: usize = 2048;
/// Reference allocation rate (allocations per second per worker)
pub const DEFAULT_ALLOC_RATE: f64 = 8.0;
/// Reference worker count
pub const DEFAULT_THREADS: usize = 4;

/// Complete run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Shape of each worker's working set and how fast it churns
///
/// In a TOML file every numeric field of `[workload]` must be spelled out;
/// a missing value is a parse error rather than a silent default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadConfig {
    /// Bytes per allocated buffer
    pub buffer_size: usize,
    /// Buckets owned by each worker (K)
    pub buckets_per_worker: usize,
    /// Buffers per bucket before it is cleared (C)
    pub bucket_capacity: usize,
    /// Target allocations per second, per worker
    pub alloc_rate: f64,
    /// Zero-fill each new buffer so the OS commits its pages
    #[serde(default = "default_touch_pages")]
    pub touch_pages: bool,
}

fn default_touch_pages() -> bool {
    true
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            buckets_per_worker: DEFAULT_BUCKETS_PER_WORKER,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
            alloc_rate: DEFAULT_ALLOC_RATE,
            touch_pages: default_touch_pages(),
        }
    }
}

impl WorkloadConfig {
    /// Maximum number of buffers one worker can hold at once (K × C)
    pub fn max_buffers_per_worker(&self) -> u64 {
        self.buckets_per_worker as u64 * self.bucket_capacity as u64
    }

    /// Maximum bytes one worker can hold at once
    pub fn working_set_bytes(&self) -> u64 {
        self.max_buffers_per_worker() * self.buffer_size as u64
    }
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Number of worker threads (N)
    #[serde(default = "default_threads")]
    pub threads: usize,
    /// Run seed; worker `i` seeds its RNG with `seed + i`. Drawn from entropy when unset.
    pub seed: Option<u64>,
}

fn default_threads() -> usize {
    DEFAULT_THREADS
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            seed: None,
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    /// Emit a log event for every append and clear
    #[serde(default)]
    pub debug: bool,
    /// Cancel the pool after this many seconds (runs until interrupted when unset)
    pub duration_secs: Option<u64>,
    /// Stop each worker after this many allocation steps
    pub max_steps: Option<u64>,
    /// Upper bound on how long to wait for workers after cancellation
    pub join_timeout_secs: Option<u64>,
}

impl RuntimeConfig {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(Duration::from_secs)
    }

    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_secs.map(Duration::from_secs)
    }

    /// Default log filter for the run; `RUST_LOG` still takes precedence
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Write the run report as JSON to this path
    pub json_output: Option<PathBuf>,
}

impl Config {
    /// Total buffers the whole pool can hold at once (N × K × C)
    pub fn max_buffers_total(&self) -> u64 {
        self.workers.threads as u64 * self.workload.max_buffers_per_worker()
    }

    /// Total bytes the whole pool can hold at once
    pub fn working_set_bytes_total(&self) -> u64 {
        self.workers.threads as u64 * self.workload.working_set_bytes()
    }
}

// Display trait implementations

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  Workload: {}", self.workload)?;
        writeln!(f, "  Workers: {}", self.workers)?;
        writeln!(f, "  Runtime: {}", self.runtime)?;
        if let Some(ref path) = self.output.json_output {
            writeln!(f, "  Output: json={}", path.display())?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} buckets x {} buffers x {}, {} allocs/s per worker",
            self.buckets_per_worker,
            self.bucket_capacity,
            format_bytes(self.buffer_size as u64),
            self.alloc_rate
        )?;
        if !self.touch_pages {
            write!(f, ", untouched")?;
        }
        Ok(())
    }
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} thread(s)", self.threads)?;
        if let Some(seed) = self.seed {
            write!(f, ", seed={}", seed)?;
        }
        Ok(())
    }
}

impl fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.duration_secs, self.max_steps) {
            (Some(secs), Some(steps)) => write!(f, "{}s or {} steps", secs, steps)?,
            (Some(secs), None) => write!(f, "{}s", secs)?,
            (None, Some(steps)) => write!(f, "{} steps", steps)?,
            (None, None) => write!(f, "until interrupted")?,
        }
        if let Some(timeout) = self.join_timeout_secs {
            write!(f, ", join_timeout={}s", timeout)?;
        }
        if self.debug {
            write!(f, ", debug")?;
        }
        Ok(())
    }
}
