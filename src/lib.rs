//! heapchurn - concurrent memory-pressure generator
//!
//! heapchurn keeps a configurable amount of heap memory in constant churn so
//! allocators, garbage collectors and memory limits can be observed under a
//! steady, reproducible load.
//!
//! # Architecture
//!
//! - **Workers**: N threads, each owning K buckets of up to C buffers
//! - **Pacing**: a fixed per-worker delay between allocation steps
//! - **Cancellation**: one shared token, observed once per step and able to
//!   interrupt the delay
//! - **Reporting**: step counts, step latency histograms and process memory
//! - **Shell**: allocate and free named buffer groups from stdin

pub mod config;
pub mod coordinator;
pub mod error;
pub mod output;
pub mod shell;
pub mod stats;
pub mod util;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::ChurnError;
pub use worker::{CancellationToken, Worker, WorkerPool};

/// Result type used throughout heapchurn
pub type Result<T> = anyhow::Result<T>;
