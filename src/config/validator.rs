//! Configuration validation
//!
//! Every check runs before a single worker thread exists. The first bad field
//! is reported as `ChurnError::Config`; nothing is defaulted on the way.

use super::*;
use crate::error::ChurnError;

type Result<T> = std::result::Result<T, ChurnError>;

macro_rules! invalid {
    ($($arg:tt)*) => {
        return Err(ChurnError::Config(format!($($arg)*)))
    };
}

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_workload(&config.workload)?;
    validate_workers(&config.workers)?;
    validate_runtime(&config.runtime)?;

    // N x K x C x size must be representable
    let total = (config.workers.threads as u64)
        .checked_mul(config.workload.buckets_per_worker as u64)
        .and_then(|n| n.checked_mul(config.workload.bucket_capacity as u64))
        .and_then(|n| n.checked_mul(config.workload.buffer_size as u64));
    if total.is_none() {
        invalid!("total working set (threads x buckets x capacity x buffer_size) overflows");
    }

    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig) -> Result<()> {
    if workload.buffer_size == 0 {
        invalid!("workload.buffer_size must be at least 1 byte");
    }
    if workload.buckets_per_worker == 0 {
        invalid!("workload.buckets_per_worker must be at least 1");
    }
    if workload.bucket_capacity == 0 {
        invalid!("workload.bucket_capacity must be at least 1");
    }
    if !workload.alloc_rate.is_finite() || workload.alloc_rate <= 0.0 {
        invalid!(
            "workload.alloc_rate must be a positive number of allocations per second, got {}",
            workload.alloc_rate
        );
    }

    Ok(())
}

/// Validate workers configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.threads == 0 {
        invalid!("workers.threads must be at least 1");
    }

    Ok(())
}

/// Print warnings for settings that are valid but skew the run
pub fn warn_config(config: &Config) {
    if let Some(warning) = oversubscription_warning(&config.workers, num_cpus::get()) {
        eprintln!("Warning: {}", warning);
    }
}

// Oversubscription lowers the achieved rate but is not an error
fn oversubscription_warning(workers: &WorkerConfig, cpus: usize) -> Option<String> {
    (workers.threads > cpus).then(|| {
        format!(
            "{} workers on {} CPUs; workers will share cores",
            workers.threads, cpus
        )
    })
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    if runtime.duration_secs == Some(0) {
        invalid!("runtime.duration_secs must be greater than 0");
    }
    if runtime.max_steps == Some(0) {
        invalid!("runtime.max_steps must be greater than 0");
    }
    if runtime.join_timeout_secs == Some(0) {
        invalid!("runtime.join_timeout_secs must be greater than 0");
    }

    Ok(())
}
