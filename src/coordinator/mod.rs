//! Coordinator module
//!
//! Drives one churn run: starts the worker pool, arms the duration timer and
//! the resource sampler, waits for the workers, and builds the run report.
//! The cancellation token can be handed to a signal handler before `run`.

pub mod report;

pub use report::{Reporter, RunOutcome, RunReport};

use crate::config::validator::validate_config;
use crate::config::Config;
use crate::output::text::print_startup;
use crate::util::resource::ResourceTracker;
use crate::worker::{CancellationToken, WaitOutcome, WorkerPool};
use crate::Result;
use anyhow::{anyhow, Context};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs a worker pool to completion
pub struct Coordinator {
    config: Arc<Config>,
    token: CancellationToken,
}

impl Coordinator {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Use an existing token, e.g. one already wired to Ctrl-C
    pub fn with_cancellation(config: Arc<Config>, token: CancellationToken) -> Self {
        Self { config, token }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run until the workers stop and report the result
    ///
    /// Configuration errors are returned as `Err` before any worker starts.
    /// Worker failures and join timeouts are part of the report's outcome.
    pub fn run(self) -> Result<RunReport> {
        validate_config(&self.config).context("Invalid configuration")?;

        let reporter = Reporter::start(self.config.clone());
        let sampler = spawn_sampler(self.token.clone())?;
        let timer = match self.config.runtime.duration() {
            Some(duration) => Some(spawn_timer(self.token.clone(), duration)?),
            None => None,
        };

        let pool =
            match WorkerPool::start_with_cancellation(self.config.clone(), self.token.clone()) {
                Ok(pool) => pool,
                Err(e) => {
                    self.token.cancel();
                    let _ = sampler.join();
                    if let Some(timer) = timer {
                        let _ = timer.join();
                    }
                    return Err(e).context("Failed to start worker pool");
                }
            };
        let run_seed = pool.run_seed();

        print_startup(&self.config);

        while !pool.is_finished() && self.token.wait(POLL_INTERVAL) == WaitOutcome::Elapsed {}

        let summary = pool.wait(self.config.runtime.join_timeout());
        if !summary.failed_workers.is_empty() {
            warn!(failed = ?summary.failed_workers, "some workers panicked");
        }

        // helpers stop on cancellation
        self.token.cancel();
        if let Some(timer) = timer {
            timer
                .join()
                .map_err(|_| anyhow!("Duration timer thread panicked"))?;
        }
        let tracker = sampler
            .join()
            .map_err(|_| anyhow!("Resource sampler thread panicked"))?;

        reporter.finish(summary, run_seed, tracker.stats())
    }
}

/// Sample process memory once per interval until cancelled
fn spawn_sampler(token: CancellationToken) -> Result<JoinHandle<ResourceTracker>> {
    thread::Builder::new()
        .name("heapchurn-sampler".to_string())
        .spawn(move || {
            let mut tracker = ResourceTracker::new();
            tracker.start();
            while token.wait(SAMPLE_INTERVAL) == WaitOutcome::Elapsed {
                tracker.sample();
            }
            tracker.sample();
            tracker
        })
        .context("Failed to spawn resource sampler")
}

/// Cancel the run once `duration` has passed
fn spawn_timer(token: CancellationToken, duration: Duration) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("heapchurn-timer".to_string())
        .spawn(move || {
            if token.wait(duration) == WaitOutcome::Elapsed {
                info!(?duration, "run duration elapsed, stopping workers");
                token.cancel();
            }
        })
        .context("Failed to spawn duration timer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChurnError;
    use std::time::Instant;

    fn create_test_config() -> Config {
        let mut config = Config::default();
        config.workers.threads = 2;
        config.workers.seed = Some(3);
        config.workload.buffer_size = 128;
        config.workload.buckets_per_worker = 4;
        config.workload.bucket_capacity = 8;
        config.workload.alloc_rate = 500.0;
        config
    }

    #[test]
    fn test_run_with_step_limit() {
        let mut config = create_test_config();
        config.runtime.max_steps = Some(30);

        let report = Coordinator::new(Arc::new(config)).run().unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.run_seed, 3);
        assert_eq!(report.totals.steps, 60);
        assert_eq!(report.totals.bytes_allocated, 60 * 128);
        assert_eq!(report.workers.len(), 2);
        assert!(report.failed_workers.is_empty());
    }

    #[test]
    fn test_run_with_duration() {
        let mut config = create_test_config();
        config.runtime.duration_secs = Some(1);

        let start = Instant::now();
        let report = Coordinator::new(Arc::new(config)).run().unwrap();

        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.totals.steps > 0);
    }

    #[test]
    fn test_external_cancellation() {
        let coordinator = Coordinator::new(Arc::new(create_test_config()));
        let token = coordinator.cancellation_token();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            token.cancel();
        });

        let report = coordinator.run().unwrap();
        canceller.join().unwrap();
        assert!(report.outcome.is_success());
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let mut config = create_test_config();
        config.workload.bucket_capacity = 0;
        config.runtime.duration_secs = Some(60);

        let coordinator = Coordinator::new(Arc::new(config));
        let token = coordinator.cancellation_token();
        let start = Instant::now();
        let err = coordinator.run().unwrap_err();

        // rejected before the timer or sampler could start
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!token.is_cancelled());
        let churn = err.downcast_ref::<ChurnError>().unwrap();
        assert!(matches!(churn, ChurnError::Config(_)));
    }

    #[test]
    fn test_exhaustion_reports_failure() {
        let mut config = create_test_config();
        config.workers.threads = 1;
        config.workload.buffer_size = usize::MAX;
        config.workload.buckets_per_worker = 1;
        config.workload.bucket_capacity = 1;

        let report = Coordinator::new(Arc::new(config)).run().unwrap();
        match report.outcome {
            RunOutcome::Failed { reason } => assert!(reason.contains("failed to allocate")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
