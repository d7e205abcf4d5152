//! Worker pool
//!
//! Starts N workers on their own OS threads, shares one cancellation token
//! between them, and collects their statistics when they stop.
//!
//! Each worker thread holds a guard that reports the worker's id on a channel
//! when the thread ends, however it ends. `join_timeout` waits on that
//! channel with a deadline instead of blocking in `JoinHandle::join`.

use super::{CancellationToken, Worker};
use crate::config::validator::validate_config;
use crate::config::Config;
use crate::error::ChurnError;
use crate::stats::WorkerStats;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// What a worker thread hands back
struct WorkerExit {
    stats: WorkerStats,
    error: Option<ChurnError>,
}

/// Reports a worker's id when its thread ends, including by panic
struct DoneGuard {
    id: usize,
    tx: Sender<usize>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        // the pool may already have stopped listening
        let _ = self.tx.send(self.id);
    }
}

/// Everything collected from the workers once they have all stopped
#[derive(Debug, Default)]
pub struct JoinSummary {
    /// Statistics of every worker that returned, in id order
    pub stats: Vec<WorkerStats>,
    /// Ids of workers whose thread panicked
    pub failed_workers: Vec<usize>,
    /// First fatal error, if any
    pub error: Option<ChurnError>,
}

impl JoinSummary {
    /// Turn a recorded fatal error into `Err`
    pub fn into_result(mut self) -> Result<Self, ChurnError> {
        match self.error.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}

/// A running set of workers
pub struct WorkerPool {
    handles: Vec<(usize, JoinHandle<WorkerExit>)>,
    done_rx: Receiver<usize>,
    token: CancellationToken,
    run_seed: u64,
}

impl WorkerPool {
    /// Validate `config` and start `config.workers.threads` workers
    pub fn start(config: Arc<Config>) -> Result<Self, ChurnError> {
        Self::start_with_cancellation(config, CancellationToken::new())
    }

    /// Start workers that stop when `token` is cancelled
    ///
    /// Configuration is validated and every worker is constructed before the
    /// first thread is spawned, so a bad configuration leaves no threads
    /// behind. If spawning fails part-way, the workers already started are
    /// cancelled and joined before the error is returned.
    pub fn start_with_cancellation(
        config: Arc<Config>,
        token: CancellationToken,
    ) -> Result<Self, ChurnError> {
        validate_config(&config)?;

        let run_seed = config.workers.seed.unwrap_or_else(rand::random);
        let workers = (0..config.workers.threads)
            .map(|id| Worker::new(id, config.clone(), run_seed))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            threads = config.workers.threads,
            seed = run_seed,
            "starting worker pool"
        );

        let (done_tx, done_rx) = channel::unbounded();
        let mut pool = Self {
            handles: Vec::with_capacity(workers.len()),
            done_rx,
            token,
            run_seed,
        };

        for mut worker in workers {
            let id = worker.id();
            let token = pool.token.clone();
            let guard = DoneGuard {
                id,
                tx: done_tx.clone(),
            };

            let spawned = thread::Builder::new()
                .name(format!("heapchurn-worker-{}", id))
                .spawn(move || {
                    let _guard = guard;
                    let result = worker.run(&token);
                    if result.is_err() {
                        token.cancel();
                    }
                    WorkerExit {
                        stats: worker.into_stats(),
                        error: result.err(),
                    }
                });

            match spawned {
                Ok(handle) => pool.handles.push((id, handle)),
                Err(source) => {
                    error!(worker = id, error = %source, "failed to spawn worker thread");
                    pool.cancel();
                    let _ = pool.wait(None);
                    return Err(ChurnError::Spawn { worker: id, source });
                }
            }
        }

        Ok(pool)
    }

    /// Ask every worker to stop after its current step
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Handle to the token shared by the workers
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Seed the workers were derived from
    pub fn run_seed(&self) -> u64 {
        self.run_seed
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// True once every worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Block until every worker has stopped
    ///
    /// A panicked worker is logged and listed in `failed_workers`; the rest of
    /// the pool is unaffected. Any other worker error is returned.
    pub fn join(self) -> Result<JoinSummary, ChurnError> {
        self.wait(None).into_result()
    }

    /// Like `join`, but gives up after `timeout`
    ///
    /// When the bound expires the pool is cancelled, the remaining workers are
    /// joined, and `ChurnError::JoinTimeout` is returned.
    pub fn join_timeout(self, timeout: Duration) -> Result<JoinSummary, ChurnError> {
        self.wait(Some(timeout)).into_result()
    }

    /// Join all workers and collect whatever they produced
    ///
    /// Unlike `join`, statistics are kept when a worker failed.
    pub fn wait(self, timeout: Option<Duration>) -> JoinSummary {
        let mut timed_out = false;

        // a deadline past the end of `Instant` means no bound at all
        if let Some((timeout, deadline)) =
            timeout.and_then(|t| Instant::now().checked_add(t).map(|d| (t, d)))
        {
            let mut remaining = self.handles.len();
            while remaining > 0 {
                match self.done_rx.recv_deadline(deadline) {
                    Ok(_) => remaining -= 1,
                    Err(RecvTimeoutError::Timeout) => {
                        warn!(?timeout, remaining, "workers still running at join deadline");
                        timed_out = true;
                        self.token.cancel();
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }

        let mut summary = JoinSummary::default();
        for (id, handle) in self.handles {
            match handle.join() {
                Ok(exit) => {
                    match exit.error {
                        Some(e) if e.is_fatal() => {
                            summary.error.get_or_insert(e);
                        }
                        Some(e) => warn!(worker = id, error = %e, "worker stopped with an error"),
                        None => {}
                    }
                    summary.stats.push(exit.stats);
                }
                Err(_) => {
                    error!(worker = id, "{}", ChurnError::WorkerPanicked(id));
                    summary.failed_workers.push(id);
                }
            }
        }

        if timed_out && summary.error.is_none() {
            summary.error = timeout.map(ChurnError::JoinTimeout);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config(threads: usize, rate: f64) -> Config {
        let mut config = Config::default();
        config.workers.threads = threads;
        config.workers.seed = Some(11);
        config.workload.buffer_size = 256;
        config.workload.buckets_per_worker = 4;
        config.workload.bucket_capacity = 16;
        config.workload.alloc_rate = rate;
        config
    }

    #[test]
    fn test_invalid_config_starts_nothing() {
        let mut config = create_test_config(2, 100.0);
        config.workload.bucket_capacity = 0;

        match WorkerPool::start(Arc::new(config)) {
            Err(ChurnError::Config(msg)) => assert!(msg.contains("bucket_capacity")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("pool started with zero bucket capacity"),
        }
    }

    #[test]
    fn test_max_steps_run_to_completion() {
        let mut config = create_test_config(3, 1000.0);
        config.runtime.max_steps = Some(40);

        let pool = WorkerPool::start(Arc::new(config)).unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.run_seed(), 11);

        let summary = pool.join().unwrap();
        assert_eq!(summary.stats.len(), 3);
        assert!(summary.error.is_none());
        assert!(summary.failed_workers.is_empty());
        assert!(summary.stats.iter().all(|s| s.steps() == 40));
    }

    #[test]
    fn test_cancel_stops_sleeping_workers() {
        // one allocation every 5s: workers are asleep when cancelled
        let pool = WorkerPool::start(Arc::new(create_test_config(4, 0.2))).unwrap();
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        pool.cancel();
        let summary = pool.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(summary.stats.len(), 4);
        assert!(summary.stats.iter().all(|s| s.steps() == 1));
    }

    #[test]
    fn test_external_token_cancels_pool() {
        let token = CancellationToken::new();
        let pool =
            WorkerPool::start_with_cancellation(Arc::new(create_test_config(2, 0.2)), token.clone())
                .unwrap();

        token.cancel();
        assert!(pool.cancellation_token().is_cancelled());
        assert_eq!(pool.join().unwrap().stats.len(), 2);
    }

    #[test]
    fn test_exhaustion_fails_run_and_cancels_others() {
        let mut config = create_test_config(1, 0.2);
        config.workload.buffer_size = usize::MAX;
        config.workload.buckets_per_worker = 1;
        config.workload.bucket_capacity = 1;

        let token = CancellationToken::new();
        let pool = WorkerPool::start_with_cancellation(Arc::new(config), token.clone()).unwrap();

        match pool.join() {
            Err(ChurnError::ResourceExhausted { worker, bytes }) => {
                assert_eq!(worker, 0);
                assert_eq!(bytes, usize::MAX);
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|s| s.stats.len())),
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wait_keeps_stats_on_failure() {
        let mut config = create_test_config(1, 1000.0);
        config.workload.buffer_size = usize::MAX;
        config.workload.buckets_per_worker = 1;
        config.workload.bucket_capacity = 1;

        let summary = WorkerPool::start(Arc::new(config)).unwrap().wait(None);
        assert!(matches!(summary.error, Some(ChurnError::ResourceExhausted { .. })));
        assert_eq!(summary.stats.len(), 1);
        assert_eq!(summary.stats[0].steps(), 0);
    }

    #[test]
    fn test_join_timeout_expires() {
        let pool = WorkerPool::start(Arc::new(create_test_config(2, 0.2))).unwrap();
        let token = pool.cancellation_token();

        match pool.join_timeout(Duration::from_millis(50)) {
            Err(ChurnError::JoinTimeout(t)) => assert_eq!(t, Duration::from_millis(50)),
            other => panic!("expected timeout, got {:?}", other.map(|s| s.stats.len())),
        }
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_join_timeout_beyond_instant_range_is_unbounded() {
        let mut config = create_test_config(2, 1000.0);
        config.runtime.max_steps = Some(5);
        config.runtime.join_timeout_secs = Some(u64::MAX);
        assert!(validate_config(&config).is_ok());

        let pool = WorkerPool::start(Arc::new(config.clone())).unwrap();
        let summary = pool.wait(config.runtime.join_timeout());

        assert!(summary.error.is_none());
        assert_eq!(summary.stats.len(), 2);
        assert!(summary.stats.iter().all(|s| s.steps() == 5));
    }

    #[test]
    fn test_join_timeout_after_cancel() {
        let pool = WorkerPool::start(Arc::new(create_test_config(2, 0.2))).unwrap();
        pool.cancel();

        let summary = pool.join_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(summary.stats.len(), 2);
    }

    #[test]
    fn test_entropy_seed_when_unset() {
        let mut config = create_test_config(1, 1000.0);
        config.workers.seed = None;
        config.runtime.max_steps = Some(1);

        let pool = WorkerPool::start(Arc::new(config)).unwrap();
        let _ = pool.run_seed();
        pool.join().unwrap();
    }
}
