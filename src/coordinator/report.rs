//! Run reporting
//!
//! The `Reporter` is started just before the workers and finished after they
//! have all been joined. It turns the pool's `JoinSummary` into a `RunReport`
//! that the text and JSON outputs render.

use crate::config::Config;
use crate::error::ChurnError;
use crate::stats::histogram::LatencyHistogram;
use crate::stats::{aggregate, WorkerStats};
use crate::util::resource::ResourceStats;
use crate::util::time::calculate_rate;
use crate::worker::JoinSummary;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every worker stopped by cancellation or step limit
    Completed,
    /// Workers were still running when the join bound expired
    TimedOut,
    /// A fatal error ended the run
    Failed { reason: String },
}

impl RunOutcome {
    fn from_error(error: Option<&ChurnError>) -> Self {
        match error {
            None => RunOutcome::Completed,
            Some(ChurnError::JoinTimeout(_)) => RunOutcome::TimedOut,
            Some(e) => RunOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Step latency summary in microseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: u64,
    pub min_us: Option<f64>,
    pub mean_us: Option<f64>,
    pub p50_us: Option<f64>,
    pub p99_us: Option<f64>,
    pub max_us: Option<f64>,
}

impl LatencySummary {
    pub fn from_histogram(hist: &LatencyHistogram) -> Self {
        let us = |d: Option<Duration>| d.map(|d| d.as_secs_f64() * 1e6);
        Self {
            samples: hist.len(),
            min_us: us(hist.min()),
            mean_us: us(hist.mean()),
            p50_us: us(hist.percentile(50.0)),
            p99_us: us(hist.percentile(99.0)),
            max_us: us(hist.max()),
        }
    }
}

/// Counters for one worker, or for the whole pool
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepTotals {
    pub steps: u64,
    pub clears: u64,
    pub bytes_allocated: u64,
    pub peak_held_buffers: u64,
    /// Achieved allocations per second
    pub alloc_rate: f64,
    pub latency: LatencySummary,
}

impl StepTotals {
    fn from_stats(stats: &WorkerStats, elapsed: Duration) -> Self {
        Self {
            steps: stats.steps(),
            clears: stats.clears(),
            bytes_allocated: stats.bytes_allocated(),
            peak_held_buffers: stats.peak_held_buffers(),
            alloc_rate: calculate_rate(stats.steps(), elapsed),
            latency: LatencySummary::from_histogram(stats.step_latency()),
        }
    }
}

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub hostname: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub outcome: RunOutcome,
    pub run_seed: u64,
    pub config: Config,
    pub totals: StepTotals,
    pub workers: Vec<StepTotals>,
    /// Workers whose thread panicked
    pub failed_workers: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceStats>,
}

impl RunReport {
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.elapsed_secs)
    }
}

/// Measures a run from just before the workers start
#[derive(Debug)]
pub struct Reporter {
    config: Arc<Config>,
    start_time: DateTime<Utc>,
    started: Instant,
}

impl Reporter {
    pub fn start(config: Arc<Config>) -> Self {
        Self {
            config,
            start_time: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Build the report once every worker has been joined
    pub fn finish(
        self,
        summary: JoinSummary,
        run_seed: u64,
        resources: Option<ResourceStats>,
    ) -> Result<RunReport> {
        let elapsed = self.started.elapsed();
        let total = aggregate(&summary.stats)?;

        Ok(RunReport {
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string()),
            start_time: self.start_time,
            end_time: Utc::now(),
            elapsed_secs: elapsed.as_secs_f64(),
            outcome: RunOutcome::from_error(summary.error.as_ref()),
            run_seed,
            config: (*self.config).clone(),
            totals: StepTotals::from_stats(&total, elapsed),
            workers: summary
                .stats
                .iter()
                .map(|s| StepTotals::from_stats(s, s.run_time()))
                .collect(),
            failed_workers: summary.failed_workers,
            resources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_with_steps(steps: u64) -> WorkerStats {
        let mut stats = WorkerStats::new();
        for i in 0..steps {
            stats.record_step(1024, i % 4 == 3, i % 4 + 1, Duration::from_micros(20));
        }
        stats.set_run_time(Duration::from_secs(1));
        stats
    }

    #[test]
    fn test_completed_report() {
        let reporter = Reporter::start(Arc::new(Config::default()));
        let summary = JoinSummary {
            stats: vec![stats_with_steps(8), stats_with_steps(4)],
            failed_workers: vec![],
            error: None,
        };

        let report = reporter.finish(summary, 42, None).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.outcome.is_success());
        assert_eq!(report.run_seed, 42);
        assert_eq!(report.totals.steps, 12);
        assert_eq!(report.totals.clears, 3);
        assert_eq!(report.totals.bytes_allocated, 12 * 1024);
        assert_eq!(report.workers.len(), 2);
        assert_eq!(report.workers[0].alloc_rate, 8.0);
        assert_eq!(report.totals.latency.samples, 12);
        assert!(report.end_time >= report.start_time);
    }

    #[test]
    fn test_timeout_outcome() {
        let reporter = Reporter::start(Arc::new(Config::default()));
        let summary = JoinSummary {
            error: Some(ChurnError::JoinTimeout(Duration::from_secs(3))),
            ..Default::default()
        };

        let report = reporter.finish(summary, 1, None).unwrap();
        assert_eq!(report.outcome, RunOutcome::TimedOut);
        assert!(!report.outcome.is_success());
    }

    #[test]
    fn test_failed_outcome_keeps_reason() {
        let reporter = Reporter::start(Arc::new(Config::default()));
        let summary = JoinSummary {
            stats: vec![stats_with_steps(2)],
            failed_workers: vec![3],
            error: Some(ChurnError::ResourceExhausted { worker: 1, bytes: 4096 }),
        };

        let report = reporter.finish(summary, 1, None).unwrap();
        match &report.outcome {
            RunOutcome::Failed { reason } => assert!(reason.contains("4096")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(report.failed_workers, vec![3]);
        assert_eq!(report.totals.steps, 2);
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(RunOutcome::Failed {
            reason: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "boom");

        let json = serde_json::to_value(RunOutcome::TimedOut).unwrap();
        assert_eq!(json["status"], "timed_out");
    }

    #[test]
    fn test_empty_latency_summary() {
        let summary = LatencySummary::from_histogram(&LatencyHistogram::new());
        assert_eq!(summary.samples, 0);
        assert!(summary.p99_us.is_none());
    }
}
