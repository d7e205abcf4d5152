//! JSON output formatting
//!
//! The whole `RunReport` is serialized as one document: host and RFC 3339
//! timestamps, the effective configuration, the outcome, pool totals,
//! per-worker totals and resource usage.

use crate::coordinator::report::RunReport;
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Write the run report to `output_path`
pub fn write_json_report(output_path: &Path, report: &RunReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coordinator::report::Reporter;
    use crate::stats::WorkerStats;
    use crate::worker::JoinSummary;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_report() -> RunReport {
        let mut stats = WorkerStats::new();
        stats.record_step(65536, false, 1, Duration::from_micros(30));
        stats.set_run_time(Duration::from_millis(500));

        let summary = JoinSummary {
            stats: vec![stats],
            ..Default::default()
        };
        Reporter::start(Arc::new(Config::default()))
            .finish(summary, 99, None)
            .unwrap()
    }

    #[test]
    fn test_report_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_json_report(&path, &create_test_report(), true).unwrap();

        let json = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["outcome"]["status"], "completed");
        assert_eq!(value["run_seed"], 99);
        assert_eq!(value["totals"]["steps"], 1);
        assert_eq!(value["config"]["workload"]["bucket_capacity"], 2048);
        assert!(value.get("resources").is_none());
        assert!(value["start_time"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_write_json_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");

        write_json_report(&path, &create_test_report(), false).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["totals"]["bytes_allocated"], 65536);
        assert_eq!(value["workers"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_write_json_report_bad_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("report.json");
        assert!(write_json_report(&path, &create_test_report(), true).is_err());
    }
}
