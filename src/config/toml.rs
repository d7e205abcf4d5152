//! TOML configuration file parsing

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::{parse_duration, parse_size};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Result<Config> {
    // Workload
    if let Some(threads) = cli.threads {
        config.workers.threads = threads;
    }
    if let Some(buckets) = cli.buckets {
        config.workload.buckets_per_worker = buckets;
    }
    if let Some(capacity) = cli.bucket_capacity {
        config.workload.bucket_capacity = capacity;
    }
    if let Some(ref size_str) = cli.buffer_size {
        let bytes = parse_size(size_str).context("Invalid buffer size")?;
        config.workload.buffer_size = usize::try_from(bytes)
            .with_context(|| format!("Buffer size {} does not fit in memory", bytes))?;
    }
    if let Some(rate) = cli.rate {
        config.workload.alloc_rate = rate;
    }
    if cli.no_touch {
        config.workload.touch_pages = false;
    }
    if cli.seed.is_some() {
        config.workers.seed = cli.seed;
    }

    // Run bounds
    if let Some(ref duration_str) = cli.duration {
        let seconds = parse_duration(duration_str).context("Invalid duration")?;
        config.runtime.duration_secs = Some(seconds);
    }
    if cli.steps.is_some() {
        config.runtime.max_steps = cli.steps;
    }
    if let Some(ref timeout_str) = cli.join_timeout {
        let seconds = parse_duration(timeout_str).context("Invalid join timeout")?;
        config.runtime.join_timeout_secs = Some(seconds);
    }
    if cli.debug {
        config.runtime.debug = true;
    }

    // Output
    if let Some(ref path) = cli.json_output {
        config.output.json_output = Some(path.clone());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_parse_toml_basic() {
        let toml = r#"
[workload]
buffer_size = 65536
buckets_per_worker = 16
bucket_capacity = 2048
alloc_rate = 8.0

[workers]
threads = 4
seed = 42
"#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.workload.buffer_size, 65536);
        assert_eq!(config.workload.buckets_per_worker, 16);
        assert_eq!(config.workload.bucket_capacity, 2048);
        assert_eq!(config.workload.alloc_rate, 8.0);
        assert!(config.workload.touch_pages);
        assert_eq!(config.workers.threads, 4);
        assert_eq!(config.workers.seed, Some(42));
        assert_eq!(config.runtime, RuntimeConfig::default());
    }

    #[test]
    fn test_parse_toml_runtime_and_output() {
        let toml = r#"
[workload]
buffer_size = 4096
buckets_per_worker = 2
bucket_capacity = 8
alloc_rate = 1000.0
touch_pages = false

[runtime]
debug = true
duration_secs = 30
max_steps = 500
join_timeout_secs = 5

[output]
json_output = "/tmp/report.json"
"#;

        let config = parse_toml_string(toml).unwrap();
        assert!(!config.workload.touch_pages);
        assert!(config.runtime.debug);
        assert_eq!(config.runtime.duration_secs, Some(30));
        assert_eq!(config.runtime.max_steps, Some(500));
        assert_eq!(config.runtime.join_timeout_secs, Some(5));
        assert_eq!(
            config.output.json_output.as_deref(),
            Some(Path::new("/tmp/report.json"))
        );
        // workers section omitted entirely
        assert_eq!(config.workers.threads, 4);
    }

    #[test]
    fn test_parse_toml_missing_workload_field_is_error() {
        let toml = r#"
[workload]
buffer_size = 65536
buckets_per_worker = 16
alloc_rate = 8.0
"#;
        let err = parse_toml_string(toml).unwrap_err();
        assert!(format!("{:#}", err).contains("bucket_capacity"));
    }

    #[test]
    fn test_parse_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[workload]\nbuffer_size = 1024\nbuckets_per_worker = 3\nbucket_capacity = 5\nalloc_rate = 2.5"
        )
        .unwrap();

        let config = parse_toml_file(file.path()).unwrap();
        assert_eq!(config.workload.buckets_per_worker, 3);
        assert_eq!(config.workload.alloc_rate, 2.5);
    }

    #[test]
    fn test_parse_toml_file_missing() {
        let err = parse_toml_file(Path::new("/nonexistent/heapchurn.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_merge_cli_overrides_file() {
        let cli = Cli::try_parse_from([
            "heapchurn", "-t", "8", "-b", "1M", "--rate", "50", "-d", "2m", "--debug", "--no-touch",
        ])
        .unwrap();
        let mut base = Config::default();
        base.workers.seed = Some(9);

        let config = merge_cli_with_config(&cli, base).unwrap();
        assert_eq!(config.workers.threads, 8);
        assert_eq!(config.workload.buffer_size, 1024 * 1024);
        assert_eq!(config.workload.alloc_rate, 50.0);
        assert_eq!(config.runtime.duration_secs, Some(120));
        assert!(config.runtime.debug);
        assert!(!config.workload.touch_pages);
        // untouched by the CLI
        assert_eq!(config.workers.seed, Some(9));
        assert_eq!(config.workload.bucket_capacity, 2048);
    }

    #[test]
    fn test_merge_rejects_bad_size() {
        let cli = Cli::try_parse_from(["heapchurn", "-b", "huge"]).unwrap();
        assert!(merge_cli_with_config(&cli, Config::default()).is_err());
    }
}
