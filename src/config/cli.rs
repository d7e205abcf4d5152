//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Run the worker pool (default)
    Run,
    /// Interactive command shell reading directives from stdin
    Shell,
}

/// heapchurn - concurrent memory-pressure generator
///
/// Workload options left unset fall back to the config file, then to the
/// reference workload (4 workers, 16 buckets of 2048 x 64k buffers, 8 allocs/s).
#[derive(Parser, Debug)]
#[command(name = "heapchurn")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: run or shell
    #[arg(long, value_enum, default_value = "run")]
    pub mode: ExecutionMode,

    // === Workload Options ===
    /// Number of worker threads
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Buckets owned by each worker
    #[arg(short = 'k', long)]
    pub buckets: Option<usize>,

    /// Buffers per bucket before the bucket is cleared
    #[arg(short = 'C', long)]
    pub bucket_capacity: Option<usize>,

    /// Size of each allocated buffer (e.g., 4k, 64k, 1M)
    #[arg(short = 'b', long)]
    pub buffer_size: Option<String>,

    /// Target allocations per second, per worker
    #[arg(short = 'r', long)]
    pub rate: Option<f64>,

    /// Allocate buffers without writing to their pages
    #[arg(long)]
    pub no_touch: bool,

    /// Run seed (worker i uses seed + i)
    #[arg(long, env = "HEAPCHURN_SEED")]
    pub seed: Option<u64>,

    // === Run Bounds ===
    /// Stop after this long (e.g., 60s, 5m, 1h)
    #[arg(short = 'd', long)]
    pub duration: Option<String>,

    /// Stop each worker after this many allocation steps
    #[arg(long)]
    pub steps: Option<u64>,

    /// Give up waiting for workers after this long once they are cancelled (e.g., 10s)
    #[arg(long)]
    pub join_timeout: Option<String>,

    // === Output Options ===
    /// Write the run report as JSON to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    // === Configuration File ===
    /// TOML configuration file
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Dry run - validate configuration without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Log every append and clear
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments that clap cannot check on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        // The shell takes its directives from stdin
        if self.mode == ExecutionMode::Shell {
            return Ok(());
        }

        if let Some(rate) = self.rate {
            if !rate.is_finite() {
                anyhow::bail!("rate must be a finite number");
            }
        }

        if self.no_touch {
            eprintln!("Warning: --no-touch leaves buffers uncommitted; RSS may stay flat");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["heapchurn"]).unwrap();
        assert_eq!(cli.mode, ExecutionMode::Run);
        assert!(cli.threads.is_none());
        assert!(cli.bucket_capacity.is_none());
        assert!(!cli.debug);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_parse_workload_flags() {
        let cli = Cli::try_parse_from([
            "heapchurn", "-t", "2", "-k", "8", "-C", "512", "-b", "4k", "-r", "100", "--steps", "50",
        ])
        .unwrap();
        assert_eq!(cli.threads, Some(2));
        assert_eq!(cli.buckets, Some(8));
        assert_eq!(cli.bucket_capacity, Some(512));
        assert_eq!(cli.buffer_size.as_deref(), Some("4k"));
        assert_eq!(cli.rate, Some(100.0));
        assert_eq!(cli.steps, Some(50));
    }

    #[test]
    fn test_parse_shell_mode() {
        let cli = Cli::try_parse_from(["heapchurn", "--mode", "shell"]).unwrap();
        assert_eq!(cli.mode, ExecutionMode::Shell);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nan_rate() {
        let cli = Cli::try_parse_from(["heapchurn", "--rate", "NaN"]).unwrap();
        assert!(cli.validate().is_err());
    }
}
