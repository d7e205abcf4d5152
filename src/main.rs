//! heapchurn CLI entry point

use anyhow::{bail, Context, Result};
use heapchurn::config::cli::{Cli, ExecutionMode};
use heapchurn::config::{cli_convert, validator};
use heapchurn::coordinator::{Coordinator, RunOutcome};
use heapchurn::output::{json, text};
use heapchurn::shell::{HashMapStore, Shell};
use heapchurn::worker::CancellationToken;
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    match cli.mode {
        ExecutionMode::Run => run(&cli),
        ExecutionMode::Shell => {
            init_tracing(if cli.debug { "debug" } else { "info" });
            run_shell(&cli)
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides `default_level`
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Run the worker pool until it is cancelled or reaches its bounds
fn run(cli: &Cli) -> Result<()> {
    println!("heapchurn v{}", env!("CARGO_PKG_VERSION"));
    println!("Concurrent memory-pressure generator");
    println!();

    let config = cli_convert::build_config(cli)?;
    init_tracing(config.runtime.log_level());
    print!("{}", config);

    validator::validate_config(&config).context("Configuration validation failed")?;
    validator::warn_config(&config);

    if cli.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(());
    }
    println!();

    let config = Arc::new(config);
    let coordinator = Coordinator::new(config.clone());
    spawn_interrupt_handler(coordinator.cancellation_token())?;

    let report = coordinator.run()?;
    println!();
    text::print_results(&report);

    if let Some(ref path) = config.output.json_output {
        json::write_json_report(path, &report, true)?;
        println!("JSON report written to {}", path.display());
    }

    match report.outcome {
        RunOutcome::Completed => Ok(()),
        RunOutcome::TimedOut => bail!("workers did not stop within the join timeout"),
        RunOutcome::Failed { reason } => bail!("run failed: {}", reason),
    }
}

/// Cancel the run on Ctrl-C
///
/// The handler owns a single-threaded tokio runtime on its own thread; the
/// thread is left blocked when the run ends normally and dies with the process.
fn spawn_interrupt_handler(token: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    std::thread::Builder::new()
        .name("heapchurn-signal".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupted, stopping workers");
                    token.cancel();
                }
            })
        })
        .context("Failed to spawn interrupt handler")?;

    Ok(())
}

/// Read allocation commands from stdin until end of input
fn run_shell(cli: &Cli) -> Result<()> {
    let mut shell = Shell::new(HashMapStore::new(), !cli.no_touch);
    let stdin = io::stdin();
    let stdout = io::stdout();
    shell.run(stdin.lock(), &mut stdout.lock())
}
