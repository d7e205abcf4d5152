//! Human-readable text output

use crate::config::Config;
use crate::coordinator::report::{LatencySummary, RunOutcome, RunReport};
use crate::util::time::{format_duration, format_rate};

/// Print the startup summary line
pub fn print_startup(config: &Config) {
    let workload = &config.workload;
    println!(
        "Using {} buckets of up to {} buffers with {} bytes.",
        workload.buckets_per_worker, workload.bucket_capacity, workload.buffer_size
    );
    println!(
        "{} workers at {} allocs/s each, working set up to {}",
        config.workers.threads,
        format_rate(workload.alloc_rate),
        format_bytes(config.working_set_bytes_total())
    );
}

/// Print run results to console
///
/// The first line is always the elapsed time (or the reason the run failed),
/// followed by step counts, step latency and, where /proc is available,
/// process memory.
pub fn print_results(report: &RunReport) {
    match &report.outcome {
        RunOutcome::Completed => {
            println!("Finished in {:.3} seconds", report.elapsed_secs);
        }
        RunOutcome::TimedOut => {
            println!(
                "Timed out waiting for workers after {:.3} seconds",
                report.elapsed_secs
            );
        }
        RunOutcome::Failed { reason } => {
            println!("Failed after {:.3} seconds: {}", report.elapsed_secs, reason);
        }
    }
    println!();

    println!("═══════════════════════════════════════════════════════════");
    println!("                    RUN RESULTS");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    println!("Elapsed Time: {}", format_duration(report.elapsed()));
    println!("Seed:         {}", report.run_seed);
    println!();

    let totals = &report.totals;
    println!("Allocations:");
    println!(
        "  Steps:  {} ({}) - {} allocs/s",
        format_number(totals.steps),
        format_bytes(totals.bytes_allocated),
        format_rate(totals.alloc_rate)
    );
    println!("  Clears: {}", format_number(totals.clears));
    println!(
        "  Peak held buffers: {} (bound {})",
        format_number(totals.peak_held_buffers),
        format_number(report.config.max_buffers_total())
    );
    println!();

    if report.workers.len() > 1 {
        println!("Per worker:");
        for (id, worker) in report.workers.iter().enumerate() {
            println!(
                "  [{}] {} steps, {} clears, {} allocs/s",
                id,
                format_number(worker.steps),
                format_number(worker.clears),
                format_rate(worker.alloc_rate)
            );
        }
        println!();
    }

    if !report.failed_workers.is_empty() {
        println!("Panicked workers: {:?}", report.failed_workers);
        println!();
    }

    println!("Step Latency:");
    print_latency(&totals.latency);
    println!();

    if let Some(resources) = &report.resources {
        println!("Resource Utilization:");
        println!("  CPU:    {:.1}%", resources.cpu_percent);
        println!(
            "  Memory: {} (peak: {})",
            format_bytes(resources.memory_bytes),
            format_bytes(resources.peak_memory_bytes)
        );
        println!();
    }

    println!("═══════════════════════════════════════════════════════════");
}

fn print_latency(latency: &LatencySummary) {
    if latency.samples == 0 {
        println!("  No latency data collected");
        return;
    }
    let rows = [
        ("Min", latency.min_us),
        ("Mean", latency.mean_us),
        ("p50", latency.p50_us),
        ("p99", latency.p99_us),
        ("Max", latency.max_us),
    ];
    for (label, value) in rows {
        if let Some(us) = value {
            println!("  {:<5} {:>10.2} us", format!("{}:", label), us);
        }
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

/// Format bytes with appropriate units
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(65536), "64.00 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024 * 1024), "2.00 GB");
        // reference working set: 4 x 16 x 2048 x 64 KiB
        assert_eq!(format_bytes(4 * 16 * 2048 * 65536), "8.00 GB");
    }
}
