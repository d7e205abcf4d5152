//! Process resource sampling
//!
//! Reads CPU time from /proc/self/stat and memory from /proc/self/status on
//! Linux. Every reader returns `None` elsewhere so callers can degrade to
//! "not available" instead of failing the run.

use serde::Serialize;
use std::fs;
use std::time::Instant;

/// Resource utilization snapshot
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    /// CPU time in user mode (microseconds)
    pub cpu_user_us: u64,
    /// CPU time in kernel mode (microseconds)
    pub cpu_system_us: u64,
    /// Wall-clock time when snapshot was taken
    pub timestamp: Instant,
    /// Resident Set Size (RSS) in bytes
    pub memory_rss_bytes: u64,
    /// Virtual Memory Size (VmSize) in bytes
    pub memory_vm_bytes: u64,
    /// RSS high-water mark (VmHWM) in bytes, 0 if the kernel does not report it
    pub memory_hwm_bytes: u64,
}

/// Resource usage over a run
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResourceStats {
    /// CPU utilization percentage (0.0 - 100.0 * num_cores)
    pub cpu_percent: f64,
    /// Average RSS over the samples, in bytes
    pub memory_bytes: u64,
    /// Peak RSS in bytes
    pub peak_memory_bytes: u64,
}

/// Memory figures read from /proc/self/status
#[derive(Debug, Clone, Copy, Default)]
struct MemoryStatus {
    rss_bytes: u64,
    vm_bytes: u64,
    hwm_bytes: u64,
}

impl ResourceSnapshot {
    /// Take a snapshot of current resource utilization
    ///
    /// Returns None if unable to read proc files (e.g., on non-Linux systems).
    pub fn take() -> Option<Self> {
        let cpu = Self::read_cpu_time()?;
        let memory = read_memory_status()?;

        Some(Self {
            cpu_user_us: cpu.0,
            cpu_system_us: cpu.1,
            timestamp: Instant::now(),
            memory_rss_bytes: memory.rss_bytes,
            memory_vm_bytes: memory.vm_bytes,
            memory_hwm_bytes: memory.hwm_bytes,
        })
    }

    /// Read CPU time from /proc/self/stat
    ///
    /// Returns (user_time_us, system_time_us) or None on error.
    fn read_cpu_time() -> Option<(u64, u64)> {
        let stat = fs::read_to_string("/proc/self/stat").ok()?;

        // The command name may contain spaces; fields are counted after the closing ')'
        let after_comm = &stat[stat.rfind(')')? + 1..];
        let fields: Vec<&str> = after_comm.split_whitespace().collect();

        // utime and stime are fields 14 and 15 overall, 12 and 13 after comm
        let utime_ticks: u64 = fields.get(11)?.parse().ok()?;
        let stime_ticks: u64 = fields.get(12)?.parse().ok()?;

        // USER_HZ is 100 on every mainstream Linux configuration
        let ticks_per_sec = 100;
        let utime_us = (utime_ticks * 1_000_000) / ticks_per_sec;
        let stime_us = (stime_ticks * 1_000_000) / ticks_per_sec;

        Some((utime_us, stime_us))
    }

    /// Calculate CPU utilization between two snapshots
    ///
    /// For example, 150.0 means 1.5 cores worth of CPU time.
    pub fn cpu_percent_since(&self, earlier: &ResourceSnapshot) -> f64 {
        let wall_time_us = self.timestamp.duration_since(earlier.timestamp).as_micros() as u64;
        if wall_time_us == 0 {
            return 0.0;
        }

        let cpu_time_us = (self.cpu_user_us + self.cpu_system_us)
            .saturating_sub(earlier.cpu_user_us + earlier.cpu_system_us);

        (cpu_time_us as f64 / wall_time_us as f64) * 100.0
    }
}

fn read_memory_status() -> Option<MemoryStatus> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    parse_memory_status(&status)
}

/// Parse the VmRSS / VmSize / VmHWM lines of a /proc/<pid>/status document
fn parse_memory_status(status: &str) -> Option<MemoryStatus> {
    let mut rss_kb = None;
    let mut vm_kb = None;
    let mut hwm_kb = None;

    for line in status.lines() {
        let mut parts = line.split_whitespace();
        let slot = match parts.next() {
            Some("VmRSS:") => &mut rss_kb,
            Some("VmSize:") => &mut vm_kb,
            Some("VmHWM:") => &mut hwm_kb,
            _ => continue,
        };
        *slot = parts.next().and_then(|v| v.parse::<u64>().ok());
    }

    Some(MemoryStatus {
        rss_bytes: rss_kb? * 1024,
        vm_bytes: vm_kb? * 1024,
        hwm_bytes: hwm_kb.unwrap_or(0) * 1024,
    })
}

/// Resource tracker that samples resource utilization over time
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    start_snapshot: Option<ResourceSnapshot>,
    samples: Vec<ResourceSnapshot>,
    peak_memory_bytes: u64,
}

impl ResourceTracker {
    /// Create a new resource tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking (take initial snapshot)
    pub fn start(&mut self) {
        if let Some(snapshot) = ResourceSnapshot::take() {
            self.peak_memory_bytes = snapshot.memory_rss_bytes;
            self.start_snapshot = Some(snapshot);
        }
    }

    /// Sample current resource utilization
    pub fn sample(&mut self) {
        if let Some(snapshot) = ResourceSnapshot::take() {
            self.peak_memory_bytes = self
                .peak_memory_bytes
                .max(snapshot.memory_rss_bytes)
                .max(snapshot.memory_hwm_bytes);
            self.samples.push(snapshot);
        }
    }

    /// Number of samples taken since `start`
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Get resource statistics
    ///
    /// Returns None if tracking never started or is not supported.
    pub fn stats(&self) -> Option<ResourceStats> {
        let start = self.start_snapshot.as_ref()?;
        let last = self.samples.last()?;

        let total_memory: u64 = self.samples.iter().map(|s| s.memory_rss_bytes).sum();
        let avg_memory = total_memory / self.samples.len() as u64;

        Some(ResourceStats {
            cpu_percent: last.cpu_percent_since(start),
            memory_bytes: avg_memory,
            peak_memory_bytes: self.peak_memory_bytes,
        })
    }
}
