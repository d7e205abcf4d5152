//! Elapsed-time and allocation-rate formatting for the text report

use std::time::Duration;

/// Format an elapsed time
///
/// Sub-second values keep their unit; runs of a minute or more are split
/// into minutes and seconds.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use heapchurn::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_millis(12_340)), "12.34s");
/// assert_eq!(format_duration(Duration::from_secs(125)), "2m05s");
/// assert_eq!(format_duration(Duration::from_secs(3723)), "1h02m03s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    let secs = duration.as_secs();

    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}us", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format an allocation rate in buffers per second
///
/// Low rates keep two decimals since a worker may be paced below 1/s.
///
/// # Examples
///
/// ```
/// use heapchurn::util::time::format_rate;
///
/// assert_eq!(format_rate(0.5), "0.50");
/// assert_eq!(format_rate(500.0), "500");
/// assert_eq!(format_rate(1500.0), "1.50K");
/// ```
pub fn format_rate(rate: f64) -> String {
    if rate < 100.0 {
        format!("{:.2}", rate)
    } else if rate < 1_000.0 {
        format!("{:.0}", rate)
    } else if rate < 1_000_000.0 {
        format!("{:.2}K", rate / 1_000.0)
    } else {
        format!("{:.2}M", rate / 1_000_000.0)
    }
}

/// Steps per second over `duration`, 0 for an empty interval
pub fn calculate_rate(steps: u64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();
    if seconds > 0.0 {
        steps as f64 / seconds
    } else {
        0.0
    }
}
