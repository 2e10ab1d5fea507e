//! Progress and throughput reporting for downloads.

use std::time::{Duration, Instant};

/// Minimum interval between throughput samples.
pub const RATE_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Progress update emitted while a transfer is running.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchProgress {
    /// Overall completion, already scaled into the caller's range.
    Percent(u8),
    /// The server did not announce a length.
    Indeterminate,
    /// Formatted throughput of the most recent sample window.
    Rate(String),
    /// Transfer finished (or failed); clear any rate display.
    Idle,
}

/// A sub-range of the overall percentage bar reserved for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRange {
    pub start: u8,
    pub end: u8,
}

impl ProgressRange {
    /// Create a new range. `end` is clamped to be at least `start`.
    pub const fn new(start: u8, end: u8) -> Self {
        let end = if end < start { start } else { end };
        Self { start, end }
    }

    /// The whole 0-100 bar.
    pub const fn full() -> Self {
        Self::new(0, 100)
    }

    /// Scale `done` out of `total` bytes into this range.
    pub fn scale(&self, done: u64, total: u64) -> u8 {
        if total == 0 {
            return self.start;
        }
        let span = u64::from(self.end - self.start);
        let offset = done.min(total).saturating_mul(span) / total;
        (u64::from(self.start) + offset).min(u64::from(self.end)) as u8
    }
}

/// Recent-window throughput estimator.
///
/// Produces a sample only once at least `interval` has passed since the
/// previous one, computed over the bytes moved in that window.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    interval: Duration,
    last_sample: Instant,
    last_bytes: u64,
}

impl ThroughputMeter {
    /// Create a meter with the default 500ms window, starting at `now`.
    pub fn new(now: Instant) -> Self {
        Self::with_interval(now, RATE_SAMPLE_INTERVAL)
    }

    /// Create a meter with a custom sampling window.
    pub fn with_interval(now: Instant, interval: Duration) -> Self {
        Self {
            interval,
            last_sample: now,
            last_bytes: 0,
        }
    }

    /// Record the cumulative byte count at `now`.
    ///
    /// Returns bytes per second when a new sample window closed.
    pub fn sample(&mut self, now: Instant, total_bytes: u64) -> Option<f64> {
        let elapsed = now.saturating_duration_since(self.last_sample);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }

        let delta = total_bytes.saturating_sub(self.last_bytes);
        let rate = delta as f64 / elapsed.as_secs_f64();

        self.last_sample = now;
        self.last_bytes = total_bytes;
        Some(rate)
    }
}

/// Format a throughput value using 1024-based unit thresholds.
pub fn format_rate(bytes_per_second: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    if bytes_per_second < KB {
        format!("{:.0} B/s", bytes_per_second)
    } else if bytes_per_second < MB {
        format!("{:.1} KB/s", bytes_per_second / KB)
    } else if bytes_per_second < GB {
        format!("{:.1} MB/s", bytes_per_second / MB)
    } else {
        format!("{:.1} GB/s", bytes_per_second / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_range_scaling_matches_download_window() {
        let range = ProgressRange::new(10, 40);
        assert_eq!(range.scale(0, 1000), 10);
        assert_eq!(range.scale(500, 1000), 25);
        assert_eq!(range.scale(1000, 1000), 40);
        // Never overshoots even if the server under-reported the length
        assert_eq!(range.scale(5000, 1000), 40);
    }

    #[test]
    fn test_range_unknown_total_stays_at_start() {
        let range = ProgressRange::new(10, 40);
        assert_eq!(range.scale(12345, 0), 10);
    }

    #[test]
    fn test_range_clamps_inverted_bounds() {
        let range = ProgressRange::new(50, 20);
        assert_eq!(range.end, 50);
        assert_eq!(range.scale(1, 2), 50);
    }

    #[test]
    fn test_meter_waits_for_window() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::new(start);

        assert_eq!(meter.sample(start + Duration::from_millis(100), 4096), None);
        assert_eq!(meter.sample(start + Duration::from_millis(499), 8192), None);

        let rate = meter
            .sample(start + Duration::from_millis(500), 10_000)
            .unwrap();
        assert!((rate - 20_000.0).abs() < 0.001);
    }

    #[test]
    fn test_meter_uses_recent_window_only() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::new(start);

        meter.sample(start + Duration::from_secs(1), 1_000_000).unwrap();
        let rate = meter.sample(start + Duration::from_secs(2), 1_001_000).unwrap();
        assert!((rate - 1000.0).abs() < 0.001);
    }

    #[test]
    fn test_format_rate_units() {
        assert_eq!(format_rate(0.0), "0 B/s");
        assert_eq!(format_rate(512.0), "512 B/s");
        assert_eq!(format_rate(1024.0), "1.0 KB/s");
        assert_eq!(format_rate(1536.0), "1.5 KB/s");
        assert_eq!(format_rate(5.0 * 1024.0 * 1024.0), "5.0 MB/s");
        assert_eq!(format_rate(2.5 * 1024.0 * 1024.0 * 1024.0), "2.5 GB/s");
    }

    proptest! {
        #[test]
        fn prop_scale_stays_within_range(start in 0u8..=100, width in 0u8..=100, done: u64, total: u64) {
            let end = start.saturating_add(width).min(100);
            let range = ProgressRange::new(start, end);
            let value = range.scale(done, total);
            prop_assert!(value >= range.start && value <= range.end);
        }

        #[test]
        fn prop_format_rate_picks_unit_by_magnitude(rate in 0.0f64..1e13) {
            let text = format_rate(rate);
            let unit = if rate < 1024.0 {
                " B/s"
            } else if rate < 1024.0 * 1024.0 {
                " KB/s"
            } else if rate < 1024.0 * 1024.0 * 1024.0 {
                " MB/s"
            } else {
                " GB/s"
            };
            prop_assert!(text.ends_with(unit), "{} should end with {}", text, unit);
        }
    }
}
