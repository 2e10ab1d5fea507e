//! Download state for a single in-flight transfer.

use std::path::PathBuf;
use std::time::Instant;

use super::progress::{ProgressRange, ThroughputMeter};

/// Transient state of one transfer.
///
/// Owned by the downloader for the duration of a transfer and dropped on
/// completion or failure.
#[derive(Debug, Clone)]
pub struct DownloadState {
    /// Source URL.
    pub url: String,
    /// Destination file.
    pub destination: PathBuf,
    /// Bytes written so far.
    pub bytes_transferred: u64,
    /// Announced length, if the server sent one.
    pub total_bytes: Option<u64>,
    /// Most recent throughput sample in bytes per second.
    pub last_rate: Option<f64>,
    meter: ThroughputMeter,
}

impl DownloadState {
    /// Create a new download state starting at `now`.
    pub fn new(
        url: impl Into<String>,
        destination: impl Into<PathBuf>,
        total_bytes: Option<u64>,
        now: Instant,
    ) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            bytes_transferred: 0,
            // A zero length is as good as no length for progress purposes
            total_bytes: total_bytes.filter(|&t| t > 0),
            last_rate: None,
            meter: ThroughputMeter::new(now),
        }
    }

    /// Record a written chunk.
    ///
    /// Returns a fresh throughput sample when one is due.
    pub fn record_chunk(&mut self, bytes: usize, now: Instant) -> Option<f64> {
        self.bytes_transferred += bytes as u64;
        let rate = self.meter.sample(now, self.bytes_transferred);
        if rate.is_some() {
            self.last_rate = rate;
        }
        rate
    }

    /// Whether the total size is known.
    pub fn is_determinate(&self) -> bool {
        self.total_bytes.is_some()
    }

    /// Completion scaled into `range`, or `None` when the length is unknown.
    pub fn percent_in(&self, range: ProgressRange) -> Option<u8> {
        self.total_bytes
            .map(|total| range.scale(self.bytes_transferred, total))
    }
}
