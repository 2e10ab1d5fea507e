//! HTTP downloads for archives, feeds and the archive-tool bootstrap.
//!
//! This module provides:
//! - Streaming single-file downloads (`http`)
//! - Per-transfer state tracking (`state`)
//! - Percentage scaling and throughput sampling (`progress`)
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use ffinstall::manager::download::{HttpDownloader, ProgressRange};
//! use ffinstall::manager::Fetcher;
//!
//! let downloader = HttpDownloader::new()?;
//! downloader.fetch(
//!     "https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-full.7z",
//!     Path::new("/tmp/ffmpeg-release-full.7z"),
//!     ProgressRange::new(10, 40),
//!     &|progress| println!("{:?}", progress),
//! )?;
//! ```

mod http;
mod progress;
mod state;

pub use crate::manager::traits::Fetcher;
pub use http::{HttpDownloader, DEFAULT_TIMEOUT_SECS};
pub use progress::{format_rate, FetchProgress, ProgressRange, ThroughputMeter};
pub use state::DownloadState;
