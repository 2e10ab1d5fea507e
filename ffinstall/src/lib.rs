//! ffinstall - FFmpeg build installer
//!
//! This library resolves, downloads, verifies, extracts and installs an
//! upstream FFmpeg build, then registers its executable directory on the
//! persistent search path.
//!
//! # Architecture
//!
//! ```text
//! InstallPipeline (pipeline)
//!         │
//!         ├── Fetcher / HttpDownloader (manager::download)
//!         ├── checksum (manager::checksum)
//!         ├── ArchiveExtractor + ExtractStrategy chain (manager::extractor)
//!         ├── find_payload_dir (manager::locator)
//!         └── Installer + PathStore (manager::installer, manager::path_env)
//! ```
//!
//! Progress leaves the pipeline only as [`pipeline::PipelineEvent`] values;
//! the presentation layer owns every piece of display state.

pub mod catalog;
pub mod config;
pub mod logging;
pub mod manager;
pub mod pipeline;
pub mod update;
