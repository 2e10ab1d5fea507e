//! Error types for the install manager.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Broad failure categories surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Feed, manifest or archive transfer failed.
    Network,
    /// Downloaded archive did not match its published digest.
    Integrity,
    /// Every extraction strategy failed.
    Extraction,
    /// Payload or executable missing where it was expected.
    Layout,
    /// The persistent search-path store could not be updated.
    Registry,
    /// Generic filesystem failure.
    Io,
    /// Another install run is already in flight.
    Busy,
    /// Invalid configuration or selection.
    Config,
}

impl ErrorKind {
    /// Get a human-readable name for the category.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Integrity => "integrity error",
            Self::Extraction => "extraction error",
            Self::Layout => "layout error",
            Self::Registry => "registry error",
            Self::Io => "I/O error",
            Self::Busy => "busy",
            Self::Config => "configuration error",
        }
    }
}

/// Errors that can occur while installing a build.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to remove a file or directory.
    #[error("failed to remove {}: {source}", .path.display())]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Download or feed request failed.
    #[error("failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("failed to download {url}: server returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Network timeout.
    #[error("request to {url} timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    /// Checksum verification failed.
    #[error("checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// Archive extraction failed.
    #[error("failed to extract {}: {reason}", .path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Expected payload directory or executable is missing.
    #[error("{reason} (searched {})", .path.display())]
    LayoutInvalid { path: PathBuf, reason: String },

    /// The search-path store could not be read or written.
    #[error("failed to update search path in {location}: {reason}")]
    PathStoreFailed { location: String, reason: String },

    /// A second install was started while one is running.
    #[error("an installation is already in progress")]
    AlreadyRunning,

    /// Unknown build identifier.
    #[error("unknown build '{0}' (expected full, essentials or shared)")]
    UnknownBuild(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ManagerError {
    /// Map the error onto its user-facing category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadFailed { .. }
            | Self::WriteFailed { .. }
            | Self::CreateDirFailed { .. }
            | Self::RemoveFailed { .. } => ErrorKind::Io,
            Self::DownloadFailed { .. } | Self::HttpStatus { .. } | Self::Timeout { .. } => {
                ErrorKind::Network
            }
            Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
            Self::ExtractionFailed { .. } => ErrorKind::Extraction,
            Self::LayoutInvalid { .. } => ErrorKind::Layout,
            Self::PathStoreFailed { .. } => ErrorKind::Registry,
            Self::AlreadyRunning => ErrorKind::Busy,
            Self::UnknownBuild(_) | Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}
