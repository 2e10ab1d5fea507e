//! SHA-256 checksum calculation for archive verification.
//!
//! This module provides utilities for calculating and verifying file checksums
//! used before an archive is extracted.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::manager::error::{ManagerError, ManagerResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of comparing a file against its published digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    /// Whether the file is accepted.
    pub verified: bool,
    /// Digest the file was compared against, if one was published.
    pub expected: Option<String>,
    /// Digest of the file on disk; `None` when verification was skipped.
    pub actual: Option<String>,
}

impl VerificationResult {
    /// Whether the comparison was skipped because no digest was available.
    pub fn skipped(&self) -> bool {
        self.expected.is_none()
    }
}

/// Calculate SHA-256 checksum of a file.
///
/// # Arguments
///
/// * `path` - Path to the file to checksum
///
/// # Returns
///
/// The lowercase hexadecimal SHA-256 hash of the file contents.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn calculate_file_checksum(path: &Path) -> ManagerResult<String> {
    let mut file = File::open(path).map_err(|e| ManagerError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ManagerError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Verify that a file matches an expected checksum.
///
/// The comparison ignores case. An empty `expected` digest means the
/// manifest could not be fetched; the file is then accepted without hashing.
///
/// # Errors
///
/// Returns an error only if the file cannot be read.
pub fn verify_checksum(path: &Path, expected: &str) -> ManagerResult<VerificationResult> {
    let expected = expected.trim();
    if expected.is_empty() {
        info!(path = %path.display(), "Skipping hash verification (hash not available)");
        return Ok(VerificationResult {
            verified: true,
            expected: None,
            actual: None,
        });
    }

    let actual = calculate_file_checksum(path)?;
    let verified = actual.eq_ignore_ascii_case(expected);

    if verified {
        info!(path = %path.display(), "File hash verification successful");
    } else {
        warn!(
            path = %path.display(),
            expected = %expected,
            actual = %actual,
            "Hash mismatch"
        );
    }

    Ok(VerificationResult {
        verified,
        expected: Some(expected.to_string()),
        actual: Some(actual),
    })
}

/// Convert a failed verification into a `ChecksumMismatch` error.
pub fn mismatch_error(path: &Path, result: &VerificationResult) -> ManagerError {
    ManagerError::ChecksumMismatch {
        filename: path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string(),
        expected: result.expected.clone().unwrap_or_default(),
        actual: result.actual.clone().unwrap_or_default(),
    }
}
