//! Self-update check against the project's release feed.
//!
//! Purely informational: a failed check never blocks an install.

use semver::Version;
use serde::Deserialize;
use tracing::{debug, info};

use crate::manager::{Fetcher, ManagerError, ManagerResult};

/// Subset of the GitHub "latest release" response.
#[derive(Debug, Clone, Deserialize)]
struct LatestRelease {
    tag_name: String,
    #[serde(default)]
    html_url: Option<String>,
}

/// Result of comparing the running version with the latest release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Available {
        latest: String,
        /// Release page, when the feed provides one.
        url: Option<String>,
    },
}

/// Query `url` and compare its latest release tag with `current`.
pub fn check_for_update(
    fetcher: &dyn Fetcher,
    url: &str,
    current: &str,
) -> ManagerResult<UpdateStatus> {
    let body = fetcher.fetch_text(url).map_err(explain_rate_limit)?;
    let release: LatestRelease =
        serde_json::from_str(&body).map_err(|e| ManagerError::DownloadFailed {
            url: url.to_string(),
            reason: format!("invalid release feed: {}", e),
        })?;

    let latest = parse_version(&release.tag_name).ok_or_else(|| ManagerError::DownloadFailed {
        url: url.to_string(),
        reason: format!("release tag '{}' is not a version", release.tag_name),
    })?;
    let current = parse_version(current).ok_or_else(|| {
        ManagerError::InvalidConfig(format!("current version '{}' is not a version", current))
    })?;

    debug!(current = %current, latest = %latest, "Compared release versions");
    if latest > current {
        info!(latest = %latest, "Update available");
        Ok(UpdateStatus::Available {
            latest: latest.to_string(),
            url: release.html_url,
        })
    } else {
        Ok(UpdateStatus::UpToDate)
    }
}

/// Parse a version tag, tolerating a leading `v`.
fn parse_version(tag: &str) -> Option<Version> {
    let tag = tag.trim();
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(tag).ok()
}

/// The release feed answers 403 (and sometimes 429) once the anonymous
/// request quota is used up.
fn explain_rate_limit(error: ManagerError) -> ManagerError {
    match error {
        ManagerError::HttpStatus {
            url,
            status: 403 | 429,
        } => ManagerError::DownloadFailed {
            url,
            reason: "release feed rate limit exceeded, try again later".to_string(),
        },
        other => other,
    }
}
