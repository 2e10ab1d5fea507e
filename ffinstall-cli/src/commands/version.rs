//! `version`: latest upstream release.

use ffinstall::catalog::CatalogFeed;
use ffinstall::config::ConfigFile;

use super::common::downloader;
use crate::error::CliError;

pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    let fetcher = downloader(config)?;
    let feed = CatalogFeed::with_version_url(&fetcher, config.feed.version_url.clone());
    let version = feed.latest_version()?;
    println!("Latest FFmpeg release: {}", version);
    Ok(())
}
