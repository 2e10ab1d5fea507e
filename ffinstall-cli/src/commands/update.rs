//! `check-update`: compare with the latest ffinstall release.

use ffinstall::config::ConfigFile;
use ffinstall::update::{check_for_update, UpdateStatus};

use super::common::downloader;
use crate::error::CliError;
use crate::ui;

pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    let current = env!("CARGO_PKG_VERSION");
    let fetcher = downloader(config)?;

    match check_for_update(&fetcher, &config.feed.update_url, current)? {
        UpdateStatus::UpToDate => ui::success(&format!("ffinstall {} is up to date", current)),
        UpdateStatus::Available { latest, url } => {
            println!("ffinstall {} is available (installed: {})", latest, current);
            if let Some(url) = url {
                println!("  {}", url);
            }
        }
    }

    Ok(())
}
