//! `clean`: remove scratch leftovers.

use ffinstall::config::ConfigFile;
use ffinstall::pipeline::InstallPipeline;

use crate::error::CliError;
use crate::ui;

pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    let pipeline = InstallPipeline::from_config(config)?;
    println!(
        "Cleaning scratch area at: {}",
        pipeline.settings().scratch_dir.display()
    );

    let removed = pipeline.cleanup_scratch()?;
    if removed.is_empty() {
        println!("Nothing to clean");
    } else {
        for path in &removed {
            println!("  removed {}", path.display());
        }
        ui::success(&format!("Removed {} entries", removed.len()));
    }
    println!("Downloaded archives are kept for reuse.");

    Ok(())
}
