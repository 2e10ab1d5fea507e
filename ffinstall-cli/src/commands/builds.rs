//! `builds`: list the catalog.

use ffinstall::catalog::catalog;
use ffinstall::config::ConfigFile;

use crate::error::CliError;

pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    println!("Available builds");
    println!("================");
    println!();

    for build in catalog() {
        let marker = if build.kind == config.install.build {
            " (default)"
        } else {
            ""
        };
        println!("{}{}", build.id(), marker);
        println!("  {} - {}", build.name, build.approximate_size);
        println!("  {}", build.description);
        println!("  {}", build.download_url);
        println!();
    }

    Ok(())
}
