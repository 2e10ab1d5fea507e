//! Terminal interaction for the CLI.
//!
//! - `progress`: renders pipeline events as a progress bar with a log
//! - prompts for build and scope selection and the pre-flight confirmation
//! - styled one-line messages

mod progress;

pub use progress::ProgressView;

use console::{style, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Select};
use ffinstall::catalog::BuildKind;
use ffinstall::manager::InstallScope;

use crate::error::CliError;

/// Whether prompts can be shown.
pub fn is_interactive() -> bool {
    Term::stderr().is_term() && Term::stdout().is_term()
}

/// Ask which build to install.
pub fn select_build(default: BuildKind) -> Result<BuildKind, CliError> {
    let builds = BuildKind::all();
    let items: Vec<String> = builds
        .iter()
        .map(|kind| {
            let spec = kind.spec();
            format!(
                "{} ({}) - {}",
                spec.name, spec.approximate_size, spec.description
            )
        })
        .collect();
    let default_index = builds.iter().position(|k| *k == default).unwrap_or(0);

    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select an FFmpeg build")
        .items(&items)
        .default(default_index)
        .interact()?;

    Ok(builds[index])
}

/// Ask who the installation is for.
pub fn select_scope(default: InstallScope) -> Result<InstallScope, CliError> {
    let scopes = InstallScope::all();
    let items: Vec<&str> = scopes
        .iter()
        .map(|scope| match scope {
            InstallScope::User => "Current user only",
            InstallScope::System => "All users (requires administrator rights)",
        })
        .collect();
    let default_index = scopes.iter().position(|s| *s == default).unwrap_or(0);

    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Install for")
        .items(&items)
        .default(default_index)
        .interact()?;

    Ok(scopes[index])
}

/// Yes/no question defaulting to yes.
pub fn confirm(prompt: &str) -> Result<bool, CliError> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()?)
}

pub fn success(text: &str) {
    println!("{} {}", style("✓").green().bold(), text);
}

pub fn warning(text: &str) {
    eprintln!("{} {}", style("warning:").yellow().bold(), text);
}

pub fn error(text: &str) {
    eprintln!("{} {}", style("error:").red().bold(), text);
}
