//! Common types and utilities shared across CLI commands.

use clap::ValueEnum;
use ffinstall::catalog::BuildKind;
use ffinstall::config::ConfigFile;
use ffinstall::manager::{HttpDownloader, InstallScope};
use std::time::Duration;

use crate::error::CliError;

/// Build selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum BuildChoice {
    /// Every library and codec
    Full,
    /// The commonly used subset
    Essentials,
    /// Full build with shared libraries
    Shared,
}

impl From<BuildChoice> for BuildKind {
    fn from(choice: BuildChoice) -> Self {
        match choice {
            BuildChoice::Full => BuildKind::Full,
            BuildChoice::Essentials => BuildKind::Essentials,
            BuildChoice::Shared => BuildKind::Shared,
        }
    }
}

/// Install scope selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum ScopeChoice {
    /// Current user only
    User,
    /// All users (requires administrator rights)
    System,
}

impl From<ScopeChoice> for InstallScope {
    fn from(choice: ScopeChoice) -> Self {
        match choice {
            ScopeChoice::User => InstallScope::User,
            ScopeChoice::System => InstallScope::System,
        }
    }
}

/// HTTP client honouring the configured timeout.
pub fn downloader(config: &ConfigFile) -> Result<HttpDownloader, CliError> {
    Ok(HttpDownloader::with_timeout(Duration::from_secs(
        config.download.timeout_secs,
    ))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choices_map_onto_library_types() {
        assert_eq!(BuildKind::from(BuildChoice::Essentials), BuildKind::Essentials);
        assert_eq!(BuildKind::from(BuildChoice::Shared), BuildKind::Shared);
        assert_eq!(InstallScope::from(ScopeChoice::System), InstallScope::System);
    }

    #[test]
    fn test_choice_names_match_config_values() {
        for kind in BuildKind::all() {
            let choice = BuildChoice::from_str(kind.id(), true).unwrap();
            assert_eq!(BuildKind::from(choice), kind);
        }
        for scope in InstallScope::all() {
            let choice = ScopeChoice::from_str(scope.name(), true).unwrap();
            assert_eq!(InstallScope::from(choice), scope);
        }
    }
}
