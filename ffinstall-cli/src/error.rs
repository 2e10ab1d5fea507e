//! CLI error type.

use ffinstall::config::ConfigError;
use ffinstall::manager::ManagerError;
use thiserror::Error;

/// Errors surfaced to the user by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Manager(#[from] ManagerError),

    #[error("{0}")]
    ConfigFile(#[from] ConfigError),

    #[error("{0}")]
    Config(String),

    #[error("prompt failed: {0}")]
    Prompt(String),

    #[error("installation failed while {stage}: {source}")]
    Install {
        stage: &'static str,
        source: ManagerError,
    },

    #[error("system-wide installation needs administrator rights; re-run elevated (for example with sudo)")]
    PrivilegeRequired,

    #[error("the installation worker stopped unexpectedly")]
    WorkerPanicked,
}

impl From<dialoguer::Error> for CliError {
    fn from(e: dialoguer::Error) -> Self {
        CliError::Prompt(e.to_string())
    }
}
