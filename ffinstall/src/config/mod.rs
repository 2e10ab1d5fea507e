//! User configuration stored in `<config dir>/ffinstall/config.ini`.
//!
//! ```ini
//! [install]
//! build = full
//! scope = user
//!
//! [download]
//! timeout = 300
//!
//! [extract]
//! tool_path = /usr/bin/7zz
//! ```
//!
//! Command-line flags override these values; the values override the
//! built-in defaults.

mod file;
mod keys;

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use file::{
    config_directory, config_file_path, default_log_file, default_scratch_dir,
    default_system_root, default_user_root, ConfigFile, DownloadSettings, ExtractSettings,
    FeedSettings, InstallSettings, LoggingSettings, DEFAULT_LOG_LEVEL, DEFAULT_SHELL_TIMEOUT_SECS,
    DEFAULT_TIMEOUT_SECS, DEFAULT_UPDATE_URL,
};
pub use keys::ConfigKey;

/// Errors loading, saving or editing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}
