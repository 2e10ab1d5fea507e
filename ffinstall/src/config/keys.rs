//! Addressable `section.key` configuration settings.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFile;
use super::ConfigError;

/// Log levels accepted by `logging.level`.
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Every setting that can appear in `config.ini`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    InstallBuild,
    InstallScope,
    InstallUserRoot,
    InstallSystemRoot,
    DownloadTimeout,
    DownloadScratchDir,
    ExtractToolUrl,
    ExtractToolPath,
    ExtractShellTimeout,
    FeedVersionUrl,
    FeedUpdateUrl,
    LoggingLevel,
    LoggingFile,
}

impl ConfigKey {
    /// All keys, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            Self::InstallBuild,
            Self::InstallScope,
            Self::InstallUserRoot,
            Self::InstallSystemRoot,
            Self::DownloadTimeout,
            Self::DownloadScratchDir,
            Self::ExtractToolUrl,
            Self::ExtractToolPath,
            Self::ExtractShellTimeout,
            Self::FeedVersionUrl,
            Self::FeedUpdateUrl,
            Self::LoggingLevel,
            Self::LoggingFile,
        ]
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        match self {
            Self::InstallBuild
            | Self::InstallScope
            | Self::InstallUserRoot
            | Self::InstallSystemRoot => "install",
            Self::DownloadTimeout | Self::DownloadScratchDir => "download",
            Self::ExtractToolUrl | Self::ExtractToolPath | Self::ExtractShellTimeout => "extract",
            Self::FeedVersionUrl | Self::FeedUpdateUrl => "feed",
            Self::LoggingLevel | Self::LoggingFile => "logging",
        }
    }

    /// Key name within the section.
    pub fn key_name(&self) -> &'static str {
        match self {
            Self::InstallBuild => "build",
            Self::InstallScope => "scope",
            Self::InstallUserRoot => "user_root",
            Self::InstallSystemRoot => "system_root",
            Self::DownloadTimeout => "timeout",
            Self::DownloadScratchDir => "scratch_dir",
            Self::ExtractToolUrl => "tool_url",
            Self::ExtractToolPath => "tool_path",
            Self::ExtractShellTimeout => "shell_timeout",
            Self::FeedVersionUrl => "version_url",
            Self::FeedUpdateUrl => "update_url",
            Self::LoggingLevel => "level",
            Self::LoggingFile => "file",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        let optional_path = |path: &Option<PathBuf>| {
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };

        match self {
            Self::InstallBuild => config.install.build.to_string(),
            Self::InstallScope => config.install.scope.to_string(),
            Self::InstallUserRoot => optional_path(&config.install.user_root),
            Self::InstallSystemRoot => optional_path(&config.install.system_root),
            Self::DownloadTimeout => config.download.timeout_secs.to_string(),
            Self::DownloadScratchDir => config.download.scratch_dir.display().to_string(),
            Self::ExtractToolUrl => config.extract.tool_url.clone(),
            Self::ExtractToolPath => optional_path(&config.extract.tool_path),
            Self::ExtractShellTimeout => config.extract.shell_timeout_secs.to_string(),
            Self::FeedVersionUrl => config.feed.version_url.clone(),
            Self::FeedUpdateUrl => config.feed.update_url.clone(),
            Self::LoggingLevel => config.logging.level.clone(),
            Self::LoggingFile => config.logging.file.display().to_string(),
        }
    }

    /// Validate and store `value`. An empty value restores the default.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            self.reset(config);
            return Ok(());
        }

        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            Self::InstallBuild => {
                config.install.build = value
                    .parse()
                    .map_err(|_| invalid("expected full, essentials or shared"))?
            }
            Self::InstallScope => {
                config.install.scope = value
                    .parse()
                    .map_err(|_| invalid("expected user or system"))?
            }
            Self::InstallUserRoot => config.install.user_root = Some(PathBuf::from(value)),
            Self::InstallSystemRoot => config.install.system_root = Some(PathBuf::from(value)),
            Self::DownloadTimeout => config.download.timeout_secs = parse_seconds(value, invalid)?,
            Self::DownloadScratchDir => config.download.scratch_dir = PathBuf::from(value),
            Self::ExtractToolUrl => config.extract.tool_url = parse_url(value, invalid)?,
            Self::ExtractToolPath => config.extract.tool_path = Some(PathBuf::from(value)),
            Self::ExtractShellTimeout => {
                config.extract.shell_timeout_secs = parse_seconds(value, invalid)?
            }
            Self::FeedVersionUrl => config.feed.version_url = parse_url(value, invalid)?,
            Self::FeedUpdateUrl => config.feed.update_url = parse_url(value, invalid)?,
            Self::LoggingLevel => {
                let level = value.to_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(invalid("expected trace, debug, info, warn or error"));
                }
                config.logging.level = level;
            }
            Self::LoggingFile => config.logging.file = PathBuf::from(value),
        }
        Ok(())
    }

    /// Restore the built-in default for this key.
    pub fn reset(&self, config: &mut ConfigFile) {
        let defaults = ConfigFile::default();
        match self {
            Self::InstallBuild => config.install.build = defaults.install.build,
            Self::InstallScope => config.install.scope = defaults.install.scope,
            Self::InstallUserRoot => config.install.user_root = None,
            Self::InstallSystemRoot => config.install.system_root = None,
            Self::DownloadTimeout => config.download.timeout_secs = defaults.download.timeout_secs,
            Self::DownloadScratchDir => config.download.scratch_dir = defaults.download.scratch_dir,
            Self::ExtractToolUrl => config.extract.tool_url = defaults.extract.tool_url,
            Self::ExtractToolPath => config.extract.tool_path = None,
            Self::ExtractShellTimeout => {
                config.extract.shell_timeout_secs = defaults.extract.shell_timeout_secs
            }
            Self::FeedVersionUrl => config.feed.version_url = defaults.feed.version_url,
            Self::FeedUpdateUrl => config.feed.update_url = defaults.feed.update_url,
            Self::LoggingLevel => config.logging.level = defaults.logging.level,
            Self::LoggingFile => config.logging.file = defaults.logging.file,
        }
    }
}

fn parse_seconds(
    value: &str,
    invalid: impl Fn(&str) -> ConfigError,
) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(0) => Err(invalid("must be at least 1 second")),
        Ok(secs) => Ok(secs),
        Err(_) => Err(invalid("expected a whole number of seconds")),
    }
}

fn parse_url(value: &str, invalid: impl Fn(&str) -> ConfigError) -> Result<String, ConfigError> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(value.to_string())
    } else {
        Err(invalid("expected an http:// or https:// URL"))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}
