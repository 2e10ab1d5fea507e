//! The INI configuration file and its typed sections.

use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;

use super::keys::ConfigKey;
use super::ConfigError;
use crate::catalog::{BuildKind, DEFAULT_VERSION_URL};
use crate::manager::extractor::DEFAULT_TOOL_URL;
use crate::manager::InstallScope;

/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = crate::manager::download::DEFAULT_TIMEOUT_SECS;

/// Default wait for host-shell extraction in seconds.
pub const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 60;

/// Default release feed for the self-update check.
pub const DEFAULT_UPDATE_URL: &str =
    "https://api.github.com/repos/ffinstall/ffinstall/releases/latest";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `<config dir>/ffinstall`
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ffinstall")
}

/// Location of `config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

/// Scratch area for archives, extraction and the archive tool.
pub fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("ffinstall")
}

pub fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("ffinstall")
        .join("logs")
        .join("ffinstall.log")
}

/// Per-user install root.
pub fn default_user_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(std::env::temp_dir))
        .join("ffmpeg")
}

/// Machine-wide install root.
pub fn default_system_root() -> PathBuf {
    #[cfg(windows)]
    {
        std::env::var_os("ProgramData")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\ProgramData"))
            .join("ffmpeg")
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/opt/ffmpeg")
    }
}

/// `[install]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSettings {
    pub build: BuildKind,
    pub scope: InstallScope,
    /// Overrides the per-user install root.
    pub user_root: Option<PathBuf>,
    /// Overrides the machine-wide install root.
    pub system_root: Option<PathBuf>,
}

impl InstallSettings {
    /// Effective install root for `scope`.
    pub fn root_for(&self, scope: InstallScope) -> PathBuf {
        match scope {
            InstallScope::User => self.user_root.clone().unwrap_or_else(default_user_root),
            InstallScope::System => self.system_root.clone().unwrap_or_else(default_system_root),
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub timeout_secs: u64,
    pub scratch_dir: PathBuf,
}

/// `[extract]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSettings {
    /// Where the archive-tool package is downloaded from.
    pub tool_url: String,
    /// Existing archive-tool binary; skips the bootstrap when set.
    pub tool_path: Option<PathBuf>,
    pub shell_timeout_secs: u64,
}

/// `[feed]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub version_url: String,
    pub update_url: String,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub file: PathBuf,
}

/// Parsed `config.ini`.
///
/// Every key is optional in the file; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub install: InstallSettings,
    pub download: DownloadSettings,
    pub extract: ExtractSettings,
    pub feed: FeedSettings,
    pub logging: LoggingSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            install: InstallSettings {
                build: BuildKind::default(),
                scope: InstallScope::default(),
                user_root: None,
                system_root: None,
            },
            download: DownloadSettings {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                scratch_dir: default_scratch_dir(),
            },
            extract: ExtractSettings {
                tool_url: DEFAULT_TOOL_URL.to_string(),
                tool_path: None,
                shell_timeout_secs: DEFAULT_SHELL_TIMEOUT_SECS,
            },
            feed: FeedSettings {
                version_url: DEFAULT_VERSION_URL.to_string(),
                update_url: DEFAULT_UPDATE_URL.to_string(),
            },
            logging: LoggingSettings {
                level: DEFAULT_LOG_LEVEL.to_string(),
                file: default_log_file(),
            },
        }
    }
}

impl ConfigFile {
    /// Load from the standard location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config = Self::default();
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the standard location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to an explicit file. Keys without a value are omitted.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }

        ini.write_to_file(path).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert_eq!(config.install.build, BuildKind::Full);
        assert_eq!(config.install.scope, InstallScope::User);
        assert_eq!(config.download.timeout_secs, 300);
        assert_eq!(config.extract.shell_timeout_secs, 60);
        assert_eq!(config.extract.tool_url, "https://www.7-zip.org/a/7za920.zip");
        assert_eq!(config.logging.level, "info");
        assert!(config.extract.tool_path.is_none());
    }

    #[test]
    fn test_root_for_uses_overrides() {
        let mut config = ConfigFile::default();
        assert_eq!(config.install.root_for(InstallScope::User), default_user_root());
        assert_eq!(
            config.install.root_for(InstallScope::System),
            default_system_root()
        );

        config.install.system_root = Some(PathBuf::from("/srv/ffmpeg"));
        assert_eq!(
            config.install.root_for(InstallScope::System),
            PathBuf::from("/srv/ffmpeg")
        );
    }

    #[test]
    fn test_save_and_load_preserves_settings() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.install.build = BuildKind::Shared;
        config.install.scope = InstallScope::System;
        config.download.timeout_secs = 42;
        config.extract.tool_path = Some(PathBuf::from("/usr/bin/7zz"));
        config.logging.level = "debug".to_string();

        config.save_to(&path).unwrap();
        let loaded = ConfigFile::load_from(&path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[install]\nbuild = essentials\n\n[download]\ntimeout = 90\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();

        assert_eq!(config.install.build, BuildKind::Essentials);
        assert_eq!(config.download.timeout_secs, 90);
        assert_eq!(config.install.scope, InstallScope::User);
        assert_eq!(config.feed.version_url, DEFAULT_VERSION_URL);
    }

    #[test]
    fn test_load_rejects_invalid_value() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(&path, "[download]\ntimeout = soon\n").unwrap();

        let result = ConfigFile::load_from(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
