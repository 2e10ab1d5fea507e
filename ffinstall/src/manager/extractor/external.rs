//! External archive-tool strategy.
//!
//! Runs a standalone 7-Zip binary as a subprocess. The binary comes from a
//! [`ToolProvider`]: either a configured path, a tool already on the search
//! path, or a package downloaded once into the scratch area.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::container::unpack_zip;
use crate::manager::download::{FetchProgress, ProgressRange};
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::{ExtractStrategy, Fetcher};

/// Default download location of the self-contained tool package.
pub const DEFAULT_TOOL_URL: &str = "https://www.7-zip.org/a/7za920.zip";

/// File name of the downloaded tool package inside the scratch area.
pub const TOOL_PACKAGE_NAME: &str = "7za.zip";

/// Directory the tool package is unpacked into inside the scratch area.
pub const TOOL_DIR_NAME: &str = "7z-tool";

/// Binary names accepted inside the tool directory or on the search path.
#[cfg(windows)]
const TOOL_BINARIES: &[&str] = &["7za.exe", "7z.exe"];
#[cfg(not(windows))]
const TOOL_BINARIES: &[&str] = &["7za", "7zz", "7z"];

/// Resolves the archive-tool binary.
pub trait ToolProvider: Send + Sync {
    /// Path to a runnable tool binary, fetching it first if necessary.
    fn resolve(&self) -> ManagerResult<PathBuf>;
}

/// A tool binary at a fixed, configured location.
#[derive(Debug, Clone)]
pub struct PresetTool {
    path: PathBuf,
}

impl PresetTool {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ToolProvider for PresetTool {
    fn resolve(&self) -> ManagerResult<PathBuf> {
        if self.path.is_file() {
            Ok(self.path.clone())
        } else {
            Err(ManagerError::ExtractionFailed {
                path: self.path.clone(),
                reason: "configured archive tool does not exist".to_string(),
            })
        }
    }
}

/// The tool package downloaded and unpacked once into the scratch area.
pub struct BootstrapTool {
    fetcher: Arc<dyn Fetcher>,
    url: String,
    scratch_dir: PathBuf,
}

impl BootstrapTool {
    pub fn new(fetcher: Arc<dyn Fetcher>, url: impl Into<String>, scratch_dir: &Path) -> Self {
        Self {
            fetcher,
            url: url.into(),
            scratch_dir: scratch_dir.to_path_buf(),
        }
    }

    /// Downloaded package location.
    pub fn package_path(&self) -> PathBuf {
        self.scratch_dir.join(TOOL_PACKAGE_NAME)
    }

    /// Unpacked tool directory.
    pub fn tool_dir(&self) -> PathBuf {
        self.scratch_dir.join(TOOL_DIR_NAME)
    }

    fn download_and_unpack(&self) -> ManagerResult<PathBuf> {
        let package = self.package_path();
        info!(url = %self.url, "Downloading archive tool");
        self.fetcher
            .fetch(&self.url, &package, ProgressRange::full(), &|_: FetchProgress| {})?;

        let tool_dir = self.tool_dir();
        unpack_zip(&package, &tool_dir)?;

        let binary = find_in_dir(&tool_dir).ok_or_else(|| ManagerError::ExtractionFailed {
            path: package.clone(),
            reason: format!("tool package does not contain any of {:?}", TOOL_BINARIES),
        })?;
        mark_executable(&binary)?;

        info!(tool = %binary.display(), "Archive tool ready");
        Ok(binary)
    }
}

impl ToolProvider for BootstrapTool {
    fn resolve(&self) -> ManagerResult<PathBuf> {
        if let Some(cached) = find_in_dir(&self.tool_dir()) {
            debug!(tool = %cached.display(), "Using cached archive tool");
            return Ok(cached);
        }
        self.download_and_unpack()
    }
}

/// A tool already installed on the search path, with an optional fallback.
pub struct SearchPathTool {
    fallback: Option<Box<dyn ToolProvider>>,
}

impl SearchPathTool {
    pub fn new() -> Self {
        Self { fallback: None }
    }

    /// Provider consulted when no tool is found on the search path.
    pub fn or_else(mut self, fallback: Box<dyn ToolProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl Default for SearchPathTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolProvider for SearchPathTool {
    fn resolve(&self) -> ManagerResult<PathBuf> {
        let found = env::var_os("PATH")
            .and_then(|paths| env::split_paths(&paths).find_map(|dir| find_in_dir(&dir)));

        match (found, &self.fallback) {
            (Some(tool), _) => {
                debug!(tool = %tool.display(), "Using archive tool from search path");
                Ok(tool)
            }
            (None, Some(fallback)) => fallback.resolve(),
            (None, None) => Err(ManagerError::ExtractionFailed {
                path: PathBuf::new(),
                reason: "no archive tool found on the search path".to_string(),
            }),
        }
    }
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    TOOL_BINARIES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> ManagerResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| {
        ManagerError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> ManagerResult<()> {
    Ok(())
}

/// Extraction through the external archive tool.
///
/// Success is the tool's zero exit status. Anything the tool writes to
/// standard error is logged either way.
pub struct ExternalToolStrategy {
    provider: Box<dyn ToolProvider>,
}

impl ExternalToolStrategy {
    pub fn new(provider: Box<dyn ToolProvider>) -> Self {
        Self { provider }
    }
}

impl ExtractStrategy for ExternalToolStrategy {
    fn name(&self) -> &'static str {
        "archive tool"
    }

    fn try_extract(&self, archive: &Path, dest: &Path) -> ManagerResult<()> {
        let tool = self.provider.resolve()?;

        let mut output_flag = std::ffi::OsString::from("-o");
        output_flag.push(dest.as_os_str());

        let output = Command::new(&tool)
            .arg("x")
            .arg(archive)
            .arg(output_flag)
            .arg("-y")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: format!("failed to run {}: {}", tool.display(), e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            if output.status.success() {
                info!(tool = %tool.display(), "Archive tool stderr: {}", stderr);
            } else {
                warn!(tool = %tool.display(), "Archive tool stderr: {}", stderr);
            }
        }

        if !output.status.success() {
            return Err(ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: match output.status.code() {
                    Some(code) => format!("archive tool exited with code {}", code),
                    None => "archive tool terminated by signal".to_string(),
                },
            });
        }

        Ok(())
    }
}
