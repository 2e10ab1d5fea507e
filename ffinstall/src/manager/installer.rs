//! Copying the located payload into the install root.
//!
//! The installer handles the last two steps of an install:
//! 1. Copy the payload directory into the install root, keeping its name
//! 2. Register the payload's `bin` directory on the persistent search path
//!
//! The copy is validated by checking that the executable landed where it
//! is expected before anything is registered.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::error::{ManagerError, ManagerResult};
use super::path_env::{register_path, InstallScope, PathRegistration};
use super::traits::PathStore;

/// Resolved install location of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    /// Root that receives the payload directory.
    pub install_root: PathBuf,
    /// The copied payload, `install_root/<payload name>`.
    pub payload_dir: PathBuf,
    /// Directory holding the executable, registered on the search path.
    pub bin_dir: PathBuf,
}

impl InstallLayout {
    /// Layout for a payload named `payload_name` under `install_root`.
    pub fn new(install_root: &Path, payload_name: impl AsRef<Path>) -> Self {
        let payload_dir = install_root.join(payload_name);
        let bin_dir = payload_dir.join("bin");
        Self {
            install_root: install_root.to_path_buf(),
            payload_dir,
            bin_dir,
        }
    }

    /// Full path of `executable` inside the bin directory.
    pub fn executable(&self, executable: &str) -> PathBuf {
        self.bin_dir.join(executable)
    }
}

/// Copies payloads and registers them on the search path.
pub struct Installer {
    store: Arc<dyn PathStore>,
    executable: String,
}

impl Installer {
    /// Create an installer validating against `executable`.
    pub fn new(store: Arc<dyn PathStore>, executable: impl Into<String>) -> Self {
        Self {
            store,
            executable: executable.into(),
        }
    }

    /// The search-path store used for registration.
    pub fn store(&self) -> &dyn PathStore {
        self.store.as_ref()
    }

    /// Remove everything under `install_root` and recreate it empty.
    pub fn clear_root(&self, install_root: &Path) -> ManagerResult<()> {
        if install_root.exists() {
            info!(root = %install_root.display(), "Removing previous installation");
            fs::remove_dir_all(install_root).map_err(|e| ManagerError::RemoveFailed {
                path: install_root.to_path_buf(),
                source: e,
            })?;
        }
        fs::create_dir_all(install_root).map_err(|e| ManagerError::CreateDirFailed {
            path: install_root.to_path_buf(),
            source: e,
        })
    }

    /// Copy `payload_dir` to `install_root/<payload name>` and validate it.
    pub fn install(&self, payload_dir: &Path, install_root: &Path) -> ManagerResult<InstallLayout> {
        let payload_name = payload_dir
            .file_name()
            .ok_or_else(|| ManagerError::LayoutInvalid {
                path: payload_dir.to_path_buf(),
                reason: "payload directory has no name".to_string(),
            })?;
        let layout = InstallLayout::new(install_root, payload_name);

        info!(
            from = %payload_dir.display(),
            to = %layout.payload_dir.display(),
            "Copying payload"
        );
        copy_dir_recursive(payload_dir, &layout.payload_dir)?;

        let executable = layout.executable(&self.executable);
        if !executable.is_file() {
            return Err(ManagerError::LayoutInvalid {
                path: executable,
                reason: format!("{} missing after copy", self.executable),
            });
        }

        Ok(layout)
    }

    /// Install the payload and register its bin directory for `scope`.
    pub fn install_and_register(
        &self,
        payload_dir: &Path,
        install_root: &Path,
        scope: InstallScope,
    ) -> ManagerResult<(InstallLayout, PathRegistration)> {
        let layout = self.install(payload_dir, install_root)?;
        let registration = register_path(self.store.as_ref(), &layout.bin_dir, scope)?;
        Ok((layout, registration))
    }
}

/// Recursively copy a directory, replacing files that already exist.
///
/// Symbolic links are recreated as links, never followed.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> ManagerResult<()> {
    fs::create_dir_all(dest).map_err(|e| ManagerError::CreateDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    for entry in fs::read_dir(source).map_err(|e| ManagerError::ReadFailed {
        path: source.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| ManagerError::ReadFailed {
            path: source.to_path_buf(),
            source: e,
        })?;

        let source_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| ManagerError::ReadFailed {
            path: source_path.clone(),
            source: e,
        })?;

        if file_type.is_symlink() {
            copy_symlink(&source_path, &dest_path)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&source_path, &dest_path)?;
        } else {
            fs::copy(&source_path, &dest_path).map_err(|e| ManagerError::WriteFailed {
                path: dest_path,
                source: e,
            })?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, dest: &Path) -> ManagerResult<()> {
    let target = fs::read_link(source).map_err(|e| ManagerError::ReadFailed {
        path: source.to_path_buf(),
        source: e,
    })?;

    if let Ok(existing) = fs::symlink_metadata(dest) {
        let removed = if existing.is_dir() {
            fs::remove_dir_all(dest)
        } else {
            fs::remove_file(dest)
        };
        removed.map_err(|e| ManagerError::RemoveFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
    }

    std::os::unix::fs::symlink(&target, dest).map_err(|e| ManagerError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })
}

/// Links to files are copied as plain files; directory links are skipped.
#[cfg(not(unix))]
fn copy_symlink(source: &Path, dest: &Path) -> ManagerResult<()> {
    if source.is_file() {
        fs::copy(source, dest).map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;
    } else {
        tracing::warn!(link = %source.display(), "Skipping directory link in payload");
    }
    Ok(())
}
