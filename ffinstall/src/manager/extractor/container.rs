//! Container-archive fallback and the shared zip unpacker.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::ExtractStrategy;

/// Extraction by reading the archive as a zip container.
///
/// The archive is first copied next to itself with a `.zip` extension; the
/// copy is removed again whether or not extraction succeeded.
#[derive(Debug, Default)]
pub struct ContainerStrategy;

impl ContainerStrategy {
    pub fn new() -> Self {
        Self
    }
}

/// Path of the renamed copy for `archive`.
///
/// An archive that already ends in `.zip` gets a second extension so the
/// copy never overwrites its source.
pub(crate) fn container_copy_path(archive: &Path) -> PathBuf {
    let is_zip = archive
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        let mut name = archive.as_os_str().to_os_string();
        name.push(".zip");
        PathBuf::from(name)
    } else {
        archive.with_extension("zip")
    }
}

impl ExtractStrategy for ContainerStrategy {
    fn name(&self) -> &'static str {
        "zip container"
    }

    fn try_extract(&self, archive: &Path, dest: &Path) -> ManagerResult<()> {
        let copy = container_copy_path(archive);
        fs::copy(archive, &copy).map_err(|e| ManagerError::WriteFailed {
            path: copy.clone(),
            source: e,
        })?;

        let result = unpack_zip(&copy, dest);

        if let Err(e) = fs::remove_file(&copy) {
            warn!(path = %copy.display(), error = %e, "Failed to remove temporary container copy");
        }

        let count = result?;
        debug!(archive = %archive.display(), entries = count, "Container extraction finished");
        Ok(())
    }
}

/// Unpack every entry of a zip file into `dest`.
///
/// Entries whose names would escape `dest` are rejected. Returns the number
/// of files written.
pub(crate) fn unpack_zip(archive_path: &Path, dest: &Path) -> ManagerResult<usize> {
    let extraction_error = |reason: String| ManagerError::ExtractionFailed {
        path: archive_path.to_path_buf(),
        reason,
    };

    let file = File::open(archive_path).map_err(|e| ManagerError::ReadFailed {
        path: archive_path.to_path_buf(),
        source: e,
    })?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| extraction_error(format!("not a readable zip container: {}", e)))?;

    fs::create_dir_all(dest).map_err(|e| ManagerError::CreateDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| extraction_error(format!("failed to read entry {}: {}", i, e)))?;

        let relative = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| extraction_error(format!("unsafe entry path '{}'", entry.name())))?;
        let output_path = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(|e| ManagerError::CreateDirFailed {
                path: output_path.clone(),
                source: e,
            })?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut outfile = File::create(&output_path).map_err(|e| ManagerError::WriteFailed {
            path: output_path.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut outfile).map_err(|e| ManagerError::WriteFailed {
            path: output_path.clone(),
            source: e,
        })?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&output_path, fs::Permissions::from_mode(mode & 0o777)).map_err(
                |e| ManagerError::WriteFailed {
                    path: output_path.clone(),
                    source: e,
                },
            )?;
        }

        files += 1;
    }

    Ok(files)
}
