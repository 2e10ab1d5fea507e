//! Payload discovery in an extracted archive tree.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Find the directory below `search_root` that holds `bin/<executable>`.
///
/// The search is breadth-first over the descendants of `search_root` (the
/// root itself is not a candidate), visiting siblings in name order, so the
/// shallowest match wins and the result is deterministic. Unreadable
/// directories are skipped.
pub fn find_payload_dir(search_root: &Path, executable: &str) -> Option<PathBuf> {
    let mut queue: VecDeque<PathBuf> = subdirectories(search_root).into();

    while let Some(dir) = queue.pop_front() {
        if dir.join("bin").join(executable).is_file() {
            debug!(payload = %dir.display(), "Found payload directory");
            return Some(dir);
        }
        queue.extend(subdirectories(&dir));
    }

    debug!(root = %search_root.display(), executable, "No payload directory found");
    None
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_finds_top_level_payload() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("ffmpeg-7.1-full_build/bin/ffmpeg.exe"));
        touch(&temp.path().join("ffmpeg-7.1-full_build/doc/readme.txt"));

        assert_eq!(
            find_payload_dir(temp.path(), "ffmpeg.exe"),
            Some(temp.path().join("ffmpeg-7.1-full_build"))
        );
    }

    #[test]
    fn test_prefers_shallowest_match() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("a/deep/nested/foo-0.9/bin/tool"));
        touch(&temp.path().join("z/foo-1.0/bin/tool"));

        assert_eq!(
            find_payload_dir(temp.path(), "tool"),
            Some(temp.path().join("z/foo-1.0"))
        );
    }

    #[test]
    fn test_bin_without_executable_is_not_a_match() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("decoy/bin/other"));
        fs::create_dir_all(temp.path().join("decoy2/bin/tool")).unwrap();

        assert_eq!(find_payload_dir(temp.path(), "tool"), None);
    }

    #[test]
    fn test_root_itself_is_not_a_candidate() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("bin/tool"));

        assert_eq!(find_payload_dir(temp.path(), "tool"), None);
    }

    #[test]
    fn test_missing_root_is_not_found() {
        assert_eq!(
            find_payload_dir(Path::new("/nonexistent/extract/root"), "tool"),
            None
        );
    }
}
