//! Archive extraction through an ordered chain of strategies.
//!
//! The upstream archives are 7z, which has no decoder every host ships with,
//! so several interchangeable strategies are tried in turn:
//!
//! 1. `external`: a standalone 7-Zip binary run as a subprocess
//! 2. `shell`: the host shell's own archive handling, watched until it finishes
//! 3. `container`: the archive re-read as a zip container
//!
//! The first strategy to succeed wins. Extraction fails only when every
//! strategy has failed, and the error lists each strategy's reason.

mod container;
mod external;
mod shell;

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use super::error::{ManagerError, ManagerResult};
pub use super::traits::ExtractStrategy;
pub use container::ContainerStrategy;
pub use external::{
    BootstrapTool, ExternalToolStrategy, PresetTool, SearchPathTool, ToolProvider,
    DEFAULT_TOOL_URL, TOOL_DIR_NAME, TOOL_PACKAGE_NAME,
};
pub use shell::{
    HostShell, ShellHandoff, ShellJob, ShellNamespaceStrategy, DEFAULT_POLL_INTERVAL,
    DEFAULT_SHELL_TIMEOUT,
};

/// Ordered list of extraction strategies.
pub struct ArchiveExtractor {
    strategies: Vec<Box<dyn ExtractStrategy>>,
}

impl ArchiveExtractor {
    /// Create an extractor trying `strategies` in order.
    pub fn new(strategies: Vec<Box<dyn ExtractStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard chain: archive tool, then host shell, then zip container.
    pub fn standard(tool: Box<dyn ToolProvider>, shell_timeout: Duration) -> Self {
        let strategies: Vec<Box<dyn ExtractStrategy>> = vec![
            Box::new(ExternalToolStrategy::new(tool)),
            Box::new(ShellNamespaceStrategy::new().with_timeout(shell_timeout)),
            Box::new(ContainerStrategy::new()),
        ];
        Self::new(strategies)
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract `archive` into `dest`.
    ///
    /// `dest` is emptied before every attempt so a strategy never sees the
    /// partial output of the one before it. A destination that cannot be
    /// emptied counts as that strategy's failure. Returns the name of the
    /// strategy that succeeded.
    pub fn extract(&self, archive: &Path, dest: &Path) -> ManagerResult<&'static str> {
        let mut diagnostics = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let attempt = reset_dir(dest).and_then(|()| strategy.try_extract(archive, dest));

            match attempt {
                Ok(()) => {
                    info!(
                        archive = %archive.display(),
                        strategy = strategy.name(),
                        "Extraction succeeded"
                    );
                    return Ok(strategy.name());
                }
                Err(e) => {
                    warn!(
                        archive = %archive.display(),
                        strategy = strategy.name(),
                        error = %e,
                        "Extraction strategy failed, trying next"
                    );
                    diagnostics.push(format!("{}: {}", strategy.name(), e));
                }
            }
        }

        let reason = if diagnostics.is_empty() {
            "no extraction strategies configured".to_string()
        } else {
            format!("all extraction strategies failed ({})", diagnostics.join("; "))
        };
        Err(ManagerError::ExtractionFailed {
            path: archive.to_path_buf(),
            reason,
        })
    }
}

/// Remove `dir` if present and recreate it empty.
pub(crate) fn reset_dir(dir: &Path) -> ManagerResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| ManagerError::RemoveFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }
    fs::create_dir_all(dir).map_err(|e| ManagerError::CreateDirFailed {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Whether `dir` contains at least one entry.
pub(crate) fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Strategy that records its invocation and either fails or writes a marker.
    struct Scripted {
        name: &'static str,
        succeed: bool,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ExtractStrategy for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn try_extract(&self, _archive: &Path, dest: &Path) -> ManagerResult<()> {
            self.calls.lock().unwrap().push(self.name);
            // Leave debris behind either way
            fs::write(dest.join(format!("{}.out", self.name)), self.name).unwrap();
            if self.succeed {
                Ok(())
            } else {
                Err(ManagerError::ExtractionFailed {
                    path: dest.to_path_buf(),
                    reason: format!("{} refused", self.name),
                })
            }
        }
    }

    fn chain(plan: &[(&'static str, bool)]) -> (ArchiveExtractor, Arc<Mutex<Vec<&'static str>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let strategies = plan
            .iter()
            .map(|&(name, succeed)| {
                Box::new(Scripted {
                    name,
                    succeed,
                    calls: calls.clone(),
                }) as Box<dyn ExtractStrategy>
            })
            .collect();
        (ArchiveExtractor::new(strategies), calls)
    }

    #[test]
    fn test_first_success_stops_chain() {
        let temp = TempDir::new().unwrap();
        let (extractor, calls) = chain(&[("tool", true), ("shell", true), ("zip", true)]);

        let winner = extractor
            .extract(&temp.path().join("a.7z"), &temp.path().join("out"))
            .unwrap();

        assert_eq!(winner, "tool");
        assert_eq!(*calls.lock().unwrap(), vec!["tool"]);
    }

    #[test]
    fn test_falls_through_in_order() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");
        let (extractor, calls) = chain(&[("tool", false), ("shell", false), ("zip", true)]);

        let winner = extractor.extract(&temp.path().join("a.7z"), &dest).unwrap();

        assert_eq!(winner, "zip");
        assert_eq!(*calls.lock().unwrap(), vec!["tool", "shell", "zip"]);
        // Earlier strategies' debris was cleared before each attempt
        assert!(!dest.join("tool.out").exists());
        assert!(!dest.join("shell.out").exists());
        assert!(dest.join("zip.out").exists());
    }

    #[test]
    fn test_all_failures_collects_diagnostics() {
        let temp = TempDir::new().unwrap();
        let (extractor, calls) = chain(&[("tool", false), ("shell", false), ("zip", false)]);

        let err = extractor
            .extract(&temp.path().join("a.7z"), &temp.path().join("out"))
            .unwrap_err();

        assert_eq!(calls.lock().unwrap().len(), 3);
        let message = err.to_string();
        assert!(message.contains("tool refused"));
        assert!(message.contains("shell refused"));
        assert!(message.contains("zip refused"));
        assert_eq!(err.kind(), crate::manager::ErrorKind::Extraction);
    }

    #[test]
    fn test_unusable_destination_is_recorded_per_strategy() {
        let temp = TempDir::new().unwrap();
        // A regular file where the destination's parent should be
        fs::write(temp.path().join("blocker"), "file").unwrap();
        let dest = temp.path().join("blocker/out");
        let (extractor, calls) = chain(&[("tool", true), ("zip", true)]);

        let err = extractor
            .extract(&temp.path().join("a.7z"), &dest)
            .unwrap_err();

        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(err.kind(), crate::manager::ErrorKind::Extraction);
        let message = err.to_string();
        assert!(message.contains("tool: failed to create directory"), "{}", message);
        assert!(message.contains("zip: failed to create directory"), "{}", message);
    }

    #[test]
    fn test_empty_chain_fails() {
        let temp = TempDir::new().unwrap();
        let extractor = ArchiveExtractor::new(Vec::new());

        let result = extractor.extract(&temp.path().join("a.7z"), &temp.path().join("out"));
        assert!(matches!(result, Err(ManagerError::ExtractionFailed { .. })));
    }

    #[test]
    fn test_destination_starts_empty() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("out");
        fs::create_dir_all(dest.join("stale/bin")).unwrap();
        fs::write(dest.join("stale/bin/old.txt"), "old").unwrap();

        let (extractor, _) = chain(&[("tool", true)]);
        extractor.extract(&temp.path().join("a.7z"), &dest).unwrap();

        assert!(!dest.join("stale").exists());
        assert!(is_populated(&dest));
    }

    #[test]
    fn test_standard_chain_order() {
        let extractor = ArchiveExtractor::standard(
            Box::new(PresetTool::new("/usr/bin/7zz")),
            Duration::from_secs(60),
        );
        assert_eq!(
            extractor.strategy_names(),
            vec!["archive tool", "host shell", "zip container"]
        );
    }

    #[test]
    fn test_is_populated() {
        let temp = TempDir::new().unwrap();
        assert!(!is_populated(temp.path()));
        assert!(!is_populated(&temp.path().join("missing")));
        fs::create_dir(temp.path().join("child")).unwrap();
        assert!(is_populated(temp.path()));
    }
}
