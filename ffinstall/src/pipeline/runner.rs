//! The install pipeline.
//!
//! Stages run strictly in sequence, each gating the next:
//!
//! ```text
//! CleaningUp (10) → Downloading (10-40) → Verifying (50) → Extracting (50-80)
//!     → Installing (95) → Testing (100) → Done
//! ```
//!
//! A stage error ends the run as `Failed` with that stage attached. The
//! downloaded archive always stays in the scratch area so a later run can
//! reuse it.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::context::{InstallRequest, PipelineSettings, RunContext};
use super::smoke::{run_smoke_test, SmokeTest};
use super::stage::{InstallStage, StatusSink, DOWNLOAD_RANGE, EXTRACT_RANGE};
use crate::catalog::BuildSpec;
use crate::config::ConfigFile;
use crate::manager::checksum::mismatch_error;
use crate::manager::extractor::{
    BootstrapTool, PresetTool, SearchPathTool, ToolProvider, TOOL_DIR_NAME, TOOL_PACKAGE_NAME,
};
use crate::manager::{
    default_store, find_payload_dir, verify_checksum, ArchiveExtractor, FetchProgress, Fetcher,
    HttpDownloader, InstallLayout, InstallScope, Installer, ManagerError, ManagerResult,
    PathRegistration, PathStore,
};

/// Suffix of an archive that is still being downloaded.
const PARTIAL_SUFFIX: &str = ".part";

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub build: BuildSpec,
    pub scope: InstallScope,
    pub layout: InstallLayout,
    pub registration: PathRegistration,
    pub smoke: SmokeTest,
    /// The archive from an earlier run was used instead of downloading.
    pub reused_download: bool,
    /// Name of the extraction strategy that succeeded.
    pub extraction_strategy: &'static str,
}

/// Terminal result of a run.
#[derive(Debug)]
pub enum PipelineOutcome {
    Done(InstallReport),
    Failed {
        stage: InstallStage,
        error: ManagerError,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done(_))
    }

    /// Stage the run ended in.
    pub fn stage(&self) -> InstallStage {
        match self {
            Self::Done(_) => InstallStage::Done,
            Self::Failed { stage, .. } => *stage,
        }
    }
}

/// Marks the pipeline busy until dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Forwards updates to the sink, keeping progress monotonic and mirroring
/// user-facing lines into the log.
struct Reporter<'a> {
    sink: &'a dyn StatusSink,
    progress: Cell<u8>,
}

impl<'a> Reporter<'a> {
    fn new(sink: &'a dyn StatusSink) -> Self {
        Self {
            sink,
            progress: Cell::new(0),
        }
    }

    fn enter(&self, stage: InstallStage, status: &str) {
        info!(stage = stage.name(), "{}", status);
        self.sink.set_status(status);
        self.progress(stage.checkpoint());
    }

    fn progress(&self, percent: u8) {
        let percent = percent.min(100);
        if percent > self.progress.get() {
            self.progress.set(percent);
            self.sink.set_progress(percent);
        }
    }

    fn fetch_progress(&self, update: FetchProgress) {
        match update {
            FetchProgress::Percent(percent) => self.progress(percent),
            FetchProgress::Indeterminate => self.sink.set_indeterminate(),
            FetchProgress::Rate(rate) => self.sink.set_speed(Some(&rate)),
            FetchProgress::Idle => self.sink.set_speed(None),
        }
    }

    fn log(&self, text: &str) {
        info!("{}", text);
        self.sink.append_log(text);
    }

    fn warn(&self, text: &str) {
        warn!("{}", text);
        self.sink.warn(text);
    }
}

/// Sequential download, verify, extract and install workflow.
///
/// Not reentrant: a run started while another is in flight is rejected
/// with [`ManagerError::AlreadyRunning`].
pub struct InstallPipeline {
    settings: PipelineSettings,
    fetcher: Arc<dyn Fetcher>,
    extractor: ArchiveExtractor,
    installer: Installer,
    running: AtomicBool,
}

impl InstallPipeline {
    pub fn new(
        settings: PipelineSettings,
        fetcher: Arc<dyn Fetcher>,
        extractor: ArchiveExtractor,
        store: Arc<dyn PathStore>,
    ) -> Self {
        let installer = Installer::new(store, settings.executable.clone());
        Self {
            settings,
            fetcher,
            extractor,
            installer,
            running: AtomicBool::new(false),
        }
    }

    /// Production pipeline: HTTP downloads, the standard extraction chain
    /// and the host's search-path store.
    pub fn from_config(config: &ConfigFile) -> ManagerResult<Self> {
        let settings = PipelineSettings::from_config(config);
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpDownloader::with_timeout(
            Duration::from_secs(config.download.timeout_secs),
        )?);

        let tool: Box<dyn ToolProvider> = match &config.extract.tool_path {
            Some(path) => Box::new(PresetTool::new(path)),
            None => Box::new(SearchPathTool::new().or_else(Box::new(BootstrapTool::new(
                fetcher.clone(),
                config.extract.tool_url.clone(),
                &settings.scratch_dir,
            )))),
        };
        let extractor = ArchiveExtractor::standard(
            tool,
            Duration::from_secs(config.extract.shell_timeout_secs),
        );

        Ok(Self::new(settings, fetcher, extractor, Arc::from(default_store())))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Fetcher shared with the catalog feed.
    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        self.fetcher.clone()
    }

    pub fn store(&self) -> &dyn PathStore {
        self.installer.store()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Execute one install run, reporting to `sink`.
    pub fn run(&self, request: InstallRequest, sink: &dyn StatusSink) -> PipelineOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            warn!("Install requested while another run is in progress");
            return PipelineOutcome::Failed {
                stage: InstallStage::Pending,
                error: ManagerError::AlreadyRunning,
            };
        };

        let reporter = Reporter::new(sink);
        let mut ctx = RunContext::new(request, &self.settings);
        info!(
            build = ctx.request.build.id(),
            scope = %ctx.request.scope,
            root = %ctx.install_root.display(),
            "Starting installation"
        );

        match self.execute(&mut ctx, &reporter) {
            Ok(report) => PipelineOutcome::Done(report),
            Err(e) => {
                error!(stage = ctx.stage.name(), error = %e, "Installation failed");
                sink.set_status("Installation failed");
                sink.set_speed(None);
                sink.append_log(&format!("Error: {}", e));
                PipelineOutcome::Failed {
                    stage: ctx.stage,
                    error: e,
                }
            }
        }
    }

    fn execute(&self, ctx: &mut RunContext, reporter: &Reporter) -> ManagerResult<InstallReport> {
        ctx.stage = InstallStage::CleaningUp;
        reporter.enter(ctx.stage, "Cleaning up previous installation...");
        guard_install_root(&ctx.install_root)?;
        self.installer.clear_root(&ctx.install_root)?;
        fs::create_dir_all(&self.settings.scratch_dir).map_err(|e| {
            ManagerError::CreateDirFailed {
                path: self.settings.scratch_dir.clone(),
                source: e,
            }
        })?;

        ctx.stage = InstallStage::Downloading;
        reporter.enter(
            ctx.stage,
            &format!("Downloading {}...", ctx.request.build.name),
        );
        if !self.reuse_download(ctx, reporter)? {
            self.download(ctx, reporter)?;
        }

        ctx.stage = InstallStage::Verifying;
        reporter.enter(ctx.stage, "Verifying download...");
        self.verify(ctx, reporter)?;

        ctx.stage = InstallStage::Extracting;
        reporter.enter(ctx.stage, "Extracting files...");
        let strategy = self.extractor.extract(&ctx.archive_path, &ctx.extract_dir)?;
        reporter.progress(EXTRACT_RANGE.end);
        reporter.log(&format!("Extracted using {}", strategy));

        let executable = &self.settings.executable;
        let payload = find_payload_dir(&ctx.extract_dir, executable).ok_or_else(|| {
            ManagerError::LayoutInvalid {
                path: ctx.extract_dir.clone(),
                reason: format!("no directory containing bin/{} in the archive", executable),
            }
        })?;
        reporter.log(&format!("Found FFmpeg at {}", payload.display()));

        ctx.stage = InstallStage::Installing;
        reporter.enter(ctx.stage, "Installing FFmpeg...");
        let (layout, registration) =
            self.installer
                .install_and_register(&payload, &ctx.install_root, ctx.request.scope)?;
        reporter.log(&format!("Installed to {}", layout.payload_dir.display()));
        match &registration {
            PathRegistration::AlreadyPresent => reporter.log(&format!(
                "{} is already on the search path",
                layout.bin_dir.display()
            )),
            PathRegistration::Added { .. } => reporter.log(&format!(
                "Added {} to the {} search path ({})",
                layout.bin_dir.display(),
                ctx.request.scope,
                self.installer.store().location(ctx.request.scope)
            )),
        }

        ctx.stage = InstallStage::Testing;
        reporter.enter(ctx.stage, "Testing installation...");
        let smoke = run_smoke_test(
            &layout.executable(executable),
            &self.settings.version_flag,
            &self.settings.version_header,
        );
        match &smoke {
            SmokeTest::Passed { version } => {
                reporter.log(&format!("FFmpeg {} installed successfully", version))
            }
            SmokeTest::Failed { reason } => {
                reporter.warn(&format!("Installation test failed: {}", reason))
            }
        }

        ctx.stage = InstallStage::Done;
        reporter.enter(ctx.stage, "Installation complete");
        reporter.log("Restart your terminal to pick up the updated search path.");

        Ok(InstallReport {
            build: ctx.request.build.clone(),
            scope: ctx.request.scope,
            layout,
            registration,
            smoke,
            reused_download: ctx.reused_download,
            extraction_strategy: strategy,
        })
    }

    /// Use an archive left by an earlier run if it still verifies.
    ///
    /// A stale archive is deleted so the caller downloads afresh.
    fn reuse_download(&self, ctx: &mut RunContext, reporter: &Reporter) -> ManagerResult<bool> {
        if !ctx.archive_path.is_file() {
            return Ok(false);
        }

        reporter.log("Found existing download, verifying...");
        let result = verify_checksum(&ctx.archive_path, ctx.expected_digest())?;
        if result.verified {
            reporter.log("Using existing download");
            ctx.verification = Some(result);
            ctx.reused_download = true;
            return Ok(true);
        }

        reporter.warn("Existing download failed verification, downloading again");
        remove_file(&ctx.archive_path)?;
        Ok(false)
    }

    fn download(&self, ctx: &mut RunContext, reporter: &Reporter) -> ManagerResult<()> {
        let partial = partial_path(&ctx.archive_path);
        let url = ctx.request.build.download_url.clone();

        let fetched = self.fetcher.fetch(
            &url,
            &partial,
            DOWNLOAD_RANGE,
            &|update: FetchProgress| reporter.fetch_progress(update),
        );
        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                if partial.exists() {
                    if let Err(remove) = fs::remove_file(&partial) {
                        debug!(path = %partial.display(), error = %remove, "Partial download left behind");
                    }
                }
                return Err(e);
            }
        };

        fs::rename(&partial, &ctx.archive_path).map_err(|e| ManagerError::WriteFailed {
            path: ctx.archive_path.clone(),
            source: e,
        })?;
        ctx.verification = None;

        reporter.progress(DOWNLOAD_RANGE.end);
        reporter.log(&format!(
            "Downloaded {:.1} MB",
            bytes as f64 / 1024.0 / 1024.0
        ));
        Ok(())
    }

    fn verify(&self, ctx: &mut RunContext, reporter: &Reporter) -> ManagerResult<()> {
        if ctx.is_verified() {
            if ctx.verification.as_ref().is_some_and(|v| v.skipped()) {
                reporter.warn("No published checksum available, skipping verification");
            } else {
                reporter.log("Download already verified");
            }
            return Ok(());
        }

        let result = verify_checksum(&ctx.archive_path, ctx.expected_digest())?;
        if result.skipped() {
            reporter.warn("No published checksum available, skipping verification");
        } else if result.verified {
            reporter.log("Checksum verified");
        } else {
            let err = mismatch_error(&ctx.archive_path, &result);
            if let Err(e) = fs::remove_file(&ctx.archive_path) {
                warn!(path = %ctx.archive_path.display(), error = %e, "Failed to delete corrupt archive");
            }
            ctx.verification = Some(result);
            return Err(err);
        }

        ctx.verification = Some(result);
        Ok(())
    }

    /// Remove the extraction workspace, archive-tool files and partial
    /// downloads from the scratch area. Completed archives are kept.
    ///
    /// Returns the removed paths.
    pub fn cleanup_scratch(&self) -> ManagerResult<Vec<PathBuf>> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            return Err(ManagerError::AlreadyRunning);
        };

        let scratch = &self.settings.scratch_dir;
        let mut targets = vec![
            self.settings.extract_dir(),
            scratch.join(TOOL_DIR_NAME),
            scratch.join(TOOL_PACKAGE_NAME),
        ];
        if let Ok(entries) = fs::read_dir(scratch) {
            targets.extend(
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| {
                        path.to_string_lossy().ends_with(PARTIAL_SUFFIX) && path.is_file()
                    }),
            );
        }

        let mut removed = Vec::new();
        for target in targets {
            if target.is_dir() {
                fs::remove_dir_all(&target).map_err(|e| ManagerError::RemoveFailed {
                    path: target.clone(),
                    source: e,
                })?;
            } else if target.exists() {
                remove_file(&target)?;
            } else {
                continue;
            }
            info!(path = %target.display(), "Removed scratch entry");
            removed.push(target);
        }
        Ok(removed)
    }
}

fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn remove_file(path: &Path) -> ManagerResult<()> {
    fs::remove_file(path).map_err(|e| ManagerError::RemoveFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Refuse install roots whose wholesale removal would be destructive.
fn guard_install_root(root: &Path) -> ManagerResult<()> {
    let is_home = dirs::home_dir().is_some_and(|home| home == root);
    if root.parent().is_none() || root.as_os_str().is_empty() || is_home {
        return Err(ManagerError::LayoutInvalid {
            path: root.to_path_buf(),
            reason: "install root must be a dedicated directory".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuildKind;
    use crate::manager::ProfilePathStore;
    use crate::pipeline::ChannelSink;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn pipeline(temp: &TempDir) -> InstallPipeline {
        let settings = PipelineSettings::new(
            temp.path().join("scratch"),
            temp.path().join("user-root"),
            temp.path().join("system-root"),
        );
        let store = Arc::new(ProfilePathStore::new(
            temp.path().join("env/user.sh"),
            temp.path().join("env/system.sh"),
        ));
        InstallPipeline::new(
            settings,
            Arc::new(HttpDownloader::new().unwrap()),
            ArchiveExtractor::new(Vec::new()),
            store,
        )
    }

    #[test]
    fn test_run_is_rejected_while_busy() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);
        let (tx, rx) = mpsc::channel();

        let _held = RunGuard::acquire(&pipeline.running).unwrap();
        let outcome = pipeline.run(
            InstallRequest::new(BuildKind::Full.spec(), InstallScope::User),
            &ChannelSink::new(tx),
        );

        match outcome {
            PipelineOutcome::Failed { stage, error } => {
                assert_eq!(stage, InstallStage::Pending);
                assert!(matches!(error, ManagerError::AlreadyRunning));
            }
            other => panic!("Expected busy failure, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
        assert!(pipeline.cleanup_scratch().is_err());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = RunGuard::acquire(&flag).unwrap();
            assert!(RunGuard::acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(RunGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_cleanup_scratch_keeps_archive() {
        let temp = TempDir::new().unwrap();
        let pipeline = pipeline(&temp);
        let scratch = temp.path().join("scratch");
        fs::create_dir_all(scratch.join("ffmpeg-extract/ffmpeg-7.1/bin")).unwrap();
        fs::create_dir_all(scratch.join(TOOL_DIR_NAME)).unwrap();
        fs::write(scratch.join(TOOL_PACKAGE_NAME), b"zip").unwrap();
        fs::write(scratch.join("ffmpeg-release-full.7z"), b"archive").unwrap();
        fs::write(scratch.join("ffmpeg-release-shared.7z.part"), b"half").unwrap();

        let removed = pipeline.cleanup_scratch().unwrap();

        assert_eq!(removed.len(), 4);
        assert!(scratch.join("ffmpeg-release-full.7z").is_file());
        assert!(!scratch.join("ffmpeg-extract").exists());
        assert!(!scratch.join(TOOL_DIR_NAME).exists());
        assert!(!scratch.join(TOOL_PACKAGE_NAME).exists());
        assert!(!scratch.join("ffmpeg-release-shared.7z.part").exists());

        // Nothing left to remove the second time
        assert!(pipeline.cleanup_scratch().unwrap().is_empty());
    }

    #[test]
    fn test_guard_install_root() {
        assert!(guard_install_root(Path::new("/")).is_err());
        assert!(guard_install_root(Path::new("")).is_err());
        assert!(guard_install_root(Path::new("/opt/ffmpeg")).is_ok());
        if let Some(home) = dirs::home_dir() {
            assert!(guard_install_root(&home).is_err());
        }
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/ffmpeg-release-full.7z")),
            PathBuf::from("/tmp/ffmpeg-release-full.7z.part")
        );
    }
}
