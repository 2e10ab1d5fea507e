//! Pipeline settings and the per-run context.

use std::path::{Path, PathBuf};

use crate::catalog::BuildSpec;
use crate::config::ConfigFile;
use crate::manager::{InstallScope, VerificationResult};

use super::stage::InstallStage;

/// Name of the executable the payload must contain, without suffix.
pub const EXECUTABLE_STEM: &str = "ffmpeg";

/// Argument that makes the executable print its version.
pub const VERSION_FLAG: &str = "-version";

/// First token(s) of the executable's version output.
pub const VERSION_HEADER: &str = "ffmpeg version";

/// Extraction workspace inside the scratch area.
pub const EXTRACT_DIR_NAME: &str = "ffmpeg-extract";

/// Fixed locations and names used by every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Downloads, extraction workspace and archive tool.
    pub scratch_dir: PathBuf,
    pub user_root: PathBuf,
    pub system_root: PathBuf,
    /// Executable file name, with platform suffix.
    pub executable: String,
    pub version_flag: String,
    pub version_header: String,
    pub extract_dir_name: String,
}

impl PipelineSettings {
    pub fn new(scratch_dir: PathBuf, user_root: PathBuf, system_root: PathBuf) -> Self {
        Self {
            scratch_dir,
            user_root,
            system_root,
            executable: format!("{}{}", EXECUTABLE_STEM, std::env::consts::EXE_SUFFIX),
            version_flag: VERSION_FLAG.to_string(),
            version_header: VERSION_HEADER.to_string(),
            extract_dir_name: EXTRACT_DIR_NAME.to_string(),
        }
    }

    /// Settings derived from the configuration file.
    pub fn from_config(config: &ConfigFile) -> Self {
        Self::new(
            config.download.scratch_dir.clone(),
            config.install.root_for(InstallScope::User),
            config.install.root_for(InstallScope::System),
        )
    }

    /// Validate against a different executable name.
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Install root for `scope`.
    pub fn install_root(&self, scope: InstallScope) -> &Path {
        match scope {
            InstallScope::User => &self.user_root,
            InstallScope::System => &self.system_root,
        }
    }

    /// Where the archive of `build` is stored.
    pub fn archive_path(&self, build: &BuildSpec) -> PathBuf {
        self.scratch_dir.join(&build.file_name)
    }

    /// Extraction workspace.
    pub fn extract_dir(&self) -> PathBuf {
        self.scratch_dir.join(&self.extract_dir_name)
    }
}

/// What the user chose before the run.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub build: BuildSpec,
    /// Published digest; `None` skips verification.
    pub expected_digest: Option<String>,
    pub scope: InstallScope,
}

impl InstallRequest {
    pub fn new(build: BuildSpec, scope: InstallScope) -> Self {
        Self {
            build,
            expected_digest: None,
            scope,
        }
    }

    pub fn with_expected_digest(mut self, digest: Option<String>) -> Self {
        self.expected_digest = digest;
        self
    }
}

/// State of one run, created fresh for every invocation.
#[derive(Debug)]
pub struct RunContext {
    pub request: InstallRequest,
    /// Stage currently executing.
    pub stage: InstallStage,
    pub archive_path: PathBuf,
    pub extract_dir: PathBuf,
    pub install_root: PathBuf,
    /// Result of the last digest check of the archive.
    pub verification: Option<VerificationResult>,
    /// The archive came from an earlier run.
    pub reused_download: bool,
}

impl RunContext {
    pub fn new(request: InstallRequest, settings: &PipelineSettings) -> Self {
        Self {
            archive_path: settings.archive_path(&request.build),
            extract_dir: settings.extract_dir(),
            install_root: settings.install_root(request.scope).to_path_buf(),
            request,
            stage: InstallStage::Pending,
            verification: None,
            reused_download: false,
        }
    }

    /// Expected digest, empty when unknown.
    pub fn expected_digest(&self) -> &str {
        self.request.expected_digest.as_deref().unwrap_or("")
    }

    /// Whether the current archive already passed verification.
    pub fn is_verified(&self) -> bool {
        self.verification.as_ref().is_some_and(|v| v.verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuildKind;

    fn settings() -> PipelineSettings {
        PipelineSettings::new(
            PathBuf::from("/tmp/ffinstall"),
            PathBuf::from("/home/me/.local/share/ffmpeg"),
            PathBuf::from("/opt/ffmpeg"),
        )
    }

    #[test]
    fn test_settings_paths() {
        let settings = settings();
        let build = BuildKind::Essentials.spec();

        assert_eq!(
            settings.archive_path(&build),
            PathBuf::from("/tmp/ffinstall/ffmpeg-release-essentials.7z")
        );
        assert_eq!(
            settings.extract_dir(),
            PathBuf::from("/tmp/ffinstall/ffmpeg-extract")
        );
        assert_eq!(
            settings.install_root(InstallScope::System),
            Path::new("/opt/ffmpeg")
        );
        assert!(settings.executable.starts_with("ffmpeg"));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = ConfigFile::default();
        config.download.scratch_dir = PathBuf::from("/var/tmp/ff");
        config.install.user_root = Some(PathBuf::from("/home/me/tools/ffmpeg"));

        let settings = PipelineSettings::from_config(&config);

        assert_eq!(settings.scratch_dir, PathBuf::from("/var/tmp/ff"));
        assert_eq!(settings.user_root, PathBuf::from("/home/me/tools/ffmpeg"));
    }

    #[test]
    fn test_run_context_starts_unverified() {
        let request = InstallRequest::new(BuildKind::Full.spec(), InstallScope::User)
            .with_expected_digest(Some("abc123".to_string()));
        let ctx = RunContext::new(request, &settings());

        assert_eq!(ctx.stage, InstallStage::Pending);
        assert_eq!(ctx.expected_digest(), "abc123");
        assert!(!ctx.is_verified());
        assert_eq!(
            ctx.install_root,
            PathBuf::from("/home/me/.local/share/ffmpeg")
        );
    }
}
