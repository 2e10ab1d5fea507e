//! Host-shell extraction strategy.
//!
//! The host shell's archive handling runs in the background. When it runs as
//! a process of its own (the system `tar`), its exit status marks completion.
//! The Windows shell copy gives no completion signal at all, so success is
//! inferred by polling the destination until anything appears in it.

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::is_populated;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::ExtractStrategy;

/// Default interval between destination checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default time to wait for the extraction to finish.
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(60);

/// A shell extraction that has been started.
#[derive(Debug)]
pub enum ShellJob {
    /// A process whose exit marks completion.
    Process(Child),
    /// Work with no completion signal; output in the destination is success.
    Detached,
}

/// Starts an asynchronous shell copy of an archive's contents.
pub trait ShellHandoff: Send + Sync {
    /// Kick off extraction of `archive` into `dest` and return immediately.
    fn start(&self, archive: &Path, dest: &Path) -> ManagerResult<ShellJob>;
}

/// The operating system's own archive handling.
///
/// On Windows this is the `Shell.Application` namespace copy, driven through
/// PowerShell. Elsewhere the system `tar` is used.
#[derive(Debug, Default)]
pub struct HostShell;

impl HostShell {
    pub fn new() -> Self {
        Self
    }

    #[cfg(windows)]
    fn command(archive: &Path, dest: &Path) -> Command {
        // 0x14: no progress dialog, answer yes to all prompts
        let script = format!(
            "$shell = New-Object -ComObject Shell.Application; \
             $shell.NameSpace('{}').CopyHere($shell.NameSpace('{}').Items(), 0x14)",
            powershell_quote(dest),
            powershell_quote(archive)
        );
        let mut command = Command::new("powershell");
        command.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
        command
    }

    #[cfg(not(windows))]
    fn command(archive: &Path, dest: &Path) -> Command {
        let mut command = Command::new("tar");
        command.arg("-xf").arg(archive).arg("-C").arg(dest);
        command
    }
}

#[cfg(windows)]
fn powershell_quote(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}

impl ShellHandoff for HostShell {
    fn start(&self, archive: &Path, dest: &Path) -> ManagerResult<ShellJob> {
        let child = Self::command(archive, dest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: format!("failed to start shell extraction: {}", e),
            })?;

        if cfg!(windows) {
            // CopyHere returns before the copy is done; reap PowerShell
            // whenever it exits and watch the destination instead.
            let mut child = child;
            thread::spawn(move || match child.wait() {
                Ok(status) => debug!(%status, "Shell copy process exited"),
                Err(e) => warn!(error = %e, "Failed to wait for shell copy process"),
            });
            Ok(ShellJob::Detached)
        } else {
            Ok(ShellJob::Process(child))
        }
    }
}

/// Extraction delegated to a [`ShellHandoff`], confirmed by polling.
pub struct ShellNamespaceStrategy {
    handoff: Box<dyn ShellHandoff>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ShellNamespaceStrategy {
    /// Strategy using the host shell with the default 1s/60s polling.
    pub fn new() -> Self {
        Self::with_handoff(Box::new(HostShell::new()))
    }

    pub fn with_handoff(handoff: Box<dyn ShellHandoff>) -> Self {
        Self {
            handoff,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_SHELL_TIMEOUT,
        }
    }

    /// Set the total time to wait for the extraction.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the interval between checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for ShellNamespaceStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractStrategy for ShellNamespaceStrategy {
    fn name(&self) -> &'static str {
        "host shell"
    }

    fn try_extract(&self, archive: &Path, dest: &Path) -> ManagerResult<()> {
        let mut job = self.handoff.start(archive, dest)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            thread::sleep(self.poll_interval.min(deadline.saturating_duration_since(Instant::now())));

            let finished = match &mut job {
                ShellJob::Process(child) => process_finished(child, archive, dest)?,
                ShellJob::Detached => is_populated(dest),
            };
            if finished {
                debug!(dest = %dest.display(), "Shell extraction finished");
                return Ok(());
            }

            if Instant::now() >= deadline {
                // The destination is reset for the next strategy, so nothing
                // may keep writing into it.
                if let ShellJob::Process(child) = &mut job {
                    stop(child);
                }
                return Err(ManagerError::ExtractionFailed {
                    path: archive.to_path_buf(),
                    reason: format!(
                        "host shell extraction did not finish within {}s",
                        self.timeout.as_secs()
                    ),
                });
            }
        }
    }
}

/// Whether the extraction process exited successfully with output.
///
/// `Ok(false)` while it is still running.
fn process_finished(child: &mut Child, archive: &Path, dest: &Path) -> ManagerResult<bool> {
    let failed = |reason: String| ManagerError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason,
    };

    let status = match child.try_wait() {
        Ok(Some(status)) => status,
        Ok(None) => return Ok(false),
        Err(e) => {
            stop(child);
            return Err(failed(format!(
                "failed to wait for shell extraction: {}",
                e
            )));
        }
    };

    if !status.success() {
        return Err(failed(match status.code() {
            Some(code) => format!("host shell extraction exited with code {}", code),
            None => "host shell extraction terminated by signal".to_string(),
        }));
    }
    if !is_populated(dest) {
        return Err(failed(
            "host shell extraction finished without output".to_string(),
        ));
    }
    Ok(true)
}

/// Kill the extraction process and reap it.
fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "Shell extraction process already exited");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "Failed to reap shell extraction process");
    }
}
