//! Post-install smoke test of the installed executable.

use std::path::Path;
use std::process::{Command, Stdio};

/// Outcome of running the installed executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeTest {
    /// The executable printed the expected header.
    Passed { version: String },
    /// It could not be run, exited non-zero, or printed something else.
    Failed { reason: String },
}

impl SmokeTest {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed { .. })
    }
}

/// Run `executable <flag>` and check the first line of its output.
pub fn run_smoke_test(executable: &Path, flag: &str, header: &str) -> SmokeTest {
    let output = match Command::new(executable)
        .arg(flag)
        .stdin(Stdio::null())
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            return SmokeTest::Failed {
                reason: format!("could not run {}: {}", executable.display(), e),
            }
        }
    };

    if !output.status.success() {
        return SmokeTest::Failed {
            reason: format!("{} exited with {}", executable.display(), output.status),
        };
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("").trim();
    match parse_version_line(first_line, header) {
        Some(version) => SmokeTest::Passed { version },
        None => SmokeTest::Failed {
            reason: format!("unexpected version output: '{}'", first_line),
        },
    }
}

/// Version from a `<header> <version> ...` line.
///
/// The version is the space-delimited token right after the header words;
/// a header with no token after it yields `"unknown"`.
pub fn parse_version_line(line: &str, header: &str) -> Option<String> {
    let rest = line.strip_prefix(header)?;
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(
        rest.split_whitespace()
            .next()
            .unwrap_or("unknown")
            .to_string(),
    )
}
