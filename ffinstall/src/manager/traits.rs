//! Core interfaces for the install manager.
//!
//! These traits are the seams between pipeline stages and the outside world
//! (network, archive tools, host environment store), allowing each stage to be
//! exercised in isolation with test doubles.

use std::path::Path;

use super::download::{FetchProgress, ProgressRange};
use super::error::ManagerResult;
use super::path_env::InstallScope;

/// Retrieves remote resources.
pub trait Fetcher: Send + Sync {
    /// Stream `url` into `dest`, reporting progress scaled into `range`.
    ///
    /// Returns the number of bytes written.
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        range: ProgressRange,
        on_progress: &dyn Fn(FetchProgress),
    ) -> ManagerResult<u64>;

    /// Fetch a small plain-text resource (version feed, digest manifest).
    fn fetch_text(&self, url: &str) -> ManagerResult<String>;
}

/// One interchangeable way of unpacking an archive.
pub trait ExtractStrategy: Send + Sync {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Extract `archive` into the (empty) directory `dest`.
    ///
    /// An error means this strategy could not handle the archive; the caller
    /// moves on to the next strategy.
    fn try_extract(&self, archive: &Path, dest: &Path) -> ManagerResult<()>;
}

/// Persistent store of the executable search path.
pub trait PathStore: Send + Sync {
    /// Read the current search-path value for `scope` (empty if unset).
    fn read(&self, scope: InstallScope) -> ManagerResult<String>;

    /// Persist a new search-path value for `scope`.
    fn write(&self, scope: InstallScope, value: &str) -> ManagerResult<()>;

    /// Entry separator used by this store.
    fn separator(&self) -> char;

    /// Human-readable location of the value, for messages.
    fn location(&self, scope: InstallScope) -> String;

    /// Tell running processes that the environment changed.
    fn broadcast_change(&self) -> ManagerResult<()>;
}
