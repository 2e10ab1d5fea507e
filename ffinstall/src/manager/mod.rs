//! Install manager components.
//!
//! Each stage of the install pipeline is implemented here as a standalone
//! component that can be exercised on its own:
//!
//! - `checksum`: SHA-256 digests and verification
//! - `download`: streaming HTTP downloads with throughput reporting
//! - `extractor`: ordered chain of extraction strategies
//! - `locator`: search of an extracted tree for the payload directory
//! - `installer`: copy into the install root and search-path registration
//! - `path_env`: persistent search-path stores per install scope
//! - `traits`: the seams between stages and the outside world

pub mod checksum;
pub mod download;
pub mod error;
pub mod extractor;
pub mod installer;
pub mod locator;
pub mod path_env;
pub mod traits;

pub use checksum::{calculate_file_checksum, verify_checksum, VerificationResult};
pub use download::{Fetcher, FetchProgress, HttpDownloader, ProgressRange};
pub use error::{ErrorKind, ManagerError, ManagerResult};
pub use extractor::{ArchiveExtractor, ExtractStrategy};
pub use installer::{copy_dir_recursive, InstallLayout, Installer};
pub use locator::find_payload_dir;
pub use path_env::{
    default_store, has_privilege, register_path, InstallScope, PathRegistration, PathStore,
    ProfilePathStore,
};
