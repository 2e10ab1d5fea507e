//! CLI command implementations.

pub mod builds;
pub mod clean;
pub mod common;
pub mod config;
pub mod install;
pub mod update;
pub mod version;
