//! Self-update subsystem
//!
//! This crate provides:
//! - Release checks against a JSON manifest or a GitHub-style release feed
//! - Streaming package downloads with SHA-256 verification
//! - Hand-off to an external helper that swaps the installation directory
//! - The helper itself (`updater` binary), with crash-safe swap recovery

pub mod config;
pub mod core;
pub mod helper;
pub mod logging;
pub mod update;

// Re-export commonly used items
pub use config::{ConfigStore, SourceConfig, UpdateConfig};
pub use core::error::{Result, UpdateError};
pub use core::options::{HelperExecutable, UpdateOptions};
pub use helper::HelperArgs;
pub use update::{
    ManifestSource, ReleaseFeedSource, UpdateInfo, UpdateManager, UpdateProgress, UpdateSource,
};
