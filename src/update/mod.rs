//! Update module
//!
//! This module provides functionality for:
//! - Resolving the latest release from a manifest or a release feed
//! - Streaming package downloads with SHA-256 verification
//! - Staging and launching the external swap helper

pub mod launcher;
pub mod manager;
pub mod model;
pub mod source;
pub mod stager;


pub use launcher::StagedHelper;
pub use manager::{Handoff, UpdateManager};
pub use model::{
    Artifact, Asset, Manifest, ProgressCallback, ReleaseFeed, UpdateInfo, UpdatePhase,
    UpdateProgress,
};
pub use source::{ManifestSource, ReleaseFeedSource, UpdateSource};
pub use stager::{calculate_checksum, PackageStager};
