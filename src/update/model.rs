//! Data model for update checks and downloads
//!
//! Wire documents (manifest, release feed) deserialize into the types here and
//! are reduced to a single [`UpdateInfo`] by the sources.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use url::Url;

/// A newer release that can be applied.
///
/// Produced fresh by every check, consumed once by `apply_and_restart`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    /// Version of the release
    pub version: Version,
    /// Where the package archive lives (http(s) or file)
    pub package_location: Url,
    /// Lowercase or uppercase hex SHA-256 of the package
    pub content_hash: String,
    /// Release notes, if the source carries any
    pub notes: Option<String>,
}

/// Manifest document served by a manifest source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Latest version, as a semantic version string
    pub version: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Platform id -> downloadable artifact
    #[serde(default)]
    pub artifacts: BTreeMap<String, Artifact>,
}

/// One per-platform package in a manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Package URL, relative to the manifest or absolute
    pub url: String,
    /// Hex SHA-256 of the package
    #[serde(rename = "sha256")]
    pub content_hash: String,
}

/// "Latest release" record of a GitHub-style release feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseFeed {
    #[serde(rename = "tag_name")]
    pub tag: String,
    #[serde(rename = "body", default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A file attached to a release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
    /// "sha256:<hex>" when the feed publishes one
    #[serde(default)]
    pub digest: Option<String>,
}

/// Phase of an update operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdatePhase {
    Checking,
    Downloading,
    Verifying,
    StagingHelper,
    HandingOff,
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdatePhase::Checking => write!(f, "checking"),
            UpdatePhase::Downloading => write!(f, "downloading"),
            UpdatePhase::Verifying => write!(f, "verifying"),
            UpdatePhase::StagingHelper => write!(f, "staging_helper"),
            UpdatePhase::HandingOff => write!(f, "handing_off"),
        }
    }
}

/// Progress of an update operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProgress {
    pub phase: UpdatePhase,
    /// Bytes downloaded so far
    pub downloaded: u64,
    /// Total bytes, when the server reported a length
    pub total: Option<u64>,
    /// Download percentage (0-100)
    pub percentage: u8,
}

impl UpdateProgress {
    /// Progress marker for a phase with no byte count
    pub fn phase(phase: UpdatePhase) -> Self {
        Self {
            phase,
            downloaded: 0,
            total: None,
            percentage: 0,
        }
    }

    /// Download progress
    pub fn downloading(downloaded: u64, total: Option<u64>) -> Self {
        Self {
            phase: UpdatePhase::Downloading,
            downloaded,
            total,
            percentage: total
                .map(|t| Self::calculate_percentage(downloaded, t))
                .unwrap_or(0),
        }
    }

    /// Calculate percentage from downloaded and total
    pub fn calculate_percentage(downloaded: u64, total: u64) -> u8 {
        if total == 0 {
            return 0;
        }
        ((downloaded as f64 / total as f64) * 100.0).min(100.0) as u8
    }
}

/// Progress callback type
pub type ProgressCallback = Arc<dyn Fn(UpdateProgress) + Send + Sync>;
