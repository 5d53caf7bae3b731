//! Update sources
//!
//! A source answers one question: given the running version and platform, is
//! there a newer package, and where is it? Two flavours exist:
//!
//! - [`ManifestSource`]: a JSON manifest listing one artifact per platform
//! - [`ReleaseFeedSource`]: a GitHub-style "latest release" endpoint
//!
//! Both read documents over `http(s)://` or from `file://` locations.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use semver::Version;
use url::Url;

use super::model::{Asset, Manifest, ReleaseFeed, UpdateInfo};
use crate::core::error::{Result, UpdateError};

/// Accept header for GitHub's REST API
const GITHUB_JSON: &str = "application/vnd.github+json";

/// Resolves the latest available release
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Returns the newer release for `platform_id`, or `None` when the
    /// installation is current or nothing is published for the platform.
    async fn get_latest(&self, current: &Version, platform_id: &str)
        -> Result<Option<UpdateInfo>>;

    /// Short label for logs
    fn name(&self) -> &'static str;
}

/// Fetch a text document. `Ok(None)` means the server answered with a
/// non-success status.
pub(crate) async fn fetch_document(
    client: &reqwest::Client,
    location: &Url,
    accept: Option<&str>,
) -> Result<Option<String>> {
    if location.scheme() == "file" {
        let path = location
            .to_file_path()
            .map_err(|_| UpdateError::SourceUnreachable {
                reason: format!("not a local path: {}", location),
            })?;
        return tokio::fs::read_to_string(&path)
            .await
            .map(Some)
            .map_err(|e| UpdateError::SourceUnreachable {
                reason: format!("{}: {}", path.display(), e),
            });
    }

    let mut request = client.get(location.clone());
    if let Some(accept) = accept {
        request = request.header(ACCEPT, accept);
    }

    let response = request
        .send()
        .await
        .map_err(|e| UpdateError::SourceUnreachable {
            reason: e.to_string(),
        })?;

    if !response.status().is_success() {
        tracing::debug!(url = %location, status = %response.status(), "Update source returned non-success status");
        return Ok(None);
    }

    response
        .text()
        .await
        .map(Some)
        .map_err(|e| UpdateError::SourceUnreachable {
            reason: e.to_string(),
        })
}

/// Source backed by a JSON manifest
pub struct ManifestSource {
    location: Url,
    client: reqwest::Client,
}

impl ManifestSource {
    pub fn new(location: Url, client: reqwest::Client) -> Self {
        Self { location, client }
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    fn parse(&self, body: &str) -> Result<(Manifest, Version)> {
        let manifest: Manifest =
            serde_json::from_str(body).map_err(|e| UpdateError::InvalidManifest {
                reason: e.to_string(),
            })?;
        let version = Version::parse(manifest.version.trim()).map_err(|e| {
            UpdateError::InvalidManifest {
                reason: format!("version {:?}: {}", manifest.version, e),
            }
        })?;
        Ok((manifest, version))
    }
}

#[async_trait]
impl UpdateSource for ManifestSource {
    async fn get_latest(
        &self,
        current: &Version,
        platform_id: &str,
    ) -> Result<Option<UpdateInfo>> {
        let Some(body) = fetch_document(&self.client, &self.location, None).await? else {
            return Ok(None);
        };
        let (mut manifest, version) = self.parse(&body)?;

        if version <= *current {
            tracing::debug!(latest = %version, current = %current, "Manifest has no newer version");
            return Ok(None);
        }

        let Some(artifact) = manifest.artifacts.remove(platform_id) else {
            tracing::info!(latest = %version, platform = platform_id, "No artifact published for platform");
            return Ok(None);
        };

        let package_location =
            self.location
                .join(&artifact.url)
                .map_err(|e| UpdateError::InvalidManifest {
                    reason: format!("artifact url {:?}: {}", artifact.url, e),
                })?;

        Ok(Some(UpdateInfo {
            version,
            package_location,
            content_hash: artifact.content_hash,
            notes: manifest.notes,
        }))
    }

    fn name(&self) -> &'static str {
        "manifest"
    }
}

/// Source backed by a GitHub-style "latest release" endpoint
pub struct ReleaseFeedSource {
    endpoint: Url,
    asset_prefix: String,
    extension: String,
    client: reqwest::Client,
}

impl ReleaseFeedSource {
    /// `asset_prefix` and `extension` name packages as
    /// `{prefix}-{platform_id}{extension}`, e.g. `App-linux-x64.zip`.
    pub fn new(
        endpoint: Url,
        asset_prefix: impl Into<String>,
        extension: impl Into<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint,
            asset_prefix: asset_prefix.into(),
            extension: extension.into(),
            client,
        }
    }

    /// Pick the package for a platform: the exact conventional name first,
    /// then any asset mentioning the platform with the right extension.
    pub fn select_asset<'a>(&self, assets: &'a [Asset], platform_id: &str) -> Option<&'a Asset> {
        let exact = format!("{}-{}{}", self.asset_prefix, platform_id, self.extension);
        assets.iter().find(|a| a.name == exact).or_else(|| {
            assets
                .iter()
                .find(|a| a.name.contains(platform_id) && a.name.ends_with(&self.extension))
        })
    }
}

/// Parse a release tag, tolerating one leading `v` or `V`
pub fn parse_tag(tag: &str) -> Result<Version> {
    let trimmed = tag.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    Version::parse(bare).map_err(|e| UpdateError::InvalidManifest {
        reason: format!("release tag {:?}: {}", tag, e),
    })
}

/// Extract the hex hash from a `sha256:<64 hex>` digest
pub fn parse_digest(asset: &Asset) -> Result<String> {
    let missing = || UpdateError::MissingChecksum {
        asset: asset.name.clone(),
    };
    let digest = asset.digest.as_deref().ok_or_else(missing)?.trim();
    let (algorithm, hex) = digest.split_once(':').ok_or_else(missing)?;

    if !algorithm.eq_ignore_ascii_case("sha256")
        || hex.len() != 64
        || !hex.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(missing());
    }
    Ok(hex.to_ascii_lowercase())
}

#[async_trait]
impl UpdateSource for ReleaseFeedSource {
    async fn get_latest(
        &self,
        current: &Version,
        platform_id: &str,
    ) -> Result<Option<UpdateInfo>> {
        let Some(body) = fetch_document(&self.client, &self.endpoint, Some(GITHUB_JSON)).await?
        else {
            return Ok(None);
        };
        // Rate-limit and proxy pages can arrive with a 200 status
        let release: ReleaseFeed =
            serde_json::from_str(&body).map_err(|e| UpdateError::SourceUnreachable {
                reason: format!("release feed body: {}", e),
            })?;
        let version = parse_tag(&release.tag)?;

        if version <= *current {
            tracing::debug!(latest = %version, current = %current, "Release feed has no newer version");
            return Ok(None);
        }

        let Some(asset) = self.select_asset(&release.assets, platform_id) else {
            tracing::info!(latest = %version, platform = platform_id, "No release asset for platform");
            return Ok(None);
        };

        let content_hash = parse_digest(asset)?;
        let package_location =
            Url::parse(&asset.download_url).map_err(|e| UpdateError::InvalidManifest {
                reason: format!("asset url {:?}: {}", asset.download_url, e),
            })?;

        Ok(Some(UpdateInfo {
            version,
            package_location,
            content_hash,
            notes: release.notes,
        }))
    }

    fn name(&self) -> &'static str {
        "release_feed"
    }
}
