//! Package stager
//!
//! Downloads a package to a uniquely named temporary file and verifies its
//! SHA-256 before anything else is allowed to look at it.

use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::model::{ProgressCallback, UpdateProgress};
use crate::core::error::{Result, UpdateError};
use crate::core::utils::generate_uuid;

/// Read buffer for hashing
const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Read buffer for local (`file://`) packages
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Minimum interval between progress reports
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// First chunk always reports; later ones at most every [`PROGRESS_INTERVAL`].
fn progress_due(last_report: &mut Option<Instant>) -> bool {
    match *last_report {
        Some(at) if at.elapsed() < PROGRESS_INTERVAL => false,
        _ => {
            *last_report = Some(Instant::now());
            true
        }
    }
}

/// Downloads and verifies update packages
pub struct PackageStager {
    client: reqwest::Client,
    temp_root: PathBuf,
    progress_callback: Option<ProgressCallback>,
}

impl PackageStager {
    pub fn new(client: reqwest::Client, temp_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            temp_root: temp_root.into(),
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn report_progress(&self, progress: UpdateProgress) {
        if let Some(callback) = &self.progress_callback {
            callback(progress);
        }
    }

    /// Fresh download target, `<temp_root>/update-<uuid>.<ext>`
    fn download_path(&self, location: &Url) -> PathBuf {
        let ext = Path::new(location.path())
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .unwrap_or("zip");
        self.temp_root
            .join(format!("update-{}.{}", generate_uuid().simple(), ext))
    }

    /// Download `location` to a new temp file and return its path.
    ///
    /// The partial file is removed on any failure, including cancellation.
    pub async fn download(&self, location: &Url, cancel: &CancellationToken) -> Result<PathBuf> {
        if cancel.is_cancelled() {
            return Err(UpdateError::Cancelled);
        }

        tokio::fs::create_dir_all(&self.temp_root).await?;
        let target = self.download_path(location);
        tracing::info!(url = %location, target = %target.display(), "Downloading update package");

        let result = if location.scheme() == "file" {
            self.copy_local(location, &target, cancel).await
        } else {
            self.download_http(location, &target, cancel).await
        };

        match result {
            Ok(bytes) => {
                tracing::info!(
                    size = %crate::core::utils::format_file_size(bytes),
                    "Package downloaded"
                );
                Ok(target)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&target).await;
                Err(e)
            }
        }
    }

    async fn copy_local(
        &self,
        location: &Url,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let source = location
            .to_file_path()
            .map_err(|_| UpdateError::DownloadFailed {
                reason: format!("not a local path: {}", location),
            })?;
        let unreadable = |e: std::io::Error| UpdateError::DownloadFailed {
            reason: format!("{}: {}", source.display(), e),
        };

        let mut input = File::open(&source).await.map_err(unreadable)?;
        let total = input.metadata().await.map_err(unreadable)?.len();
        let mut output = File::create(target).await?;
        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
        let mut copied: u64 = 0;
        let mut last_report = None;

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
                read = input.read(&mut buffer) => read.map_err(unreadable)?,
            };
            if read == 0 {
                break;
            }

            output.write_all(&buffer[..read]).await?;
            copied += read as u64;

            if progress_due(&mut last_report) {
                self.report_progress(UpdateProgress::downloading(copied, Some(total)));
            }
        }

        output.flush().await?;
        self.report_progress(UpdateProgress::downloading(copied, Some(total.max(copied))));
        Ok(copied)
    }

    async fn download_http(
        &self,
        location: &Url,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            sent = self.client.get(location.clone()).send() => sent,
        };
        let response = sent.map_err(|e| UpdateError::DownloadFailed {
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(UpdateError::DownloadFailed {
                reason: format!("HTTP {}", response.status()),
            });
        }

        let total = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let mut file = File::create(target).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_report = None;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| UpdateError::DownloadFailed {
                reason: e.to_string(),
            })?;

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if progress_due(&mut last_report) {
                self.report_progress(UpdateProgress::downloading(downloaded, total));
            }
        }

        file.flush().await?;
        self.report_progress(UpdateProgress::downloading(downloaded, total.or(Some(downloaded))));
        Ok(downloaded)
    }

    /// Check `path` against `expected`; delete it on mismatch.
    pub async fn verify(&self, path: &Path, expected: &str) -> Result<()> {
        let actual = calculate_checksum(path).await?;
        if actual.eq_ignore_ascii_case(expected.trim()) {
            tracing::debug!(sha256 = %actual, "Package checksum verified");
            return Ok(());
        }

        tracing::error!(expected = expected, actual = %actual, "Package checksum mismatch");
        let _ = tokio::fs::remove_file(path).await;
        Err(UpdateError::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        })
    }
}

/// SHA-256 of a file as lowercase hex
pub async fn calculate_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
