//! Update manager
//!
//! Orchestrates check -> download -> verify -> handoff. Nothing in the
//! installation is touched here; the helper process does the swap after this
//! process has exited.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::launcher::{self, StagedHelper};
use super::model::{ProgressCallback, UpdateInfo, UpdatePhase, UpdateProgress};
use super::source::UpdateSource;
use super::stager::PackageStager;
use crate::core::error::{Result, UpdateError};
use crate::core::options::UpdateOptions;
use crate::helper::args::HelperArgs;

/// Everything that was set up for the helper
#[derive(Debug, Clone)]
pub struct Handoff {
    /// Verified package in the temp root
    pub package: PathBuf,
    /// Helper copy that was started
    pub helper: StagedHelper,
    /// Pid of the running helper
    pub helper_pid: u32,
    /// Arguments the helper was started with
    pub args: HelperArgs,
}

/// Checks for and applies application updates
pub struct UpdateManager {
    source: Arc<dyn UpdateSource>,
    options: UpdateOptions,
    stager: PackageStager,
    progress_callback: Option<ProgressCallback>,
}

impl UpdateManager {
    /// Create a manager with an HTTP client built from `options`
    pub fn new(source: Arc<dyn UpdateSource>, options: UpdateOptions) -> Result<Self> {
        let client = options
            .http_client()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(Self::with_client(source, options, client))
    }

    /// Create a manager sharing an existing HTTP client
    pub fn with_client(
        source: Arc<dyn UpdateSource>,
        options: UpdateOptions,
        client: reqwest::Client,
    ) -> Self {
        let stager = PackageStager::new(client, options.temp_root.clone());
        Self {
            source,
            options,
            stager,
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.stager = self.stager.with_progress_callback(callback.clone());
        self.progress_callback = Some(callback);
        self
    }

    pub fn options(&self) -> &UpdateOptions {
        &self.options
    }

    fn report_progress(&self, phase: UpdatePhase) {
        if let Some(callback) = &self.progress_callback {
            callback(UpdateProgress::phase(phase));
        }
    }

    /// Check for a newer release, reporting failures to the caller.
    pub async fn try_check_for_update(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<UpdateInfo>> {
        self.report_progress(UpdatePhase::Checking);
        let current = (self.options.current_version)();
        let platform_id = (self.options.platform_id)();

        tracing::info!(
            source = self.source.name(),
            current = %current,
            platform = %platform_id,
            "Checking for updates"
        );

        let latest = tokio::select! {
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            latest = self.source.get_latest(&current, &platform_id) => latest?,
        };

        Ok(latest.filter(|info| {
            let newer = info.version > current;
            if !newer {
                tracing::warn!(offered = %info.version, current = %current, "Source offered a version that is not newer");
            }
            newer
        }))
    }

    /// Check for a newer release. Any failure is logged and reads as "no update".
    pub async fn check_for_update(&self, cancel: &CancellationToken) -> Option<UpdateInfo> {
        match self.try_check_for_update(cancel).await {
            Ok(Some(info)) => {
                tracing::info!(version = %info.version, "Update available");
                Some(info)
            }
            Ok(None) => {
                tracing::info!("No update available");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Update check failed");
                None
            }
        }
    }

    /// Download and verify the package, then stage and launch the helper.
    ///
    /// On error, or when cancelled before the helper starts, every temporary
    /// file created here is removed and the installation is untouched.
    pub async fn prepare_handoff(
        &self,
        update: &UpdateInfo,
        cancel: &CancellationToken,
    ) -> Result<Handoff> {
        let app_dir = (self.options.app_dir)()?;
        let entry = (self.options.entry_executable)()?;

        tracing::info!(
            version = %update.version,
            app_dir = %app_dir.display(),
            "Preparing update"
        );

        self.report_progress(UpdatePhase::Downloading);
        let package = self.stager.download(&update.package_location, cancel).await?;

        let result = self.hand_off(update, package.clone(), app_dir, entry, cancel).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&package).await;
        }
        result
    }

    async fn hand_off(
        &self,
        update: &UpdateInfo,
        package: PathBuf,
        app_dir: PathBuf,
        entry: PathBuf,
        cancel: &CancellationToken,
    ) -> Result<Handoff> {
        ensure_active(cancel)?;
        self.report_progress(UpdatePhase::Verifying);
        self.stager.verify(&package, &update.content_hash).await?;

        ensure_active(cancel)?;
        let helper = launcher::resolve_helper(&app_dir, &self.options)?;

        self.report_progress(UpdatePhase::StagingHelper);
        let staged = launcher::stage_helper(&helper, &self.options.temp_root).await?;

        if cancel.is_cancelled() {
            staged.discard().await;
            return Err(UpdateError::Cancelled);
        }

        self.report_progress(UpdatePhase::HandingOff);
        let args = HelperArgs::new(std::process::id(), app_dir, package.clone(), entry);
        match launcher::launch(&staged, &args) {
            Ok(helper_pid) => Ok(Handoff {
                package,
                helper: staged,
                helper_pid,
                args,
            }),
            Err(e) => {
                staged.discard().await;
                Err(e)
            }
        }
    }

    /// Apply `update` and exit this process so the helper can swap the
    /// installation. Returns only if something failed before the handoff.
    pub async fn apply_and_restart(
        &self,
        update: UpdateInfo,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let handoff = self.prepare_handoff(&update, cancel).await?;
        tracing::info!(
            helper_pid = handoff.helper_pid,
            version = %update.version,
            "Exiting for update"
        );
        std::process::exit(0);
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(UpdateError::Cancelled);
    }
    Ok(())
}
