//! Swap journal
//!
//! A marker file beside the installation that records how far a directory swap
//! got. If the helper dies between the two renames the installation directory
//! can be missing; the journal says where the old and new trees are so a later
//! run can put one of them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::swap::remove_dir_with_retry;
use crate::core::error::{Result, UpdateError};
use crate::core::utils::get_filename;

/// How far a swap has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapPhase {
    /// Package extracted; installation not touched yet
    Staged,
    /// Installation moved to the backup path
    Displaced,
    /// New tree renamed into place
    Promoted,
}

/// Persisted swap record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapJournal {
    pub app_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub phase: SwapPhase,
    pub updated_at: DateTime<Utc>,
}

/// Result of [`recover_interrupted_swap`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No journal found
    NothingToRecover,
    /// Swap never started; leftover staging removed
    DiscardedStaging,
    /// Old installation renamed back into place
    RestoredBackup,
    /// Backup was gone, the extracted package was renamed into place
    PromotedStaging,
    /// Installation was in place; leftovers removed
    FinishedCleanup,
}

/// Journal location for an installation: `<parent>/.<name>.update-journal.json`
pub fn journal_path(app_dir: &Path) -> PathBuf {
    let name = format!(".{}.update-journal.json", get_filename(app_dir));
    match app_dir.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

impl SwapJournal {
    pub fn new(app_dir: &Path, staging_dir: &Path, backup_dir: &Path) -> Self {
        Self {
            app_dir: app_dir.to_path_buf(),
            staging_dir: staging_dir.to_path_buf(),
            backup_dir: backup_dir.to_path_buf(),
            phase: SwapPhase::Staged,
            updated_at: Utc::now(),
        }
    }

    /// Set the phase and write the journal atomically (temp file + rename).
    pub fn record(&mut self, phase: SwapPhase) -> std::io::Result<()> {
        self.phase = phase;
        self.updated_at = Utc::now();

        let path = journal_path(&self.app_dir);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, &path)?;

        tracing::debug!(phase = ?phase, journal = %path.display(), "Swap journal updated");
        Ok(())
    }

    /// Load the journal for `app_dir`, if one exists.
    pub fn load(app_dir: &Path) -> std::io::Result<Option<Self>> {
        let path = journal_path(app_dir);
        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map(Some)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove the journal. A missing journal is not an error.
    pub fn clear(app_dir: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(journal_path(app_dir)) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Repair the installation after a swap that did not finish.
///
/// Safe to call on every start: without a journal it does nothing. When the
/// installation directory is missing the backup is restored, or failing that
/// the extracted package is promoted. When the directory is present only the
/// leftovers are removed.
pub fn recover_interrupted_swap(app_dir: &Path) -> Result<RecoveryOutcome> {
    let Some(journal) = SwapJournal::load(app_dir)? else {
        return Ok(RecoveryOutcome::NothingToRecover);
    };

    tracing::warn!(
        app_dir = %app_dir.display(),
        phase = ?journal.phase,
        since = %journal.updated_at,
        "Found interrupted update swap"
    );

    let outcome = if app_dir.exists() {
        remove_leftover(&journal.staging_dir);
        remove_leftover(&journal.backup_dir);
        match journal.phase {
            SwapPhase::Staged => RecoveryOutcome::DiscardedStaging,
            SwapPhase::Displaced | SwapPhase::Promoted => RecoveryOutcome::FinishedCleanup,
        }
    } else if journal.backup_dir.is_dir() {
        std::fs::rename(&journal.backup_dir, app_dir).map_err(|e| swap_unrecoverable(app_dir, e))?;
        remove_leftover(&journal.staging_dir);
        RecoveryOutcome::RestoredBackup
    } else if journal.phase != SwapPhase::Staged && journal.staging_dir.is_dir() {
        std::fs::rename(&journal.staging_dir, app_dir)
            .map_err(|e| swap_unrecoverable(app_dir, e))?;
        RecoveryOutcome::PromotedStaging
    } else {
        return Err(swap_unrecoverable(app_dir, "neither backup nor staged package exists"));
    };

    SwapJournal::clear(app_dir)?;
    tracing::info!(outcome = ?outcome, app_dir = %app_dir.display(), "Recovered interrupted swap");
    Ok(outcome)
}

fn remove_leftover(dir: &Path) {
    if dir.exists() && !remove_dir_with_retry(dir) {
        tracing::warn!(dir = %dir.display(), "Could not remove update leftover");
    }
}

fn swap_unrecoverable(app_dir: &Path, reason: impl std::fmt::Display) -> UpdateError {
    let err = UpdateError::SwapFailure {
        reason: format!("recovery of {} failed: {}", app_dir.display(), reason),
        app_dir_present: app_dir.exists(),
    };
    tracing::error!(target: "swap", error = %err, "Installation could not be recovered");
    err
}
