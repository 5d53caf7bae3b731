//! Directory swap
//!
//! Two renames in a fixed order, installation out then package in, so at most
//! one of the two trees is missing at any instant.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::journal::{SwapJournal, SwapPhase};
use crate::core::error::{Result, UpdateError};
use crate::core::utils::sibling_path;

/// Attempts made to delete the backup after a successful swap
pub const CLEANUP_ATTEMPTS: u32 = 10;

/// Pause between cleanup attempts
pub const CLEANUP_DELAY: Duration = Duration::from_millis(200);

/// Replace `app_dir` with `staging_dir`. Returns the backup location of the
/// previous installation.
///
/// Both directories must share a parent. A failed promote is rolled back once;
/// the returned `SwapFailure` says whether `app_dir` exists afterwards.
pub fn swap_directories(app_dir: &Path, staging_dir: &Path) -> Result<PathBuf> {
    swap_with(app_dir, staging_dir, |from, to| std::fs::rename(from, to))
}

pub(crate) fn swap_with<R>(app_dir: &Path, staging_dir: &Path, rename: R) -> Result<PathBuf>
where
    R: Fn(&Path, &Path) -> std::io::Result<()>,
{
    let backup_dir = sibling_path(app_dir, "backup");
    let mut journal = SwapJournal::new(app_dir, staging_dir, &backup_dir);
    record(&mut journal, SwapPhase::Staged);

    if let Err(e) = rename(app_dir, &backup_dir) {
        discard_staging(staging_dir);
        clear_journal(app_dir);
        return Err(swap_failure(
            format!("could not move {} aside: {}", app_dir.display(), e),
            app_dir,
        ));
    }
    record(&mut journal, SwapPhase::Displaced);
    tracing::info!(backup = %backup_dir.display(), "Installation moved to backup");

    if let Err(e) = rename(staging_dir, app_dir) {
        // A failed rollback keeps staging and the journal for recovery.
        let reason = match rename(&backup_dir, app_dir) {
            Ok(()) => {
                discard_staging(staging_dir);
                clear_journal(app_dir);
                format!("could not promote {}: {} (rolled back)", staging_dir.display(), e)
            }
            Err(rollback) => format!(
                "could not promote {}: {}; rollback failed: {}",
                staging_dir.display(),
                e,
                rollback
            ),
        };
        return Err(swap_failure(reason, app_dir));
    }
    record(&mut journal, SwapPhase::Promoted);
    tracing::info!(app_dir = %app_dir.display(), "New version promoted");

    Ok(backup_dir)
}

fn record(journal: &mut SwapJournal, phase: SwapPhase) {
    if let Err(e) = journal.record(phase) {
        tracing::warn!(phase = ?phase, error = %e, "Failed to write swap journal");
    }
}

fn clear_journal(app_dir: &Path) {
    if let Err(e) = SwapJournal::clear(app_dir) {
        tracing::warn!(app_dir = %app_dir.display(), error = %e, "Failed to remove swap journal");
    }
}

fn discard_staging(staging_dir: &Path) {
    if staging_dir.exists() && !remove_dir_with_retry(staging_dir) {
        tracing::warn!(dir = %staging_dir.display(), "Failed to remove staging directory");
    }
}

fn swap_failure(reason: String, app_dir: &Path) -> UpdateError {
    let err = UpdateError::SwapFailure {
        reason,
        app_dir_present: app_dir.exists(),
    };
    tracing::error!(target: "swap", error = %err, app_dir = %app_dir.display(), "Directory swap failed");
    err
}

/// Delete `dir`, retrying [`CLEANUP_ATTEMPTS`] times. Returns whether it is gone.
pub fn remove_dir_with_retry(dir: &Path) -> bool {
    remove_dir_with(dir, CLEANUP_ATTEMPTS, CLEANUP_DELAY)
}

pub(crate) fn remove_dir_with(dir: &Path, attempts: u32, delay: Duration) -> bool {
    for attempt in 1..=attempts {
        match std::fs::remove_dir_all(dir) {
            Ok(()) => return true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), attempt, error = %e, "Cleanup attempt failed");
                if attempt < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree(root: &Path, marker: &str) {
        std::fs::create_dir_all(root.join("bin")).unwrap();
        std::fs::write(root.join("version.txt"), marker).unwrap();
        std::fs::write(root.join("bin").join("tool"), marker).unwrap();
    }

    #[test]
    fn test_swap_promotes_and_keeps_backup() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        let staging = temp.path().join(".app.staging");
        tree(&app, "v1");
        tree(&staging, "v2");

        let backup = swap_directories(&app, &staging).unwrap();
        assert_eq!(std::fs::read_to_string(app.join("version.txt")).unwrap(), "v2");
        assert_eq!(std::fs::read_to_string(backup.join("version.txt")).unwrap(), "v1");
        assert_eq!(backup.parent(), app.parent());
        assert!(!staging.exists());

        let journal = SwapJournal::load(&app).unwrap().unwrap();
        assert_eq!(journal.phase, SwapPhase::Promoted);
    }

    #[test]
    fn test_missing_staging_rolls_back() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        tree(&app, "v1");

        let err = swap_directories(&app, &temp.path().join("absent")).unwrap_err();
        match err {
            UpdateError::SwapFailure { app_dir_present, reason } => {
                assert!(app_dir_present);
                assert!(reason.contains("rolled back"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_to_string(app.join("version.txt")).unwrap(), "v1");
        assert!(SwapJournal::load(&app).unwrap().is_none());
    }

    #[test]
    fn test_failed_promote_rolls_back_and_discards_staging() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        let staging = temp.path().join(".app.staging-1");
        tree(&app, "v1");
        tree(&staging, "v2");

        let err = swap_with(&app, &staging, |from, to| {
            if from == staging.as_path() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "promote denied",
                ));
            }
            std::fs::rename(from, to)
        })
        .unwrap_err();

        match err {
            UpdateError::SwapFailure { app_dir_present, reason } => {
                assert!(app_dir_present);
                assert!(reason.contains("rolled back"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read_to_string(app.join("version.txt")).unwrap(), "v1");
        let siblings: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(siblings, vec![std::ffi::OsString::from("app")]);
    }

    #[test]
    fn test_failed_rollback_keeps_staging_for_recovery() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        let staging = temp.path().join(".app.staging-1");
        tree(&app, "v1");
        tree(&staging, "v2");

        let err = swap_with(&app, &staging, |from, to| {
            if to == app.as_path() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "volume gone"));
            }
            std::fs::rename(from, to)
        })
        .unwrap_err();

        assert!(matches!(
            err,
            UpdateError::SwapFailure { app_dir_present: false, .. }
        ));
        assert!(staging.is_dir());
        let journal = SwapJournal::load(&app).unwrap().unwrap();
        assert_eq!(journal.phase, SwapPhase::Displaced);
        assert!(journal.backup_dir.is_dir());
    }

    #[test]
    fn test_missing_app_dir_fails_first_rename() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("app");
        let staging = temp.path().join(".app.staging");
        tree(&staging, "v2");

        let err = swap_directories(&app, &staging).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::SwapFailure { app_dir_present: false, .. }
        ));
        assert!(!staging.exists());
    }

    #[test]
    fn test_remove_dir_with_retry() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("backup");
        tree(&dir, "old");

        assert!(remove_dir_with_retry(&dir));
        assert!(!dir.exists());
        // Already gone counts as removed
        assert!(remove_dir_with(&dir, 3, Duration::from_millis(1)));
    }
}
