//! Update helper
//!
//! Runs in its own short-lived process after the application has handed off.
//! The sequence is strictly linear:
//!
//! 1. wait for the application process to exit
//! 2. extract the package beside the installation
//! 3. swap the directories
//! 4. restart the application from the new tree
//! 5. clean up the backup, the package and the journal
//!
//! Failures in steps 1 and 2 leave the installation untouched.

pub mod args;
pub mod extract;
pub mod journal;
pub mod process;
pub mod swap;


pub use args::HelperArgs;
pub use journal::{recover_interrupted_swap, RecoveryOutcome, SwapJournal, SwapPhase};

use crate::core::error::Result;
use crate::core::utils::sibling_path;

/// Run the full helper sequence for `args`.
pub fn run_update(args: &HelperArgs) -> Result<()> {
    tracing::info!(
        pid = args.pid,
        app_dir = %args.app_dir.display(),
        package = %args.package.display(),
        "Update helper started"
    );

    process::wait_for_exit(args.pid, args.timeout())?;

    let recovered = recover_interrupted_swap(&args.app_dir)?;
    if recovered != RecoveryOutcome::NothingToRecover {
        tracing::warn!(outcome = ?recovered, "Repaired a previous interrupted update");
    }

    let staging_dir = sibling_path(&args.app_dir, "staging");
    extract::extract_package(&args.package, &staging_dir)?;

    let backup_dir = swap::swap_directories(&args.app_dir, &staging_dir)?;

    let restarted = process::restart_entry(&args.entry, &args.app_dir);
    match &restarted {
        Ok(child) => tracing::info!(pid = child.id(), entry = %args.entry.display(), "Application restarted"),
        Err(e) => tracing::error!(error = %e, "Application restart failed"),
    }

    cleanup(args, &backup_dir);
    restarted.map(|_| ())
}

fn cleanup(args: &HelperArgs, backup_dir: &std::path::Path) {
    if swap::remove_dir_with_retry(backup_dir) {
        tracing::info!(backup = %backup_dir.display(), "Removed previous installation");
    } else {
        tracing::warn!(
            backup = %backup_dir.display(),
            attempts = swap::CLEANUP_ATTEMPTS,
            "Could not remove previous installation"
        );
    }

    if let Err(e) = std::fs::remove_file(&args.package) {
        tracing::warn!(package = %args.package.display(), error = %e, "Could not remove package");
    }

    if let Err(e) = SwapJournal::clear(&args.app_dir) {
        tracing::warn!(error = %e, "Could not remove swap journal");
    }
}
