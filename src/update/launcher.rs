//! Helper process launcher
//!
//! The helper ships inside the installation it replaces, so it is copied out to
//! a temporary directory and started from there.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::{Result, UpdateError};
use crate::core::options::UpdateOptions;
use crate::core::utils::{copy_dir_recursive, generate_uuid, get_filename};
use crate::helper::args::HelperArgs;
use crate::helper::process::detach;

/// A helper copied out of the installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedHelper {
    /// Temporary directory holding the copy
    pub dir: PathBuf,
    /// Executable inside `dir`
    pub executable: PathBuf,
}

impl StagedHelper {
    /// Remove the staged copy
    pub async fn discard(&self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            tracing::debug!(dir = %self.dir.display(), error = %e, "Failed to remove staged helper");
        }
    }
}

/// `app_dir/<helper dir>/<helper exe>`, which must exist.
pub fn resolve_helper(app_dir: &Path, options: &UpdateOptions) -> Result<PathBuf> {
    let path = app_dir
        .join(&options.helper_relative_dir)
        .join(options.helper_executable.for_current_os());
    if !path.is_file() {
        return Err(UpdateError::HelperMissing { path });
    }
    Ok(path)
}

/// Copy the helper's whole directory into `<temp_root>/updater-<uuid>`.
pub async fn stage_helper(helper: &Path, temp_root: &Path) -> Result<StagedHelper> {
    let source_dir = helper
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| UpdateError::HelperMissing {
            path: helper.to_path_buf(),
        })?;
    let dir = temp_root.join(format!("updater-{}", generate_uuid().simple()));
    let executable = dir.join(get_filename(helper));

    let target = dir.clone();
    let copied = tokio::task::spawn_blocking(move || copy_dir_recursive(&source_dir, &target))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    match copied {
        Ok(files) => {
            tracing::info!(files, dir = %dir.display(), "Helper staged");
            Ok(StagedHelper { dir, executable })
        }
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&dir).await;
            Err(e.into())
        }
    }
}

/// Start the staged helper detached. Returns its pid.
pub fn launch(helper: &StagedHelper, args: &HelperArgs) -> Result<u32> {
    let mut command = Command::new(&helper.executable);
    command.args(args.to_command_args()).current_dir(&helper.dir);

    let child = detach(&mut command)
        .spawn()
        .map_err(|e| UpdateError::LaunchFailed {
            reason: format!("{}: {}", helper.executable.display(), e),
        })?;

    tracing::info!(
        helper_pid = child.id(),
        app_pid = args.pid,
        "Update helper launched"
    );
    Ok(child.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::options::HelperExecutable;
    use tempfile::TempDir;

    fn install_helper(app_dir: &Path) -> PathBuf {
        let dir = app_dir.join("updater");
        std::fs::create_dir_all(dir.join("lib")).unwrap();
        let exe = dir.join(HelperExecutable::default().for_current_os());
        std::fs::write(&exe, b"helper").unwrap();
        std::fs::write(dir.join("lib").join("runtime.dat"), b"dep").unwrap();
        exe
    }

    #[test]
    fn test_resolve_helper() {
        let temp = TempDir::new().unwrap();
        let expected = install_helper(temp.path());
        let resolved = resolve_helper(temp.path(), &UpdateOptions::default()).unwrap();
        assert_eq!(resolved, expected);
    }

    #[test]
    fn test_resolve_missing_helper() {
        let temp = TempDir::new().unwrap();
        let err = resolve_helper(temp.path(), &UpdateOptions::default()).unwrap_err();
        match err {
            UpdateError::HelperMissing { path } => assert!(path.starts_with(temp.path())),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_stage_helper_copies_dependencies() {
        let app = TempDir::new().unwrap();
        let temp_root = TempDir::new().unwrap();
        let helper = install_helper(app.path());

        let staged = stage_helper(&helper, temp_root.path()).await.unwrap();
        assert!(staged.dir.starts_with(temp_root.path()));
        assert_eq!(std::fs::read(&staged.executable).unwrap(), b"helper");
        assert!(staged.dir.join("lib").join("runtime.dat").exists());

        staged.discard().await;
        assert!(!staged.dir.exists());
    }

    #[test]
    fn test_launch_failure_reported() {
        let temp = TempDir::new().unwrap();
        let staged = StagedHelper {
            dir: temp.path().to_path_buf(),
            executable: temp.path().join("absent"),
        };
        let args = HelperArgs::new(
            1,
            temp.path().join("app"),
            temp.path().join("pkg.zip"),
            temp.path().join("app").join("app"),
        );
        let err = launch(&staged, &args).unwrap_err();
        assert!(matches!(err, UpdateError::LaunchFailed { .. }));
    }
}
