//! Process table queries and detached spawning

use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessStatus, System};

use crate::core::error::{Result, UpdateError};

/// How often the process table is polled while waiting
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Whether `pid` names a live process. Zombies count as exited.
pub fn is_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    if !system.refresh_process(pid) {
        return false;
    }
    match system.process(pid) {
        Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
        None => false,
    }
}

/// Block until `pid` is gone, polling every [`POLL_INTERVAL`].
///
/// When the deadline passes the table is checked once more before giving up,
/// so an exit racing the deadline is not reported as a timeout.
pub fn wait_for_exit(pid: u32, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    let deadline = started + timeout;

    while Instant::now() < deadline {
        if !is_running(pid) {
            tracing::info!(pid, waited_ms = started.elapsed().as_millis() as u64, "Process exited");
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now())));
    }

    if !is_running(pid) {
        tracing::info!(pid, "Process exited at deadline");
        return Ok(());
    }

    tracing::error!(pid, timeout_secs = timeout.as_secs(), "Process still running, giving up");
    Err(UpdateError::ProcessTimeout {
        pid,
        waited_secs: timeout.as_secs(),
    })
}

/// Put `command` in its own process group with no inherited stdio.
pub fn detach(command: &mut Command) -> &mut Command {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    command
}

/// Start the application entry detached, with `working_dir` as its cwd.
pub fn restart_entry(entry: &Path, working_dir: &Path) -> Result<Child> {
    let mut command = Command::new(entry);
    command.current_dir(working_dir);
    detach(&mut command)
        .spawn()
        .map_err(|e| UpdateError::RestartFailed {
            reason: format!("{}: {}", entry.display(), e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_running() {
        assert!(is_running(std::process::id()));
    }

    #[test]
    fn test_unknown_pid_is_not_running() {
        // Above the default pid_max on Linux and far above typical Windows pids
        assert!(!is_running(u32::MAX - 1));
    }

    #[test]
    fn test_wait_times_out_on_live_process() {
        let started = Instant::now();
        let err = wait_for_exit(std::process::id(), Duration::from_millis(300)).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::ProcessTimeout { pid, .. } if pid == std::process::id()
        ));
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[test]
    fn test_restart_missing_entry() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = restart_entry(&temp.path().join("absent"), temp.path()).unwrap_err();
        assert!(matches!(err, UpdateError::RestartFailed { .. }));
    }
}
