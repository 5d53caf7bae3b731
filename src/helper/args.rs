//! Helper command line

use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Default wait for the calling process to exit
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Replaces an installation directory with a downloaded package, then
/// restarts the application.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "updater", version, about)]
pub struct HelperArgs {
    /// Process id of the application to wait for
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub pid: u32,

    /// Installation directory to replace
    #[arg(long = "appDir", value_name = "DIR")]
    pub app_dir: PathBuf,

    /// Verified package archive
    #[arg(long, value_name = "ARCHIVE")]
    pub package: PathBuf,

    /// Executable to start after the swap
    #[arg(long, value_name = "EXE")]
    pub entry: PathBuf,

    /// Seconds to wait for the process to exit
    #[arg(long = "timeout-secs", value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Directory for the helper's log files
    #[arg(long = "log-dir", value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl HelperArgs {
    pub fn new(pid: u32, app_dir: PathBuf, package: PathBuf, entry: PathBuf) -> Self {
        Self {
            pid,
            app_dir,
            package,
            entry,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_dir: None,
            verbose: false,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Arguments that reproduce `self` when parsed
    pub fn to_command_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--pid".into(),
            self.pid.to_string().into(),
            "--appDir".into(),
            self.app_dir.clone().into(),
            "--package".into(),
            self.package.clone().into(),
            "--entry".into(),
            self.entry.clone().into(),
        ];
        if self.timeout_secs != DEFAULT_TIMEOUT_SECS {
            args.push("--timeout-secs".into());
            args.push(self.timeout_secs.to_string().into());
        }
        if let Some(log_dir) = &self.log_dir {
            args.push("--log-dir".into());
            args.push(log_dir.clone().into());
        }
        if self.verbose {
            args.push("--verbose".into());
        }
        args
    }
}
