//! Update helper process
//!
//! Launched detached by the application right before it exits. Waits for the
//! application to go away, swaps the installation for the extracted package,
//! and starts the application again.
//!
//! Usage:
//!   updater --pid <PID> --appDir <DIR> --package <ARCHIVE> --entry <EXE>
//!
//! Exit codes: 0 on success, 1 on any failure, 2 on bad arguments.

use clap::Parser;

use app_update::helper::{self, HelperArgs};
use app_update::logging::{LogLevel, LoggingConfig, LoggingSystem};

fn run(args: &HelperArgs) -> anyhow::Result<()> {
    helper::run_update(args)?;
    Ok(())
}

fn main() {
    let args = HelperArgs::parse();

    let code = {
        let mut config = LoggingConfig::helper(args.log_dir.clone());
        if args.verbose {
            config = config.with_level(LogLevel::Debug);
        }
        let _logging = match LoggingSystem::init(config) {
            Ok(system) => Some(system),
            Err(e) => {
                eprintln!("Warning: logging unavailable: {}", e);
                None
            }
        };

        match run(&args) {
            Ok(()) => {
                tracing::info!("Update complete");
                0
            }
            Err(e) => {
                tracing::error!("Update failed: {:#}", e);
                1
            }
        }
    };

    std::process::exit(code);
}
