//! launchkit-updater: replaces the launcher executable once it has exited.
//!
//! Usage: `launchkit-updater <STAGED> <TARGET> [PID] [VERSION]`
//!
//! Exits 0 when the new executable is in place (even if the relaunch failed)
//! and 1 on abort or bad arguments.

use clap::Parser;
use clap::error::ErrorKind;
use launchkit::cli::init_logging;
use launchkit::core::{LauncherError, user_friendly_error};
use launchkit::upgrade::{Updater, UpdaterArgs};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "launchkit-updater",
    version,
    about = "Swap in a downloaded launchkit executable and relaunch it"
)]
struct UpdaterCli {
    /// Downloaded executable to install
    staged: PathBuf,

    /// Executable to replace
    target: PathBuf,

    /// Process id of the launcher to wait for
    pid: Option<String>,

    /// Version to record after the swap
    #[arg(value_name = "VERSION")]
    target_version: Option<String>,
}

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = match UpdaterCli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    init_logging("info");

    let args = match UpdaterArgs::new(
        &cli.staged,
        &cli.target,
        cli.pid.as_deref(),
        cli.target_version.as_deref(),
    ) {
        Ok(args) => args,
        Err(e) => exit_with(e),
    };

    let report = Updater::new(args.clone()).run();
    report.print_summary(&args);
    std::process::exit(report.exit_code());
}

fn exit_with(error: LauncherError) -> ! {
    user_friendly_error(error.into()).display();
    std::process::exit(1)
}
