//! launchkit entry point
//!
//! Parses the command line, exports the global settings and runs the chosen
//! command on a tokio runtime. Errors are shown with their suggestions and the
//! process exits with status 1.

use anyhow::{Context, Result};
use clap::Parser;
use launchkit::cli;
use launchkit::core::user_friendly_error;

fn main() {
    if let Err(e) = run() {
        user_friendly_error(e).display();
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let config = cli.build_config();
    // SAFETY: no other thread exists before the runtime is built
    unsafe {
        config.apply_to_env();
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(cli.execute_with_config(config))
}
