//! Command-line interface for the `launchkit` binary.
//!
//! # Commands
//!
//! - `run`: start the launcher as the single running instance, optionally
//!   checking for an update first
//! - `check`: show the installed and the published version
//! - `upgrade`: download the published version and hand off to the updater
//! - `rollback`: restore the executable from the backup the updater left
//! - `version`: print the installed version from `version_local.json`
//!
//! Without a command, `run` is assumed. The updater relies on this when it
//! starts the new executable.
//!
//! # Global Options
//!
//! - `--verbose` / `-v`: debug logging
//! - `--quiet` / `-q`: errors only
//! - `--config <PATH>`: use this `launchkit.toml`
//! - `--no-progress`: hide progress bars
//!
//! `RUST_LOG` overrides the log level chosen by the flags.

mod run;
mod upgrade;


use crate::constants::NO_PROGRESS_ENV;
use crate::upgrade::AppContext;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use run::RunCommand;
pub use upgrade::{TerminalPrompt, UpgradeCommand};

/// Settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub no_progress: bool,
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Export settings that lower layers read from the environment.
    ///
    /// # Safety
    ///
    /// Must be called before any other thread is started.
    pub unsafe fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: single-threaded per the caller's contract
            unsafe {
                std::env::set_var(NO_PROGRESS_ENV, "1");
            }
        }
    }
}

#[derive(Parser)]
#[command(
    name = "launchkit",
    about = "Application launcher with in-place self-update",
    version,
    long_about = "launchkit keeps a single instance of itself running and replaces its own executable \
                  through a separate updater process when a new version is published."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to launchkit.toml
    #[arg(short, long, global = true, env = "LAUNCHKIT_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the launcher
    Run(RunCommand),

    /// Check whether a new version is published
    Check,

    /// Install the published version
    Upgrade(UpgradeCommand),

    /// Restore the previous version from its backup
    Rollback,

    /// Print the installed version
    Version,
}

impl Cli {
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "launchkit=debug"
        } else if self.quiet {
            "error"
        } else {
            "launchkit=info"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Run the selected command.
    ///
    /// `config` comes from [`build_config`](Self::build_config) and must
    /// already have been applied to the environment.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        init_logging(&config.log_level);

        let config_path = config.config_path.as_deref();
        let command = self.command.unwrap_or_else(|| Commands::Run(RunCommand::default()));
        match command {
            Commands::Run(cmd) => cmd.execute(config_path).await,
            Commands::Check => upgrade::check(config_path).await,
            Commands::Upgrade(cmd) => cmd.execute(config_path).await,
            Commands::Rollback => upgrade::rollback().await,
            Commands::Version => {
                let ctx = AppContext::from_env(config_path).await?;
                println!("launchkit {}", ctx.version_store.load());
                Ok(())
            }
        }
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `default_filter`. Safe to call more than once.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
