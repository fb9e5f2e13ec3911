//! `launchkit run`: the long-running launcher.
//!
//! Startup takes the single-instance lock, makes sure the version record
//! exists and, unless disabled, checks for an update before settling into the
//! main loop. A second start while an instance is alive only reports it.

use crate::cli::TerminalPrompt;
use crate::core::{LauncherError, user_friendly_error};
use crate::upgrade::orchestrator::UpdateOutcome;
use crate::upgrade::{AppContext, UpdateOrchestrator};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use tracing::{debug, info};

#[derive(Args, Debug, Default)]
pub struct RunCommand {
    /// Skip the update check at startup
    #[arg(long)]
    pub no_update_check: bool,

    /// Exit after the startup sequence instead of waiting for Ctrl-C
    #[arg(long)]
    pub once: bool,
}

impl RunCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let mut ctx = AppContext::from_env(config_path).await?;

        match ctx.acquire_instance() {
            Ok(()) => {}
            Err(LauncherError::AlreadyRunning {
                pid,
            }) => {
                println!("{} launchkit is already running (pid {pid})", "ℹ".cyan());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let check_enabled = ctx.config.upgrade.check_on_startup && !self.no_update_check;
        let mut orchestrator = UpdateOrchestrator::new(ctx)?;
        let version = orchestrator.get_installed_version();
        info!("launchkit {version} started");

        if check_enabled {
            self.startup_update_check(&mut orchestrator).await;
        } else {
            debug!("Startup update check disabled");
        }

        if !self.once {
            println!("launchkit {version} running. Press Ctrl-C to quit.");
            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
        }

        orchestrator.context_mut().release_instance();
        Ok(())
    }

    async fn startup_update_check(&self, orchestrator: &mut UpdateOrchestrator) {
        let Some(descriptor) = orchestrator.check_for_update().await else {
            return;
        };

        let mut prompt = TerminalPrompt::new();
        match orchestrator.begin_update(&descriptor, &mut prompt).await {
            Ok(UpdateOutcome::Postponed) => {
                println!("You can update later with {}", "launchkit upgrade".cyan());
            }
            Ok(UpdateOutcome::ReleasePageShown(_)) => {}
            // The handoff failed; keep running on the current version
            Err(e) => user_friendly_error(e.into()).display(),
        }
    }
}
