//! Update-related commands: `check`, `upgrade` and `rollback`.

use crate::upgrade::orchestrator::{AutoInstall, UpdateChoice, UpdateOutcome, UpdatePrompt};
use crate::upgrade::version_check::format_version_info;
use crate::upgrade::{AppContext, BackupManager, UpdateOrchestrator, VersionDescriptor};
use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;
use std::io::{BufRead, Write};
use std::path::Path;

#[derive(Args, Debug, Default)]
pub struct UpgradeCommand {
    /// Install without asking
    #[arg(short, long)]
    pub yes: bool,
}

impl UpgradeCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let mut ctx = AppContext::from_env(config_path).await?;
        ctx.acquire_instance()?;
        let mut orchestrator = UpdateOrchestrator::new(ctx)?;

        println!("{}", "Checking for updates...".cyan());
        let current = orchestrator.get_installed_version();
        let descriptor = orchestrator
            .checker()
            .fetch_remote()
            .await
            .context("Failed to check for updates")?;

        if !crate::upgrade::is_update_available(&current, &descriptor) {
            println!("{}", format!("You are on the latest version ({current})").green());
            return Ok(());
        }

        let outcome = if self.yes {
            orchestrator.begin_update(&descriptor, &mut AutoInstall).await
        } else {
            orchestrator.begin_update(&descriptor, &mut TerminalPrompt::new()).await
        };

        // Install either exits the process or comes back with an error
        match outcome {
            Ok(UpdateOutcome::Postponed) => println!("Update postponed"),
            Ok(UpdateOutcome::ReleasePageShown(_)) => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

pub async fn check(config_path: Option<&Path>) -> Result<()> {
    let ctx = AppContext::from_env(config_path).await?;
    let orchestrator = UpdateOrchestrator::new(ctx)?;
    let current = orchestrator.get_installed_version();

    println!("{}", "Checking for updates...".cyan());
    let descriptor = orchestrator.checker().fetch_remote().await?;

    println!("{}", format_version_info(&current, Some(&descriptor)));
    if crate::upgrade::is_update_available(&current, &descriptor) {
        if !descriptor.changelog.is_empty() {
            println!("\n{}\n{}", "Changes:".bold(), descriptor.changelog);
        }
        println!("\nRun {} to install it", "launchkit upgrade".cyan().bold());
    }
    Ok(())
}

pub async fn rollback() -> Result<()> {
    let current_exe =
        std::env::current_exe().context("Failed to get current executable path")?;
    let manager = BackupManager::new(current_exe);

    if !manager.backup_exists() {
        bail!("No backup found at {}. Cannot roll back.", manager.backup_path().display());
    }

    println!("{}", "Rolling back to previous version...".yellow());
    manager.restore_backup().await.context("Failed to restore from backup")?;
    println!("{}", "Successfully rolled back to previous version".green());
    Ok(())
}

/// Asks on the terminal: install, open the release page, or later.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub const fn new() -> Self {
        Self
    }

    fn parse_answer(answer: &str) -> UpdateChoice {
        match answer.trim().to_ascii_lowercase().as_str() {
            "" | "i" | "install" | "y" | "yes" => UpdateChoice::Install,
            "o" | "open" => UpdateChoice::OpenReleasePage,
            _ => UpdateChoice::Later,
        }
    }
}

impl UpdatePrompt for TerminalPrompt {
    fn choose(&mut self, current: &str, descriptor: &VersionDescriptor) -> UpdateChoice {
        println!();
        println!("{} A new version of launchkit is available!", "📦".bright_cyan());
        println!("  Installed: {}", current.yellow());
        println!("  Available: {}", descriptor.version.green().bold());
        if !descriptor.changelog.is_empty() {
            println!();
            for line in descriptor.changelog.lines() {
                println!("  {line}");
            }
        }
        println!();
        print!("[I]nstall now, [o]pen release page, or [l]ater? ");
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => UpdateChoice::Later,
            Ok(_) => Self::parse_answer(&answer),
        }
    }
}
