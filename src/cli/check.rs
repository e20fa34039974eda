use super::CommandContext;
use crate::upgrade::{Platform, UpdateDecision, Version, is_newer};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

/// Arguments for `fkey-updater check`.
#[derive(Args, Debug)]
pub struct CheckCommand {
    /// Ignore any cached decision and fetch the version file again.
    #[arg(short, long)]
    pub force: bool,

    /// Print the decision as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl CheckCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;

        if !self.json && !ctx.quiet {
            println!("{}", "Checking for updates...".cyan());
        }

        let decision = service
            .check_for_updates(self.force)
            .await
            .context("Failed to check for updates")?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&decision)?);
        } else {
            print_decision(&decision);
        }
        Ok(())
    }
}

/// Arguments for `fkey-updater status`.
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Do not contact the server.
    #[arg(long)]
    pub offline: bool,
}

impl StatusCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let config = &ctx.config;

        println!("{} {}", "Current version:".bold(), config.current_version);
        println!("{} {:?}", "Platform:".bold(), Platform::current());
        println!("{} {}/{} ({})", "Repository:".bold(), config.owner, config.repo, config.branch);
        println!("{} {}", "Version file:".bold(), config.version_url());
        println!("{} {}s", "Check interval:".bold(), config.check_interval_secs);
        println!("{} {}", "Configuration:".bold(), ctx.config_path.display());

        if self.offline {
            return Ok(());
        }

        // Status is informational; an unreachable server is not a failure here
        match ctx.service()?.check_for_updates(false).await {
            Ok(decision) => {
                println!("{} {}", "Latest version:".bold(), decision.latest_version);
                print_decision(&decision);
            }
            Err(e) => {
                println!("{} {}", "Latest version:".bold(), "unknown".yellow());
                eprintln!("{}", format!("Could not check for updates: {e}").yellow());
            }
        }
        Ok(())
    }
}

/// Arguments for `fkey-updater compare`.
#[derive(Args, Debug)]
pub struct CompareCommand {
    /// The version considered installed.
    pub current: String,

    /// The candidate version.
    pub latest: String,
}

impl CompareCommand {
    pub fn execute(&self) -> Result<()> {
        let current = Version::parse(&self.current);
        let latest = Version::parse(&self.latest);

        if is_newer(&self.current, &self.latest) {
            println!("{} is newer than {}", latest.to_string().green(), current);
        } else {
            println!("{} is not newer than {}", latest, current);
        }
        Ok(())
    }
}

fn print_decision(decision: &UpdateDecision) {
    if decision.available {
        println!("{}", decision.summary().green().bold());
        println!("  Release notes: {}", decision.release_notes_url);
        println!("  Download:      {}", decision.download_url);
        println!("Run `fkey-updater upgrade` to install it");
    } else {
        println!("{}", decision.summary().green());
    }
}
