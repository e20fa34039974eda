//! Command-line interface for the FKey updater.
//!
//! # Available Commands
//!
//! - `check` - Decide whether an update is available
//! - `status` - Show the running version and update coordinates
//! - `download` - Download the latest (or a given) release archive
//! - `install` - Prepare and launch the replacement script for an archive
//! - `upgrade` - Check, download and install in one go
//! - `compare` - Compare two version strings
//! - `open` - Open a release page in the browser
//!
//! # Global Options
//!
//! - `--verbose` - Enable debug logging
//! - `--quiet` - Suppress logging and progress bars
//! - `--config <PATH>` - Use a specific configuration file
//!   (also `FKEY_UPDATER_CONFIG`)
//!
//! ```bash
//! fkey-updater check
//! fkey-updater check --force --json
//! fkey-updater upgrade --target /opt/fkey/FKey
//! fkey-updater compare 1.2.0 v1.3.0
//! ```

mod check;
mod upgrade;

use crate::config::UpdaterConfig;
use crate::upgrade::UpdaterService;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use check::{CheckCommand, CompareCommand, StatusCommand};
pub use upgrade::{DownloadCommand, InstallCommand, OpenCommand, UpgradeCommand};

/// Top-level command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "fkey-updater",
    about = "Check for, download and install FKey updates",
    version,
    long_about = "Self-update tool for the FKey desktop app. Reads the published VERSION file, \
                  downloads the portable release archive and swaps the executable through a \
                  detached replacement script."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress logging and progress output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the updater configuration file.
    ///
    /// Defaults to `~/.fkey/updater.toml` (`%LOCALAPPDATA%\fkey\updater.toml`
    /// on Windows). A missing file means built-in defaults.
    #[arg(short, long, global = true, env = "FKEY_UPDATER_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether a newer version is published
    Check(CheckCommand),

    /// Show the running version and update coordinates
    Status(StatusCommand),

    /// Download a release archive
    Download(DownloadCommand),

    /// Prepare and launch the replacement script for a downloaded archive
    Install(InstallCommand),

    /// Check, download and install the latest version
    Upgrade(UpgradeCommand),

    /// Compare two version strings
    Compare(CompareCommand),

    /// Open a release page in the default browser
    Open(OpenCommand),
}

/// State shared by every command.
#[derive(Debug)]
pub struct CommandContext {
    /// Loaded (or default) configuration.
    pub config: UpdaterConfig,
    /// Where the configuration was looked up.
    pub config_path: PathBuf,
    /// Whether progress output is suppressed.
    pub quiet: bool,
}

impl CommandContext {
    /// Build an updater service from the loaded configuration.
    pub fn service(&self) -> Result<UpdaterService> {
        UpdaterService::new(self.config.clone()).context("Failed to initialize updater")
    }

    /// Build an updater service that replaces the FKey executable.
    ///
    /// `target` overrides the configured `target_executable`. Without either
    /// this refuses, since the fallback would be this binary.
    pub fn install_service(&self, target: Option<PathBuf>) -> Result<UpdaterService> {
        let Some(target) = target.or_else(|| self.config.target_executable.clone()) else {
            bail!(
                "No executable to update: pass --target <EXE> or set target_executable in {}",
                self.config_path.display()
            );
        };

        let target = std::path::absolute(&target)
            .with_context(|| format!("Failed to resolve {}", target.display()))?;
        if !target.is_file() {
            bail!("Target executable {} does not exist", target.display());
        }

        UpdaterService::new(self.config.clone().with_target_executable(target))
            .context("Failed to initialize updater")
    }
}

impl Cli {
    /// Run the selected command.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        // compare needs neither configuration nor network
        if let Commands::Compare(cmd) = &self.command {
            return cmd.execute();
        }

        let ctx = self.load_context().await?;
        match self.command {
            Commands::Check(cmd) => cmd.execute(&ctx).await,
            Commands::Status(cmd) => cmd.execute(&ctx).await,
            Commands::Download(cmd) => cmd.execute(&ctx).await,
            Commands::Install(cmd) => cmd.execute(&ctx).await,
            Commands::Upgrade(cmd) => cmd.execute(&ctx).await,
            Commands::Open(cmd) => cmd.execute(&ctx).await,
            Commands::Compare(cmd) => cmd.execute(),
        }
    }

    fn init_logging(&self) {
        let filter = if self.verbose {
            EnvFilter::new("fkey_updater=debug")
        } else if self.quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }

    async fn load_context(&self) -> Result<CommandContext> {
        let config_path = match &self.config {
            Some(path) => path.clone(),
            None => UpdaterConfig::default_path()?,
        };

        let config = UpdaterConfig::load_or_default(&config_path, env!("CARGO_PKG_VERSION"))
            .await
            .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

        Ok(CommandContext {
            config,
            config_path,
            quiet: self.quiet,
        })
    }
}
