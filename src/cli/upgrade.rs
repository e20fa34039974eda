use super::CommandContext;
use crate::upgrade::{DownloadedArtifact, UpdaterService};
use crate::utils::DownloadProgress;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Arguments for `fkey-updater download`.
#[derive(Args, Debug)]
pub struct DownloadCommand {
    /// Download this URL instead of the latest release archive.
    #[arg(long)]
    pub url: Option<String>,
}

impl DownloadCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;

        let url = match self.url {
            Some(url) => url,
            None => {
                service
                    .check_for_updates(false)
                    .await
                    .context("Failed to check for updates")?
                    .download_url
            }
        };

        let artifact = download(&service, &url, ctx.quiet).await?;
        println!("{}", artifact.path.display());
        Ok(())
    }
}

/// Arguments for `fkey-updater install`.
#[derive(Args, Debug)]
pub struct InstallCommand {
    /// The downloaded release archive.
    pub archive: PathBuf,

    /// Write the replacement script but do not run it.
    #[arg(long)]
    pub no_launch: bool,

    /// The FKey executable to replace (overrides `target_executable`).
    #[arg(long, value_name = "EXE")]
    pub target: Option<PathBuf>,
}

impl InstallCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.install_service(self.target)?;
        install(&service, &self.archive, !self.no_launch).await
    }
}

/// Arguments for `fkey-updater upgrade`.
#[derive(Args, Debug)]
pub struct UpgradeCommand {
    /// Ignore any cached decision and fetch the version file again.
    #[arg(short, long)]
    pub force: bool,

    /// The FKey executable to replace (overrides `target_executable`).
    #[arg(long, value_name = "EXE")]
    pub target: Option<PathBuf>,
}

impl UpgradeCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.install_service(self.target)?;

        println!("{}", "Checking for updates...".cyan());
        let decision = service
            .check_for_updates(self.force)
            .await
            .context("Failed to check for updates")?;

        if !decision.available {
            println!("{}", decision.summary().green());
            return Ok(());
        }

        println!(
            "{}",
            format!("Upgrading {} -> {}...", decision.current_version, decision.latest_version)
                .cyan()
        );

        let artifact = download(&service, &decision.download_url, ctx.quiet).await?;
        install(&service, &artifact.path, true).await
    }
}

/// Arguments for `fkey-updater open`.
#[derive(Args, Debug)]
pub struct OpenCommand {
    /// Open the page of this version instead of the latest one.
    #[arg(long = "version", value_name = "VERSION")]
    pub release: Option<String>,
}

impl OpenCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let service = ctx.service()?;

        let url = match self.release {
            Some(version) => ctx.config.release_url(&version),
            None => {
                service
                    .check_for_updates(false)
                    .await
                    .context("Failed to check for updates")?
                    .release_url
            }
        };

        println!("Opening {}", url);
        service.open_release_page(&url).context("Failed to open the release page")?;
        Ok(())
    }
}

async fn download(service: &UpdaterService, url: &str, quiet: bool) -> Result<DownloadedArtifact> {
    let mut progress = DownloadProgress::new("Downloading", quiet);

    let result = service
        .download_update(url, Some(|done: u64, total: Option<u64>| progress.update(done, total)))
        .await;

    match result {
        Ok(artifact) => {
            progress.finish("done");
            debug!("Downloaded {} of {:?} bytes", artifact.downloaded_bytes, artifact.total_bytes);
            Ok(artifact)
        }
        Err(e) => {
            progress.abandon();
            Err(e).with_context(|| format!("Failed to download {url}"))
        }
    }
}

async fn install(service: &UpdaterService, archive: &Path, launch: bool) -> Result<()> {
    let script = service
        .install_update(archive)
        .await
        .with_context(|| format!("Failed to prepare install from {}", archive.display()))?;

    if !launch {
        println!("Replacement script written to {}", script.display());
        return Ok(());
    }

    service.run_update_script(&script).context("Failed to launch the replacement script")?;
    println!(
        "{}",
        format!("{} will be replaced and restarted once it exits", service.config().product)
            .green()
    );
    println!("Failures are logged to {}", service.script_log_path().display());
    Ok(())
}
