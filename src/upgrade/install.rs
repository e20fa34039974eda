//! Self-replacement of the running executable.
//!
//! Installation is a two-phase handoff:
//!
//! ```text
//! this process:   Idle -> Extracting -> LocatingExecutable -> ScriptGenerated -> Launched
//! detached script:  (old process exits) -> Swapped -> NewProcessStarted -> SelfCleanup
//! ```
//!
//! Only the first phase runs here. Once the script is launched there is no
//! channel back: the script notices the old process is gone because deleting
//! its executable stops failing, not because anything signals it.

use crate::constants::{EXTRACT_DIR_NAME, SCRIPT_LOG_NAME};
use crate::core::{Result, UpdateError};
use crate::upgrade::extract::ArchiveExtractor;
use crate::upgrade::platform::{Platform, ReplacementPlan};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Steps of one install attempt.
///
/// Steps after [`InstallPhase::Launched`] happen inside the detached script
/// and are never observed by this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallPhase {
    /// Nothing started yet.
    Idle,
    /// Unpacking the archive into the scratch directory.
    Extracting,
    /// Searching the scratch directory for the new executable.
    LocatingExecutable,
    /// Replacement script written to disk.
    ScriptGenerated,
    /// Replacement script started as a detached process.
    Launched,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::LocatingExecutable => "locating executable",
            Self::ScriptGenerated => "script generated",
            Self::Launched => "launched",
        };
        f.write_str(name)
    }
}

/// Result of a successful [`SelfReplaceOrchestrator::prepare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedInstall {
    /// Where the replacement script was written.
    pub script_path: PathBuf,
    /// The paths embedded in the script.
    pub plan: ReplacementPlan,
}

/// Prepares and launches the replacement of the running executable.
#[derive(Debug, Clone)]
pub struct SelfReplaceOrchestrator {
    platform: Platform,
    product: String,
    temp_dir: PathBuf,
    current_executable: Option<PathBuf>,
}

impl SelfReplaceOrchestrator {
    /// Create an orchestrator for the host platform using the system temp directory.
    pub fn new(product: impl Into<String>) -> Self {
        Self {
            platform: Platform::current(),
            product: product.into(),
            temp_dir: std::env::temp_dir(),
            current_executable: None,
        }
    }

    /// Use a specific platform variant.
    #[must_use]
    pub const fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Put the scratch directory and script under `dir`.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Replace `path` instead of the running executable.
    #[must_use]
    pub fn with_current_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.current_executable = Some(path.into());
        self
    }

    /// The platform capability in use.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        self.platform
    }

    /// Scratch directory the archive is extracted into.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.temp_dir.join(EXTRACT_DIR_NAME)
    }

    /// Where the replacement script is written.
    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.temp_dir.join(self.platform.script_file_name())
    }

    /// Log the replacement script appends its failure reason to.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.temp_dir.join(SCRIPT_LOG_NAME)
    }

    /// Extract `archive`, locate the new executable and write the
    /// replacement script. Returns the script path.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::Io`] for filesystem failures (scratch state is left
    ///   in place for diagnosis)
    /// - [`UpdateError::CorruptArchive`] if the archive cannot be parsed
    /// - [`UpdateError::NotFound`] if no native executable is in the archive
    pub async fn prepare_install(&self, archive: &Path) -> Result<PathBuf> {
        self.prepare(archive).await.map(|prepared| prepared.script_path)
    }

    /// Like [`prepare_install`](Self::prepare_install) but also returns the plan.
    pub async fn prepare(&self, archive: &Path) -> Result<PreparedInstall> {
        let current_executable = match &self.current_executable {
            Some(path) => path.clone(),
            None => self.platform.current_executable()?,
        };
        let archive =
            std::path::absolute(archive).map_err(|e| UpdateError::io("resolve", archive, e))?;
        let scratch_dir = self.scratch_dir();

        enter(InstallPhase::Extracting);
        reset_dir(&scratch_dir).await?;
        let extract_from = archive.clone();
        let extract_into = scratch_dir.clone();
        run_blocking(&scratch_dir, move || {
            ArchiveExtractor::new().extract(&extract_from, &extract_into).map(|_| ())
        })
        .await?;

        enter(InstallPhase::LocatingExecutable);
        let platform = self.platform;
        let search_root = scratch_dir.clone();
        let new_executable =
            run_blocking(&scratch_dir, move || Ok(find_executable(platform, &search_root)))
                .await?
                .ok_or_else(|| UpdateError::NotFound {
                    what: "an executable in the update package".to_string(),
                })?;
        debug!("New executable: {}", new_executable.display());

        let plan = ReplacementPlan {
            product: self.product.clone(),
            current_executable,
            new_executable,
            archive,
            scratch_dir,
        };

        let script_path = self.script_path();
        remove_stale_log(&self.log_path()).await?;
        write_script(&script_path, &self.platform.render_script(&plan)).await?;
        enter(InstallPhase::ScriptGenerated);
        info!("Replacement script written to {}", script_path.display());

        Ok(PreparedInstall {
            script_path,
            plan,
        })
    }

    /// Start the replacement script as a detached process.
    ///
    /// The child is not waited on. The caller should exit promptly so the
    /// script can replace the executable.
    pub fn launch_install(&self, script: &Path) -> Result<()> {
        self.platform
            .launch_command(script)
            .spawn()
            .map_err(|e| UpdateError::io("launch", script, e))?;

        enter(InstallPhase::Launched);
        info!("Replacement script launched; exit now to let it finish");
        Ok(())
    }

    /// Open `url` in the platform's default handler without waiting.
    pub fn open_url(&self, url: &str) -> Result<()> {
        debug!("Opening {}", url);
        self.platform
            .open_url_command(url)
            .spawn()
            .map(|_| ())
            .map_err(|e| UpdateError::io("open", url, e))
    }
}

fn enter(phase: InstallPhase) {
    debug!("Install phase: {}", phase);
}

/// Remove any stale directory at `dir` and create it empty.
async fn reset_dir(dir: &Path) -> Result<()> {
    let exists = fs::try_exists(dir).await.map_err(|e| UpdateError::io("inspect", dir, e))?;
    if exists {
        fs::remove_dir_all(dir).await.map_err(|e| UpdateError::io("remove", dir, e))?;
    }
    fs::create_dir_all(dir).await.map_err(|e| UpdateError::io("create directory", dir, e))
}

async fn remove_stale_log(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(UpdateError::io("remove", path, e))
        }
        _ => Ok(()),
    }
}

async fn run_blocking<T, F>(path: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| UpdateError::io("extract", path, std::io::Error::other(e)))?
}

/// First native executable under `root`, visiting entries in name order.
fn find_executable(platform: Platform, root: &Path) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .find(|path| platform.is_native_executable(path))
}

async fn write_script(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).await.map_err(|e| UpdateError::io("write", path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .await
            .map_err(|e| UpdateError::io("set permissions on", path, e))?;
    }

    Ok(())
}
