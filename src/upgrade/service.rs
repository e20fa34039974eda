use crate::config::UpdaterConfig;
use crate::core::Result;
use crate::upgrade::decision::UpdateDecision;
use crate::upgrade::download::{ArtifactDownloader, DownloadedArtifact};
use crate::upgrade::install::SelfReplaceOrchestrator;
use crate::upgrade::source::{HttpVersionSource, VersionSource};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// A decision together with the time it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckCache {
    /// The cached decision.
    pub decision: UpdateDecision,
    /// When the decision was built.
    pub checked_at: DateTime<Utc>,
}

impl CheckCache {
    /// Stamp `decision` with the current time.
    #[must_use]
    pub fn new(decision: UpdateDecision) -> Self {
        Self {
            decision,
            checked_at: Utc::now(),
        }
    }

    /// Whether the entry is younger than `ttl`.
    ///
    /// An entry stamped in the future (the clock moved backwards) is stale.
    #[must_use]
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now() - self.checked_at;
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age >= chrono::Duration::zero() && age < ttl,
            Err(_) => age >= chrono::Duration::zero(),
        }
    }
}

/// Entry point of the update pipeline.
///
/// Owns the configuration, the version source, the downloader, the install
/// orchestrator and the decision cache. Construct one per application and
/// share it (e.g. behind an `Arc`); there is no global instance.
///
/// Each stage can be invoked on its own: checking never downloads, and
/// downloading never installs.
///
/// # Examples
///
/// ```rust,no_run
/// use fkey_updater::config::UpdaterConfig;
/// use fkey_updater::upgrade::UpdaterService;
///
/// # async fn example() -> anyhow::Result<()> {
/// let service = UpdaterService::new(UpdaterConfig::new("1.2.0"))?;
/// let decision = service.check_for_updates(false).await?;
/// if decision.available {
///     let artifact = service
///         .download_update(&decision.download_url, Some(|done: u64, total: Option<u64>| {
///             println!("{done} / {total:?}");
///         }))
///         .await?;
///     let script = service.install_update(&artifact.path).await?;
///     service.run_update_script(&script)?;
///     std::process::exit(0);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct UpdaterService<S = HttpVersionSource> {
    config: UpdaterConfig,
    source: S,
    downloader: ArtifactDownloader,
    orchestrator: SelfReplaceOrchestrator,
    cache: Mutex<Option<CheckCache>>,
}

impl UpdaterService<HttpVersionSource> {
    /// Create a service reading the version file described by `config`.
    pub fn new(config: UpdaterConfig) -> Result<Self> {
        let source = HttpVersionSource::new(&config)?;
        Self::with_source(config, source)
    }
}

impl<S: VersionSource> UpdaterService<S> {
    /// Create a service with a custom [`VersionSource`].
    pub fn with_source(config: UpdaterConfig, source: S) -> Result<Self> {
        let downloader = ArtifactDownloader::new(&config.user_agent)?;
        let mut orchestrator = SelfReplaceOrchestrator::new(config.product.clone());
        if let Some(target) = &config.target_executable {
            orchestrator = orchestrator.with_current_executable(target.clone());
        }

        Ok(Self {
            config,
            source,
            downloader,
            orchestrator,
            cache: Mutex::new(None),
        })
    }

    /// Put downloads, the scratch directory and the script under `dir`.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.downloader = self.downloader.with_temp_dir(dir.clone());
        self.orchestrator = self.orchestrator.with_temp_dir(dir);
        self
    }

    /// Replace the install orchestrator.
    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: SelfReplaceOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// The configured version of the running application.
    #[must_use]
    pub fn current_version(&self) -> &str {
        &self.config.current_version
    }

    /// The configuration this service was built with.
    #[must_use]
    pub const fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Decide whether an update is available.
    ///
    /// Without `force`, a cached decision younger than the check interval is
    /// returned without network access. Otherwise the latest version is
    /// fetched, a new decision is built and cached, and returned.
    ///
    /// The cache lock is held for the whole read-fetch-write sequence, so
    /// concurrent callers are serialized and share one fetch.
    ///
    /// # Errors
    ///
    /// Propagates [`VersionSource::fetch_latest`] failures. The cache is left
    /// untouched on failure, so an older decision stays available to later
    /// non-forced checks.
    pub async fn check_for_updates(&self, force: bool) -> Result<UpdateDecision> {
        let mut cache = self.cache.lock().await;

        if !force
            && let Some(entry) = cache.as_ref()
            && entry.is_fresh(self.config.check_interval())
        {
            debug!("Using cached update decision from {}", entry.checked_at);
            return Ok(entry.decision.clone());
        }

        let latest = self.source.fetch_latest().await?;
        let decision = UpdateDecision::build(&self.config, &latest);

        if decision.available {
            info!("Update available: {} -> {}", decision.current_version, decision.latest_version);
        } else {
            debug!("Already on latest version {}", decision.current_version);
        }

        *cache = Some(CheckCache::new(decision.clone()));
        Ok(decision)
    }

    /// The cached decision and its timestamp, fresh or not.
    pub async fn cached(&self) -> Option<CheckCache> {
        self.cache.lock().await.clone()
    }

    /// Forget the cached decision.
    pub async fn clear_cache(&self) {
        *self.cache.lock().await = None;
    }

    /// Download the release archive at `url`.
    ///
    /// See [`ArtifactDownloader::download`].
    pub async fn download_update<F>(
        &self,
        url: &str,
        on_progress: Option<F>,
    ) -> Result<DownloadedArtifact>
    where
        F: FnMut(u64, Option<u64>),
    {
        self.downloader.download(url, on_progress).await
    }

    /// Prepare the replacement script for `archive` and return its path.
    ///
    /// See [`SelfReplaceOrchestrator::prepare_install`].
    pub async fn install_update(&self, archive: &Path) -> Result<PathBuf> {
        self.orchestrator.prepare_install(archive).await
    }

    /// Launch a prepared replacement script detached.
    ///
    /// The caller should exit right after this returns.
    pub fn run_update_script(&self, script: &Path) -> Result<()> {
        self.orchestrator.launch_install(script)
    }

    /// Log the replacement script writes its failure reason to.
    #[must_use]
    pub fn script_log_path(&self) -> PathBuf {
        self.orchestrator.log_path()
    }

    /// Open a release page in the default browser.
    pub fn open_release_page(&self, url: &str) -> Result<()> {
        self.orchestrator.open_url(url)
    }
}
