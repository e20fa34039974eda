//! FKey updater - self-update pipeline for the FKey desktop app
//!
//! Discovers whether a newer FKey release is published, downloads the
//! portable release archive and replaces the running executable in place.
//! The replacement is delegated to a detached platform script because a
//! running executable cannot overwrite itself on every platform.
//!
//! # Architecture Overview
//!
//! ```text
//! UpdaterService
//!  ├── VersionSource        (GET raw VERSION file)
//!  ├── Mutex<CheckCache>    (decision + timestamp, TTL = check interval)
//!  ├── ArtifactDownloader   (streaming download, progress callback)
//!  └── SelfReplaceOrchestrator
//!       ├── ArchiveExtractor (flattening zip extraction)
//!       └── Platform         (executable detection, script rendering, launch)
//! ```
//!
//! # Core Modules
//!
//! - [`upgrade`] - Version comparison, update decision, download, extraction, install
//! - [`config`] - Release coordinates and URL templates (`~/.fkey/updater.toml`)
//! - [`core`] - Error types and user-facing error rendering
//! - [`cli`] - The `fkey-updater` command-line interface
//! - [`utils`] - Progress display
//! - [`constants`] - Timeouts, file names and script limits
//!
//! # Example
//!
//! ```rust,no_run
//! use fkey_updater::config::UpdaterConfig;
//! use fkey_updater::upgrade::UpdaterService;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = UpdaterService::new(UpdaterConfig::new("1.2.0"))?;
//! let decision = service.check_for_updates(false).await?;
//! if decision.available {
//!     let artifact = service.download_update(&decision.download_url, None::<fn(u64, Option<u64>)>).await?;
//!     let script = service.install_update(&artifact.path).await?;
//!     service.run_update_script(&script)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod upgrade;
pub mod utils;

// test_utils is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
