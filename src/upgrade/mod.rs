//! Self-update pipeline for FKey.
//!
//! The pipeline has three stages that can each be invoked on their own:
//!
//! ```text
//! 1. Check
//!    ├── Serve a cached decision if it is younger than the check interval
//!    └── Otherwise fetch the VERSION file and compare it with the running version
//!
//! 2. Download
//!    └── Stream the release archive to the temp directory, reporting progress
//!
//! 3. Install
//!    ├── Extract the archive (flattened) into a scratch directory
//!    ├── Locate the new executable
//!    ├── Write a platform replacement script
//!    └── Launch the script detached; the caller then exits
//! ```
//!
//! The detached script waits for the old executable to become deletable,
//! copies the new one over it, relaunches the application and removes the
//! archive, the scratch directory and itself.
//!
//! # Core Components
//!
//! - [`UpdaterService`]: entry point owning the configuration and the decision cache
//! - [`VersionSource`] / [`HttpVersionSource`]: where the latest version comes from
//! - [`ArtifactDownloader`]: streaming download with progress callbacks
//! - [`ArchiveExtractor`]: flattening zip extraction
//! - [`SelfReplaceOrchestrator`] / [`Platform`]: script generation and launch
//!
//! # Examples
//!
//! ```rust,no_run
//! use fkey_updater::config::UpdaterConfig;
//! use fkey_updater::upgrade::UpdaterService;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = UpdaterService::new(UpdaterConfig::new("1.2.0"))?;
//! let decision = service.check_for_updates(false).await?;
//! println!("{}", decision.summary());
//! # Ok(())
//! # }
//! ```

pub mod decision;
pub mod download;
pub mod extract;
pub mod install;
pub mod platform;
pub mod service;
pub mod source;
pub mod version;

pub use decision::UpdateDecision;
pub use download::{ArtifactDownloader, DownloadedArtifact};
pub use extract::{ArchiveExtractor, ExtractionReport};
pub use install::{InstallPhase, PreparedInstall, SelfReplaceOrchestrator};
pub use platform::{Platform, ReplacementPlan};
pub use service::{CheckCache, UpdaterService};
pub use source::{HttpVersionSource, VersionSource};
pub use version::{Version, is_newer, strip_v_prefix};
