//! Test utilities for the FKey updater
//!
//! Helpers shared by unit tests and the integration suite:
//! - [`TestHttpServer`] serving canned HTTP responses on a local port
//! - [`ZipFixture`] for building release archives
//! - [`FakeVersionSource`] for driving the update cache without a network
//!
//! # Example
//!
//! ```rust,no_run
//! use fkey_updater::test_utils::{CannedResponse, TestHttpServer, ZipFixture};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = TestHttpServer::start().await?;
//! server.route("/pkg.zip", CannedResponse::ok(ZipFixture::portable("FKey").to_bytes()?));
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod http;
pub mod source;

pub use fixtures::{ZipFixture, fake_executable};
pub use http::{CannedResponse, TestHttpServer};
pub use source::FakeVersionSource;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG` if it is set, otherwise
/// leaves logging off. Safe to call from every test.
///
/// ```bash
/// RUST_LOG=fkey_updater=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
