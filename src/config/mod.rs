//! Configuration for the updater.
//!
//! [`UpdaterConfig`] carries every value the pipeline consumes from the
//! embedding application. It can be built in code or loaded from a TOML file;
//! the CLI does the latter, falling back to [`UpdaterConfig::default_path`].

mod updater;

pub use updater::UpdaterConfig;
