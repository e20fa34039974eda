//! Terminal helpers shared by the CLI.
//!
//! - [`progress`] - Download progress bars and spinners

pub mod progress;

pub use progress::DownloadProgress;
