//! Error handling for the updater
//!
//! This module provides the error taxonomy shared by every stage of the update
//! pipeline and the user-friendly rendering the CLI uses to present failures.
//! The error system follows two rules:
//! 1. **Strongly-typed errors** so callers can tell a network failure from a
//!    corrupt archive and pick a recovery action
//! 2. **User-friendly messages** with a suggestion for CLI users
//!
//! # Error Categories
//!
//! - [`UpdateError::Network`] - transport or timeout failure; retry later, a stale
//!   cached decision may still be served
//! - [`UpdateError::NotFound`] - an expected resource is absent (version file, or no
//!   executable inside the downloaded archive)
//! - [`UpdateError::Server`] - the server answered with a non-success status
//! - [`UpdateError::CorruptArchive`] - the downloaded archive cannot be parsed; the
//!   file is left in place for inspection
//! - [`UpdateError::Io`] - local filesystem failure; partial state is left in place
//! - [`UpdateError::Config`] - the configuration file is unreadable or invalid
//!
//! No stage turns an error into "no update available". Absence of an update is
//! only ever reported as `available == false` on a successful decision.
//!
//! # Examples
//!
//! ```rust,no_run
//! use fkey_updater::core::{ErrorKind, UpdateError, user_friendly_error};
//!
//! let error = UpdateError::NotFound {
//!     what: "version file".to_string(),
//! };
//! assert_eq!(error.kind(), ErrorKind::NotFound);
//!
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by every library operation.
pub type Result<T, E = UpdateError> = std::result::Result<T, E>;

/// The main error type for update operations
///
/// Each variant carries enough context (URL, path, operation) for a log line
/// or an error dialog to be useful on its own.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Transport-level failure: DNS, connect, TLS, or timeout.
    #[error("Network error during {operation}: {source}")]
    Network {
        /// What was being attempted (e.g., "version check", "download")
        operation: String,
        /// The underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// An expected resource does not exist.
    #[error("Not found: {what}")]
    NotFound {
        /// Description of the missing resource
        what: String,
    },

    /// The server returned a non-success HTTP status.
    #[error("Server returned HTTP {status} for {url}")]
    Server {
        /// The requested URL
        url: String,
        /// The HTTP status code
        status: u16,
    },

    /// The archive container could not be parsed.
    #[error("Corrupt archive {}: {source}", path.display())]
    CorruptArchive {
        /// Path to the archive that failed to parse
        path: PathBuf,
        /// The underlying zip error
        #[source]
        source: zip::result::ZipError,
    },

    /// Local filesystem failure.
    #[error("Failed to {operation} {}: {source}", path.display())]
    Io {
        /// The operation that failed (e.g., "create", "write", "extract")
        operation: String,
        /// The path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },
}

/// Coarse classification of an [`UpdateError`].
///
/// Embedding UIs match on this to present check, download and install
/// failures distinctly, since the recovery action differs per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure; recoverable by retrying later.
    Network,
    /// Resource absent; hard stop for this attempt.
    NotFound,
    /// Non-success status from the server.
    Server,
    /// Archive failed to parse.
    CorruptArchive,
    /// Local filesystem failure.
    Io,
    /// Invalid configuration.
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::NotFound => "not found",
            Self::Server => "server",
            Self::CorruptArchive => "corrupt archive",
            Self::Io => "io",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

impl UpdateError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Server { .. } => ErrorKind::Server,
            Self::CorruptArchive { .. } => ErrorKind::CorruptArchive,
            Self::Io { .. } => ErrorKind::Io,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether retrying the same operation later can reasonably succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn network(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            operation: operation.into(),
            source,
        }
    }

    pub(crate) fn io(
        operation: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }
}

/// Error wrapper carrying a user-facing suggestion and details
///
/// `ErrorContext` is what the CLI prints. It keeps the rendered error message
/// and its [`ErrorKind`] (when the failure came from the update pipeline) plus
/// optional guidance.
///
/// # Examples
///
/// ```rust,no_run
/// use fkey_updater::core::ErrorContext;
///
/// let ctx = ErrorContext::message("download interrupted")
///     .with_suggestion("Run the command again")
///     .with_details("The partial file was left in the temp directory");
/// ctx.display();
/// ```
#[derive(Debug)]
pub struct ErrorContext {
    /// The rendered error message
    pub message: String,
    /// Classification, when the error came from the update pipeline
    pub kind: Option<ErrorKind>,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context from an [`UpdateError`] with no suggestion yet.
    #[must_use]
    pub fn new(error: &UpdateError) -> Self {
        Self {
            message: error.to_string(),
            kind: Some(error.kind()),
            suggestion: None,
            details: None,
        }
    }

    /// Create a context from a plain message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    ///
    /// - Error message: Red and bold
    /// - Details: Yellow
    /// - Suggestion: Green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Recognizes [`UpdateError`] anywhere in the `anyhow` chain and tailors the
/// suggestion to its kind. Anything else is rendered with its full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(update_error) = error.chain().find_map(|e| e.downcast_ref::<UpdateError>()) {
        let mut ctx = create_error_context(update_error);
        if error.downcast_ref::<UpdateError>().is_none() {
            // Outer anyhow context names the command that failed
            ctx.details = Some(match ctx.details.take() {
                Some(details) => format!("{error}. {details}"),
                None => error.to_string(),
            });
        }
        return ctx;
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::message(message)
}

fn create_error_context(error: &UpdateError) -> ErrorContext {
    let ctx = ErrorContext::new(error);
    match error {
        UpdateError::Network { .. } => ctx
            .with_suggestion("Check your internet connection and try again later")
            .with_details("The update server could not be reached or did not answer in time"),

        UpdateError::NotFound { what } => ctx
            .with_suggestion("The release may not be published yet. Try again later or download it manually from the release page")
            .with_details(format!("The updater expected {what} but it does not exist")),

        UpdateError::Server { status, .. } => ctx
            .with_suggestion(if *status >= 500 {
                "The server is having trouble. Try again later"
            } else {
                "Check the owner, repository and URL templates in the updater configuration"
            })
            .with_details(format!("HTTP status {status}")),

        UpdateError::CorruptArchive { path, .. } => ctx
            .with_suggestion("Delete the downloaded file and download the update again")
            .with_details(format!("The damaged archive was kept at {} for inspection", path.display())),

        UpdateError::Io { path, .. } => ctx
            .with_suggestion(if cfg!(windows) {
                "Check free disk space and that the file is not open in another program"
            } else {
                "Check free disk space and file permissions with 'ls -la'"
            })
            .with_details(format!("Partial files were left at {} for diagnosis", path.display())),

        UpdateError::Config { .. } => ctx
            .with_suggestion("Fix the updater configuration file or remove it to use the defaults"),
    }
}
