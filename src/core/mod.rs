//! Core types shared across the update pipeline.
//!
//! At the moment this is the error taxonomy ([`UpdateError`], [`ErrorKind`])
//! and the CLI-facing [`ErrorContext`] rendering.

pub mod error;

pub use error::{ErrorContext, ErrorKind, Result, UpdateError, user_friendly_error};
