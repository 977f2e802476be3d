//! Error types for the report module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while producing a report file.
///
/// Each step of the durable write has its own variant so callers can tell
/// exactly where it stopped. None of them are retried.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Destination path could not be made absolute.
    #[error("Failed to resolve path: {path}")]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the destination directory.
    #[error("Failed to create directory: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create the temporary file.
    #[error("Failed to create temp file in {dir}")]
    CreateTemp {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize rows.
    #[error("Failed to encode report: {0}")]
    Encode(#[from] csv::Error),

    /// Failed to write to the temporary file.
    #[error("Failed to write temp file: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush the temporary file.
    #[error("Failed to flush temp file: {path}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to force the temporary file to storage.
    #[error("Failed to sync temp file: {path}")]
    Sync {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to rename the temporary file onto the destination.
    #[error("Failed to rename {from} to {to}")]
    Persist {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set permissions on the committed file.
    #[error("Failed to set permissions on {path}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking write task did not complete.
    #[error("Write task failed: {0}")]
    Join(String),
}
