//! CLI error type.

use cellar_core::CoreError;
use cellar_ffi::FfiError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--path` was given.
    #[error("store path required (use --path)")]
    MissingPath,

    /// The store directory does not exist.
    #[error("no store at {}", .0.display())]
    NoStore(PathBuf),

    /// `get` found nothing.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// `verify` found a damaged WAL.
    #[error("verification failed: {0}")]
    VerifyFailed(String),

    /// Engine error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Boundary error.
    #[error(transparent)]
    Boundary(#[from] FfiError),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// JSON output error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
