//! Error types for the Cellar engine.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] cellar_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The WAL is structurally invalid.
    #[error("WAL corruption: {message}")]
    WalCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A WAL record failed its checksum.
    #[error("checksum mismatch at offset {offset}: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch {
        /// Offset of the damaged record.
        offset: u64,
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record.
        actual: u32,
    },

    /// Another process (or another open store) holds the directory lock.
    #[error("store locked: {} is already open", path.display())]
    StoreLocked {
        /// The contended directory.
        path: PathBuf,
    },

    /// The path cannot host a store.
    #[error("invalid store path: {message}")]
    InvalidPath {
        /// Why the path was rejected.
        message: String,
    },

    /// An argument was rejected before touching storage.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,
}

impl CoreError {
    /// Creates a WAL corruption error.
    pub fn wal_corruption(message: impl Into<String>) -> Self {
        Self::WalCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}
