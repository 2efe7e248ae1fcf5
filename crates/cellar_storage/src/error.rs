//! Error types for storage backends.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by a [`crate::StorageBackend`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A read extended past the end of the stored bytes.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: usize,
        /// Current size of the store.
        size: u64,
    },

    /// A truncation asked to grow the store.
    #[error("cannot truncate to {requested} bytes, store holds {size}")]
    TruncateBeyondEnd {
        /// Requested new size.
        requested: u64,
        /// Current size of the store.
        size: u64,
    },
}
