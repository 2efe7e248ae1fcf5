//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level byte store.
///
/// Backends only read, append, flush and replace raw bytes. Record framing,
/// checksums and recovery policy live in `cellar_core`.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at
/// - `read_at` returns exactly the bytes previously appended at that offset
/// - after `sync` returns, every appended byte survives process termination
/// - `replace` is all-or-nothing: readers observe the old content or the new
///   content, never a mix
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the range extends past
    /// the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` at the end and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Forces data and metadata to durable storage.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes (the offset of the next append).
    fn size(&self) -> StorageResult<u64>;

    /// Discards every byte at or after `new_size`.
    ///
    /// Used to cut a torn tail off the WAL during recovery.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the entire content with `data`.
    ///
    /// Used by log compaction.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads the whole content.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        self.read_at(0, size as usize)
    }
}
