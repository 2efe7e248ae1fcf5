//! In-memory storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;

/// A byte store that lives entirely in memory.
///
/// Backs stores opened with the in-memory flag; everything is lost on drop.
/// `flush` and `sync` are no-ops.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    bytes: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend preloaded with `bytes`.
    ///
    /// Handy for replaying hand-crafted or damaged logs in tests.
    #[must_use]
    pub fn with_data(bytes: Vec<u8>) -> Self {
        Self {
            bytes: RwLock::new(bytes),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.read().clone()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let bytes = self.bytes.read();
        let size = bytes.len() as u64;
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(bytes[offset as usize..end as usize].to_vec())
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let mut bytes = self.bytes.write();
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(data);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.bytes.read().len() as u64)
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        let mut bytes = self.bytes.write();
        let size = bytes.len() as u64;
        if new_size > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        bytes.truncate(new_size as usize);
        Ok(())
    }

    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        *self.bytes.write() = data.to_vec();
        Ok(())
    }
}
