//! WAL writer.

use crate::error::CoreResult;
use crate::wal::record::WalRecord;
use cellar_storage::StorageBackend;
use parking_lot::Mutex;

/// Owns the WAL backend and serializes access to it.
pub struct WalManager {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_commit: bool,
}

impl WalManager {
    /// Creates a WAL manager over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_commit,
        }
    }

    /// Appends a record, returning its offset.
    ///
    /// With `sync_on_commit` the record is fsynced before this returns.
    pub fn append(&self, record: &WalRecord) -> CoreResult<u64> {
        let frame = record.encode_frame()?;

        let mut backend = self.backend.lock();
        let before = backend.size()?;
        let written = backend.append(&frame).and_then(|offset| {
            if self.sync_on_commit {
                backend.sync()?;
            } else {
                backend.flush()?;
            }
            Ok(offset)
        });

        match written {
            Ok(offset) => Ok(offset),
            Err(e) => {
                // A half-written frame would read as mid-log corruption once
                // later records land after it.
                let _ = backend.truncate(before);
                Err(e.into())
            }
        }
    }

    /// Forces everything appended so far to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the WAL size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Reads the whole WAL image.
    pub fn read_all(&self) -> CoreResult<Vec<u8>> {
        Ok(self.backend.lock().read_all()?)
    }

    /// Cuts the WAL at `len` (drops a torn tail).
    pub fn truncate(&self, len: u64) -> CoreResult<()> {
        self.backend.lock().truncate(len)?;
        Ok(())
    }

    /// Atomically replaces the WAL with `records`.
    pub fn rewrite(&self, records: &[WalRecord]) -> CoreResult<()> {
        let mut image = Vec::new();
        for record in records {
            image.extend_from_slice(&record.encode_frame()?);
        }
        self.backend.lock().replace(&image)?;
        Ok(())
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("sync_on_commit", &self.sync_on_commit)
            .finish_non_exhaustive()
    }
}
