//! Store facade and recovery.

use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::keyspace::Keyspace;
use crate::transaction::{ReadTxn, WriteTxn};
use crate::types::{KeyValue, SequenceNumber};
use crate::wal::{WalManager, WalOp, WalReader, WalRecord};
use cellar_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Point-in-time figures about an open store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of live keys.
    pub keys: usize,
    /// Key plus value bytes of the live keys.
    pub live_bytes: u64,
    /// Current size of the WAL.
    pub wal_bytes: u64,
    /// Last committed sequence number.
    pub sequence: SequenceNumber,
}

/// An open key-value store.
///
/// All methods take `&self`; a store can be shared between threads behind an
/// `Arc`. Reads run against snapshots and never wait for writers. Updates
/// are serialized by a per-store writer lock.
///
/// # Opening a store
///
/// ```rust
/// use cellar_core::{Config, Store};
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = Store::open(dir.path(), Config::default()).unwrap();
/// store.set(b"greeting", b"hello").unwrap();
/// store.sync().unwrap();
/// store.close().unwrap();
///
/// let store = Store::open(dir.path(), Config::default()).unwrap();
/// assert_eq!(store.get(b"greeting").unwrap(), Some(b"hello".to_vec()));
/// ```
pub struct Store {
    config: Config,
    /// Directory lock. `None` for in-memory stores and after close.
    dir: Mutex<Option<StoreDir>>,
    path: Option<PathBuf>,
    wal: WalManager,
    keyspace: Keyspace,
    /// Writer lock; guards the last committed sequence.
    writer: Mutex<SequenceNumber>,
    closed: AtomicBool,
}

impl Store {
    /// Opens (or creates) the store in directory `path`.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if the path cannot host a store
    /// - `StoreLocked` if the store is already open
    /// - `WalCorruption` / `ChecksumMismatch` if the log is damaged before
    ///   its tail
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let backend = FileBackend::open(&dir.wal_path())?;
        let store = Self::open_with_backend(config, Box::new(backend), Some(dir))?;
        debug!(path = %path.display(), sequence = %store.sequence(), "opened store");
        Ok(store)
    }

    /// Opens a fresh store that lives only in memory.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open_with_backend(Config::default(), Box::new(InMemoryBackend::new()), None)
    }

    /// Opens a store over an arbitrary WAL backend.
    ///
    /// `dir`, when given, is kept locked until the store closes.
    pub fn open_with_backend(
        config: Config,
        backend: Box<dyn StorageBackend>,
        dir: Option<StoreDir>,
    ) -> CoreResult<Self> {
        let wal = WalManager::new(backend, config.sync_on_commit);
        let keyspace = Keyspace::default();
        let last = Self::recover(&wal, &keyspace)?;

        let store = Self {
            path: dir.as_ref().map(|d| d.path().to_path_buf()),
            dir: Mutex::new(dir),
            config,
            wal,
            keyspace,
            writer: Mutex::new(last),
            closed: AtomicBool::new(false),
        };
        store.maybe_compact_on_open()?;
        Ok(store)
    }

    /// Replays the WAL into `keyspace`, returning the last sequence.
    fn recover(wal: &WalManager, keyspace: &Keyspace) -> CoreResult<SequenceNumber> {
        let image = wal.read_all()?;
        let mut reader = WalReader::new(&image);
        let mut last: Option<SequenceNumber> = None;
        let mut records = 0usize;

        for item in reader.by_ref() {
            let (offset, record) = item?;
            let WalRecord::Commit { sequence, ops } = record;
            if let Some(prev) = last {
                if sequence <= prev {
                    return Err(CoreError::wal_corruption(format!(
                        "sequence {sequence} at offset {offset} does not follow {prev}"
                    )));
                }
            }
            keyspace.apply(sequence, ops);
            last = Some(sequence);
            records += 1;
        }

        if reader.is_torn() {
            let valid = reader.valid_len();
            warn!(
                valid_len = valid,
                dropped = image.len() as u64 - valid,
                "truncating torn WAL tail"
            );
            wal.truncate(valid)?;
        }

        keyspace.sweep();
        debug!(records, "recovered WAL");
        Ok(last.unwrap_or_default())
    }

    fn maybe_compact_on_open(&self) -> CoreResult<()> {
        let ratio = self.config.compact_on_open_ratio;
        if ratio <= 0.0 {
            return Ok(());
        }
        let wal_bytes = self.wal.size()?;
        if wal_bytes == 0 || wal_bytes < self.config.compact_min_wal_size {
            return Ok(());
        }

        let (_, live_bytes) = self.keyspace.footprint(self.keyspace.committed());
        if (live_bytes as f64) / (wal_bytes as f64) < ratio {
            self.compact()?;
        }
        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    /// Runs `f` against a consistent snapshot.
    pub fn view<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&ReadTxn<'_>) -> CoreResult<T>,
    {
        self.ensure_open()?;
        let txn = ReadTxn::new(self.keyspace.pin());
        f(&txn)
    }

    /// Runs `f` in a write transaction and commits its writes atomically.
    ///
    /// If `f` fails nothing is written. Updates are serialized: `f` runs
    /// while holding the store's writer lock, so it sees every earlier
    /// commit and no later one.
    pub fn update<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> CoreResult<T>,
    {
        let mut last = self.writer.lock();
        self.ensure_open()?;

        let mut txn = WriteTxn::new(self.keyspace.pin());
        let out = f(&mut txn)?;
        if txn.is_empty() {
            return Ok(out);
        }

        let sequence = last.next();
        let record = WalRecord::Commit {
            sequence,
            ops: txn.into_ops(),
        };
        self.wal.append(&record)?;

        let WalRecord::Commit { ops, .. } = record;
        self.keyspace.apply(sequence, ops);
        *last = sequence;
        Ok(out)
    }

    /// Returns the value under `key`.
    pub fn get(&self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        self.view(|txn| Ok(txn.get(key)))
    }

    /// Stores `value` under `key` in its own transaction.
    pub fn set(&self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        self.update(|txn| txn.set(key, value))
    }

    /// Removes `key` in its own transaction. Absent keys are fine.
    pub fn delete(&self, key: &[u8]) -> CoreResult<()> {
        self.update(|txn| txn.delete(key))
    }

    /// Collects every pair whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: &[u8]) -> CoreResult<Vec<KeyValue>> {
        self.view(|txn| Ok(txn.scan_prefix(prefix)))
    }

    /// Forces every committed update to durable storage.
    pub fn sync(&self) -> CoreResult<()> {
        self.ensure_open()?;
        self.wal.sync()?;
        debug!("synced store");
        Ok(())
    }

    /// Syncs and closes the store, releasing the directory lock.
    ///
    /// Waits for an in-flight update. If the final sync fails the store stays
    /// open and the call can be retried; once it succeeds every further call
    /// returns `StoreClosed`.
    pub fn close(&self) -> CoreResult<()> {
        let _writer = self.writer.lock();
        self.ensure_open()?;

        self.wal.sync()?;
        self.closed.store(true, Ordering::Release);
        drop(self.dir.lock().take());
        debug!(path = ?self.path, "closed store");
        Ok(())
    }

    /// Whether [`Store::close`] has completed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Rewrites the WAL as a single record holding the live state.
    ///
    /// Returns the number of bytes reclaimed.
    pub fn compact(&self) -> CoreResult<u64> {
        let last = self.writer.lock();
        self.ensure_open()?;

        let before = self.wal.size()?;
        let ops = self
            .keyspace
            .live_entries(*last)
            .into_iter()
            .map(|(key, value)| WalOp::Put { key, value })
            .collect();
        let records = if *last == SequenceNumber::default() {
            Vec::new()
        } else {
            vec![WalRecord::Commit {
                sequence: *last,
                ops,
            }]
        };
        self.wal.rewrite(&records)?;
        self.keyspace.sweep();

        let after = self.wal.size()?;
        debug!(before, after, sequence = last.as_u64(), "compacted WAL");
        Ok(before.saturating_sub(after))
    }

    /// Returns current store figures.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        self.ensure_open()?;
        let snapshot = self.keyspace.pin();
        let sequence = snapshot.seq();
        let (keys, live_bytes) = self.keyspace.footprint(sequence);
        Ok(StoreStats {
            keys,
            live_bytes,
            wal_bytes: self.wal.size()?,
            sequence,
        })
    }

    /// Last committed sequence number.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.keyspace.committed()
    }

    /// Directory of a disk-backed store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.wal.sync();
        }
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("sequence", &self.sequence())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let store = Store::open_in_memory().unwrap();
        store.set(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));

        store.set(b"k", b"w").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"w".to_vec()));

        store.delete(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
        store.delete(b"never").unwrap();
    }

    #[test]
    fn empty_value_is_distinct_from_absent() {
        let store = Store::open_in_memory().unwrap();
        store.set(b"k", b"").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn empty_key_is_rejected() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.set(b"", b"v"),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert_eq!(store.sequence(), SequenceNumber::default());
    }

    #[test]
    fn failed_update_writes_nothing() {
        let store = Store::open_in_memory().unwrap();
        let result: CoreResult<()> = store.update(|txn| {
            txn.set(b"a", b"1")?;
            Err(CoreError::invalid_argument("abort"))
        });
        assert!(result.is_err());
        assert_eq!(store.get(b"a").unwrap(), None);
        assert_eq!(store.stats().unwrap().wal_bytes, 0);
    }

    #[test]
    fn empty_update_commits_nothing() {
        let store = Store::open_in_memory().unwrap();
        store.update(|_| Ok(())).unwrap();
        assert_eq!(store.sequence(), SequenceNumber::default());
    }

    #[test]
    fn view_is_isolated_from_later_commits() {
        let store = Store::open_in_memory().unwrap();
        store.set(b"a", b"1").unwrap();

        store
            .view(|txn| {
                store.set(b"a", b"2").unwrap();
                store.set(b"b", b"3").unwrap();
                assert_eq!(txn.get(b"a"), Some(b"1".to_vec()));
                assert_eq!(txn.scan_prefix(b"").len(), 1);
                Ok(())
            })
            .unwrap();

        assert_eq!(store.scan_prefix(b"").unwrap().len(), 2);
    }

    #[test]
    fn scan_prefix_is_ordered() {
        let store = Store::open_in_memory().unwrap();
        store
            .update(|txn| {
                txn.set(b"b", b"3")?;
                txn.set(b"ab", b"2")?;
                txn.set(b"a", b"1")
            })
            .unwrap();

        let keys: Vec<_> = store
            .scan_prefix(b"a")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"ab".to_vec()]);
    }

    #[test]
    fn closed_store_rejects_calls() {
        let store = Store::open_in_memory().unwrap();
        store.close().unwrap();

        assert!(store.is_closed());
        assert!(matches!(store.get(b"k"), Err(CoreError::StoreClosed)));
        assert!(matches!(store.set(b"k", b"v"), Err(CoreError::StoreClosed)));
        assert!(matches!(store.sync(), Err(CoreError::StoreClosed)));
        assert!(matches!(store.close(), Err(CoreError::StoreClosed)));
    }

    #[test]
    fn compact_keeps_live_state() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..50u8 {
            store.set(b"k", &[i]).unwrap();
        }
        store.set(b"gone", b"x").unwrap();
        store.delete(b"gone").unwrap();

        let before = store.stats().unwrap();
        let reclaimed = store.compact().unwrap();
        let after = store.stats().unwrap();

        assert!(reclaimed > 0);
        assert_eq!(after.wal_bytes, before.wal_bytes - reclaimed);
        assert_eq!(after.keys, 1);
        assert_eq!(after.sequence, before.sequence);
        assert_eq!(store.get(b"k").unwrap(), Some(vec![49]));
    }

    #[test]
    fn stats_track_live_keys() {
        let store = Store::open_in_memory().unwrap();
        store.set(b"ab", b"cd").unwrap();
        store.set(b"e", b"").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.live_bytes, 5);
        assert_eq!(stats.sequence, SequenceNumber::new(2));
        assert!(stats.wal_bytes > 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let store = std::sync::Arc::new(Store::open_in_memory().unwrap());
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .update(|txn| {
                                let n = txn
                                    .get(b"counter")
                                    .map(|v| u64::from_le_bytes(v.try_into().unwrap()))
                                    .unwrap_or(0);
                                std::thread::yield_now();
                                txn.set(b"counter", &(n + 1).to_le_bytes())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let value = store.get(b"counter").unwrap().unwrap();
        assert_eq!(u64::from_le_bytes(value.try_into().unwrap()), 400);
        assert_eq!(store.sequence(), SequenceNumber::new(400));
    }
}
