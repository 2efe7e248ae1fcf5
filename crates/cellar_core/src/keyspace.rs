//! Versioned, ordered keyspace.
//!
//! Every key maps to a short chain of versions tagged with the sequence
//! number that wrote them. A reader pinned at sequence `s` sees, per key, the
//! newest version with `seq <= s`. Versions no pinned snapshot can reach are
//! pruned after each commit. Keys that could not be pruned down to a single
//! live version because a snapshot still needed their history are remembered
//! and revisited by the first commit after the horizon moves.

use crate::types::{KeyValue, SequenceNumber};
use crate::wal::WalOp;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
struct Version {
    seq: SequenceNumber,
    /// `None` is a tombstone.
    value: Option<Vec<u8>>,
}

type Chain = Vec<Version>;

fn visible(chain: &Chain, at: SequenceNumber) -> Option<&[u8]> {
    chain
        .iter()
        .rev()
        .find(|v| v.seq <= at)
        .and_then(|v| v.value.as_deref())
}

/// Drops versions hidden from every snapshot at or after `horizon`.
///
/// Returns `true` when the chain no longer holds anything visible.
fn prune(chain: &mut Chain, horizon: SequenceNumber) -> bool {
    if let Some(base) = chain.iter().rposition(|v| v.seq <= horizon) {
        chain.drain(..base);
    }
    chain.len() == 1 && chain[0].value.is_none() && chain[0].seq <= horizon
}

/// A chain holding one live version needs no further pruning.
fn settled(chain: &Chain) -> bool {
    chain.len() == 1 && chain[0].value.is_some()
}

/// Pairs copied out per read-lock acquisition during a prefix walk.
const WALK_CHUNK: usize = 256;

/// Keys whose history outlived the horizon they were last pruned at.
#[derive(Debug, Default)]
struct PendingPrune {
    keys: BTreeSet<Vec<u8>>,
    horizon: SequenceNumber,
}

#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    entries: RwLock<BTreeMap<Vec<u8>, Chain>>,
    /// Pinned snapshot sequences and how many readers hold each.
    pins: Mutex<BTreeMap<SequenceNumber, usize>>,
    committed: AtomicU64,
    pending: Mutex<PendingPrune>,
}

/// A pinned read point. Unpins on drop.
#[derive(Debug)]
pub(crate) struct Snapshot<'a> {
    keyspace: &'a Keyspace,
    seq: SequenceNumber,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn seq(&self) -> SequenceNumber {
        self.seq
    }

    pub(crate) fn keyspace(&self) -> &'a Keyspace {
        self.keyspace
    }
}

impl Drop for Snapshot<'_> {
    fn drop(&mut self) {
        self.keyspace.unpin(self.seq);
    }
}

impl Keyspace {
    pub(crate) fn committed(&self) -> SequenceNumber {
        SequenceNumber::new(self.committed.load(Ordering::Acquire))
    }

    /// Pins the latest committed sequence.
    pub(crate) fn pin(&self) -> Snapshot<'_> {
        let mut pins = self.pins.lock();
        let seq = self.committed();
        *pins.entry(seq).or_insert(0) += 1;
        Snapshot {
            keyspace: self,
            seq,
        }
    }

    fn unpin(&self, seq: SequenceNumber) {
        let mut pins = self.pins.lock();
        if let Some(count) = pins.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&seq);
            }
        }
    }

    /// Oldest sequence any current or future snapshot can read at.
    fn horizon(&self) -> SequenceNumber {
        let pins = self.pins.lock();
        let committed = self.committed();
        pins.keys()
            .next()
            .map_or(committed, |&oldest| oldest.min(committed))
    }

    pub(crate) fn get(&self, key: &[u8], at: SequenceNumber) -> Option<Vec<u8>> {
        self.entries
            .read()
            .get(key)
            .and_then(|chain| visible(chain, at))
            .map(<[u8]>::to_vec)
    }

    /// Calls `f` for every key starting with `prefix`, in key order.
    ///
    /// Pairs are copied out in chunks and the read lock is released before
    /// `f` runs, so commits proceed during a long walk. `at` must be pinned
    /// (or the writer lock held) so no version visible at `at` is pruned
    /// between chunks.
    pub(crate) fn for_each_prefix<E, F>(
        &self,
        prefix: &[u8],
        at: SequenceNumber,
        mut f: F,
    ) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
    {
        let mut after: Option<Vec<u8>> = None;
        loop {
            let (mut chunk, more) = self.chunk(prefix, at, after.as_deref());
            for (key, value) in &chunk {
                f(key, value)?;
            }
            if !more {
                return Ok(());
            }
            after = chunk.pop().map(|(key, _)| key);
        }
    }

    /// Up to [`WALK_CHUNK`] visible pairs under `prefix`, starting after
    /// `after`. The flag is set when the walk may continue.
    fn chunk(&self, prefix: &[u8], at: SequenceNumber, after: Option<&[u8]>) -> (Vec<KeyValue>, bool) {
        let lower = after.map_or(Bound::Included(prefix), Bound::Excluded);
        let entries = self.entries.read();
        let mut out = Vec::new();
        for (key, chain) in entries.range::<[u8], _>((lower, Bound::Unbounded)) {
            if !key.starts_with(prefix) {
                break;
            }
            if let Some(value) = visible(chain, at) {
                out.push((key.clone(), value.to_vec()));
                if out.len() == WALK_CHUNK {
                    return (out, true);
                }
            }
        }
        (out, false)
    }

    /// Publishes a commit. The caller serializes commits and passes strictly
    /// increasing sequence numbers.
    pub(crate) fn apply(&self, seq: SequenceNumber, ops: Vec<WalOp>) {
        let mut touched = Vec::with_capacity(ops.len());
        {
            let mut entries = self.entries.write();
            for op in ops {
                let (key, value) = match op {
                    WalOp::Put { key, value } => (key, Some(value)),
                    WalOp::Delete { key } => (key, None),
                };
                entries
                    .entry(key.clone())
                    .or_default()
                    .push(Version { seq, value });
                touched.push(key);
            }
        }
        self.committed.store(seq.as_u64(), Ordering::Release);
        self.prune_keys(touched);
    }

    /// Prunes `touched`, plus every pending key once the horizon has moved
    /// past the one they were last pruned at.
    fn prune_keys(&self, touched: Vec<Vec<u8>>) {
        let horizon = self.horizon();
        let mut pending = self.pending.lock();
        let mut keys = touched;
        if horizon > pending.horizon {
            keys.extend(mem::take(&mut pending.keys));
            pending.horizon = horizon;
        }

        let mut entries = self.entries.write();
        for key in keys {
            let Some(chain) = entries.get_mut(&key) else {
                continue;
            };
            if prune(chain, horizon) {
                entries.remove(&key);
            } else if !settled(chain) {
                pending.keys.insert(key);
            }
        }
    }

    /// Prunes every chain, dropping dead keys.
    pub(crate) fn sweep(&self) {
        let horizon = self.horizon();
        let mut pending = self.pending.lock();
        pending.keys.clear();
        pending.horizon = horizon;
        self.entries.write().retain(|key, chain| {
            let dead = prune(chain, horizon);
            if !dead && !settled(chain) {
                pending.keys.insert(key.clone());
            }
            !dead
        });
    }

    /// Live pairs at `at`, in key order.
    pub(crate) fn live_entries(&self, at: SequenceNumber) -> Vec<KeyValue> {
        let mut out = Vec::new();
        let _ = self.for_each_prefix::<(), _>(b"", at, |k, v| {
            out.push((k.to_vec(), v.to_vec()));
            Ok(())
        });
        out
    }

    /// Number of live keys and their key+value byte total at `at`.
    pub(crate) fn footprint(&self, at: SequenceNumber) -> (usize, u64) {
        let mut keys = 0usize;
        let mut bytes = 0u64;
        let _ = self.for_each_prefix::<(), _>(b"", at, |k, v| {
            keys += 1;
            bytes += (k.len() + v.len()) as u64;
            Ok(())
        });
        (keys, bytes)
    }

    #[cfg(test)]
    fn version_count(&self, key: &[u8]) -> usize {
        self.entries.read().get(key).map_or(0, Vec::len)
    }

    /// Retained keys and versions, tombstones included.
    #[cfg(test)]
    fn retained(&self) -> (usize, usize) {
        let entries = self.entries.read();
        (entries.len(), entries.values().map(Vec::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(key: &[u8], value: &[u8]) -> WalOp {
        WalOp::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        }
    }

    fn del(key: &[u8]) -> WalOp {
        WalOp::Delete { key: key.to_vec() }
    }

    fn seq(n: u64) -> SequenceNumber {
        SequenceNumber::new(n)
    }

    #[test]
    fn reads_see_latest_commit() {
        let ks = Keyspace::default();
        ks.apply(seq(1), vec![put(b"a", b"1")]);
        ks.apply(seq(2), vec![put(b"a", b"2")]);

        assert_eq!(ks.committed(), seq(2));
        assert_eq!(ks.get(b"a", ks.committed()), Some(b"2".to_vec()));
        assert_eq!(ks.get(b"missing", ks.committed()), None);
    }

    #[test]
    fn pinned_snapshot_keeps_old_versions() {
        let ks = Keyspace::default();
        ks.apply(seq(1), vec![put(b"a", b"old")]);

        let snap = ks.pin();
        ks.apply(seq(2), vec![put(b"a", b"new")]);
        ks.apply(seq(3), vec![del(b"a")]);

        assert_eq!(ks.get(b"a", snap.seq()), Some(b"old".to_vec()));
        assert_eq!(ks.get(b"a", ks.committed()), None);

        drop(snap);
        ks.sweep();
        assert_eq!(ks.version_count(b"a"), 0);
    }

    #[test]
    fn unpinned_history_is_pruned() {
        let ks = Keyspace::default();
        for n in 1..=10 {
            ks.apply(seq(n), vec![put(b"k", &[n as u8])]);
        }
        assert_eq!(ks.version_count(b"k"), 1);
        assert_eq!(ks.get(b"k", ks.committed()), Some(vec![10]));
    }

    #[test]
    fn delete_without_readers_drops_key() {
        let ks = Keyspace::default();
        ks.apply(seq(1), vec![put(b"k", b"v")]);
        ks.apply(seq(2), vec![del(b"k")]);
        assert_eq!(ks.version_count(b"k"), 0);
    }

    #[test]
    fn prefix_walk_is_ordered_and_bounded() {
        let ks = Keyspace::default();
        ks.apply(
            seq(1),
            vec![
                put(b"b", b"3"),
                put(b"ab", b"2"),
                put(b"a", b"1"),
                put(b"ac", b""),
                del(b"aa"),
            ],
        );

        let mut seen = Vec::new();
        ks.for_each_prefix::<(), _>(b"a", ks.committed(), |k, v| {
            seen.push((k.to_vec(), v.to_vec()));
            Ok(())
        })
        .unwrap();
        assert_eq!(
            seen,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"ab".to_vec(), b"2".to_vec()),
                (b"ac".to_vec(), Vec::new()),
            ]
        );

        assert_eq!(ks.live_entries(ks.committed()).len(), 4);
        assert_eq!(ks.footprint(ks.committed()), (4, 7));
    }

    #[test]
    fn prefix_walk_stops_on_callback_error() {
        let ks = Keyspace::default();
        ks.apply(seq(1), vec![put(b"a", b"1"), put(b"b", b"2")]);

        let mut calls = 0;
        let result = ks.for_each_prefix(b"", ks.committed(), |_, _| {
            calls += 1;
            Err("stop")
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn history_left_by_released_snapshot_is_pruned() {
        let ks = Keyspace::default();
        let keys: Vec<Vec<u8>> = (0..100).map(|i| format!("k{i:03}").into_bytes()).collect();
        let mut n = 0;
        for key in &keys {
            n += 1;
            ks.apply(seq(n), vec![put(key, b"v")]);
        }
        n += 1;
        ks.apply(seq(n), vec![put(b"live", b"v")]);

        let snap = ks.pin();
        for key in &keys {
            n += 1;
            ks.apply(seq(n), vec![del(key)]);
        }
        n += 1;
        ks.apply(seq(n), vec![put(b"live", b"w")]);
        assert_eq!(ks.retained().0, 101);
        drop(snap);

        n += 1;
        ks.apply(seq(n), vec![put(b"other", b"x")]);
        assert_eq!(ks.retained(), (2, 2));
        assert_eq!(ks.get(b"live", ks.committed()), Some(b"w".to_vec()));
    }

    #[test]
    fn pending_keys_wait_for_the_horizon() {
        let ks = Keyspace::default();
        ks.apply(seq(1), vec![put(b"a", b"1")]);
        let snap = ks.pin();
        ks.apply(seq(2), vec![put(b"a", b"2")]);

        // The snapshot is still pinned, so both versions stay.
        ks.apply(seq(3), vec![put(b"b", b"1")]);
        assert_eq!(ks.version_count(b"a"), 2);
        assert_eq!(ks.get(b"a", snap.seq()), Some(b"1".to_vec()));

        drop(snap);
        ks.apply(seq(4), vec![put(b"c", b"1")]);
        assert_eq!(ks.version_count(b"a"), 1);
    }

    #[test]
    fn sweep_remembers_pinned_history() {
        let ks = Keyspace::default();
        ks.apply(seq(1), vec![put(b"a", b"1")]);
        let snap = ks.pin();
        ks.apply(seq(2), vec![del(b"a")]);
        ks.sweep();
        assert_eq!(ks.version_count(b"a"), 2);

        drop(snap);
        ks.apply(seq(3), vec![put(b"b", b"1")]);
        assert_eq!(ks.version_count(b"a"), 0);
    }

    #[test]
    fn long_walk_does_not_block_commits() {
        let ks = Keyspace::default();
        let total = WALK_CHUNK * 2 + 10;
        let ops = (0..total)
            .map(|i| put(format!("k{i:05}").as_bytes(), b"old"))
            .collect();
        ks.apply(seq(1), ops);

        let snap = ks.pin();
        let mut next = 2;
        let mut seen = 0;
        ks.for_each_prefix::<(), _>(b"k", snap.seq(), |key, value| {
            assert_eq!(value, b"old");
            if seen % WALK_CHUNK == 0 {
                // Commits run while the walk is in progress.
                ks.apply(seq(next), vec![put(key, b"new"), put(b"k99999", b"late")]);
                next += 1;
            }
            seen += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, total);
        assert_eq!(ks.get(b"k00000", ks.committed()), Some(b"new".to_vec()));
    }
}
