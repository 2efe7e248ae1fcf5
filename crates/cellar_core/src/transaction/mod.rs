//! Read and write transactions.
//!
//! - [`ReadTxn`] reads one pinned snapshot; concurrent commits never show up
//!   in it.
//! - [`WriteTxn`] reads its own snapshot overlaid with its buffered writes.
//!   Writes reach the keyspace only when the enclosing update commits.

use crate::error::{CoreError, CoreResult};
use crate::keyspace::Snapshot;
use crate::types::{KeyValue, SequenceNumber};
use crate::wal::WalOp;
use std::collections::BTreeMap;
use std::ops::Bound;

fn check_key(key: &[u8]) -> CoreResult<()> {
    if key.is_empty() {
        return Err(CoreError::invalid_argument("key must not be empty"));
    }
    Ok(())
}

/// A snapshot-consistent read transaction.
#[derive(Debug)]
pub struct ReadTxn<'a> {
    snapshot: Snapshot<'a>,
}

impl<'a> ReadTxn<'a> {
    pub(crate) fn new(snapshot: Snapshot<'a>) -> Self {
        Self { snapshot }
    }

    /// Sequence number the snapshot reads at.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        self.snapshot.seq()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.snapshot.keyspace().get(key, self.snapshot.seq())
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Visits every pair whose key starts with `prefix`, in ascending key
    /// order. An empty prefix visits everything. Commits may run while `f`
    /// does; the walk still sees only this snapshot.
    ///
    /// Stops at the first error `f` returns.
    pub fn for_each_prefix<E, F>(&self, prefix: &[u8], f: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &[u8]) -> Result<(), E>,
    {
        self.snapshot
            .keyspace()
            .for_each_prefix(prefix, self.snapshot.seq(), f)
    }

    /// Collects every pair whose key starts with `prefix`.
    #[must_use]
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<KeyValue> {
        let mut out = Vec::new();
        let _ = self.for_each_prefix::<(), _>(prefix, |k, v| {
            out.push((k.to_vec(), v.to_vec()));
            Ok(())
        });
        out
    }
}

/// A buffered write transaction.
///
/// Only one exists at a time per store; the store holds its writer lock for
/// the transaction's lifetime.
#[derive(Debug)]
pub struct WriteTxn<'a> {
    snapshot: Snapshot<'a>,
    /// `None` marks a pending delete.
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(snapshot: Snapshot<'a>) -> Self {
        Self {
            snapshot,
            writes: BTreeMap::new(),
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> CoreResult<()> {
        check_key(key)?;
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    /// Removes `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key.
    pub fn delete(&mut self, key: &[u8]) -> CoreResult<()> {
        check_key(key)?;
        self.writes.insert(key.to_vec(), None);
        Ok(())
    }

    /// Reads `key`, seeing this transaction's own writes.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(pending) => pending.clone(),
            None => self.snapshot.keyspace().get(key, self.snapshot.seq()),
        }
    }

    /// Collects every pair whose key starts with `prefix`, seeing this
    /// transaction's own writes.
    #[must_use]
    pub fn scan_prefix(&self, prefix: &[u8]) -> Vec<KeyValue> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let _ = self.snapshot.keyspace().for_each_prefix::<(), _>(
            prefix,
            self.snapshot.seq(),
            |k, v| {
                merged.insert(k.to_vec(), v.to_vec());
                Ok(())
            },
        );

        let pending = self
            .writes
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix));
        for (key, value) in pending {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }

    /// Number of distinct keys written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Consumes the transaction, releasing its snapshot.
    pub(crate) fn into_ops(self) -> Vec<WalOp> {
        self.writes
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => WalOp::Put { key, value },
                None => WalOp::Delete { key },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::Keyspace;

    fn seeded() -> Keyspace {
        let ks = Keyspace::default();
        ks.apply(
            SequenceNumber::new(1),
            vec![
                WalOp::Put {
                    key: b"p:a".to_vec(),
                    value: b"1".to_vec(),
                },
                WalOp::Put {
                    key: b"p:b".to_vec(),
                    value: b"2".to_vec(),
                },
                WalOp::Put {
                    key: b"q".to_vec(),
                    value: b"3".to_vec(),
                },
            ],
        );
        ks
    }

    #[test]
    fn read_txn_reads_snapshot() {
        let ks = seeded();
        let txn = ReadTxn::new(ks.pin());
        assert_eq!(txn.sequence(), SequenceNumber::new(1));
        assert_eq!(txn.get(b"q"), Some(b"3".to_vec()));
        assert!(!txn.contains(b"zz"));
        assert_eq!(txn.scan_prefix(b"p:").len(), 2);
        assert_eq!(txn.scan_prefix(b"").len(), 3);
    }

    #[test]
    fn write_txn_sees_own_writes() {
        let ks = seeded();
        let mut txn = WriteTxn::new(ks.pin());

        txn.set(b"p:c", b"new").unwrap();
        txn.delete(b"p:a").unwrap();
        txn.set(b"p:b", b"").unwrap();

        assert_eq!(txn.get(b"p:c"), Some(b"new".to_vec()));
        assert_eq!(txn.get(b"p:a"), None);
        assert_eq!(
            txn.scan_prefix(b"p:"),
            vec![
                (b"p:b".to_vec(), Vec::new()),
                (b"p:c".to_vec(), b"new".to_vec()),
            ]
        );

        // Nothing leaks into the keyspace before commit.
        assert_eq!(ks.get(b"p:c", ks.committed()), None);
        assert_eq!(txn.len(), 3);
    }

    #[test]
    fn empty_key_is_rejected() {
        let ks = Keyspace::default();
        let mut txn = WriteTxn::new(ks.pin());
        assert!(matches!(
            txn.set(b"", b"v"),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(matches!(
            txn.delete(b""),
            Err(CoreError::InvalidArgument { .. })
        ));
        assert!(txn.is_empty());
    }

    #[test]
    fn last_write_per_key_wins() {
        let ks = Keyspace::default();
        let mut txn = WriteTxn::new(ks.pin());
        txn.set(b"k", b"1").unwrap();
        txn.delete(b"k").unwrap();
        txn.set(b"k", b"2").unwrap();

        assert_eq!(
            txn.into_ops(),
            vec![WalOp::Put {
                key: b"k".to_vec(),
                value: b"2".to_vec(),
            }]
        );
    }
}
