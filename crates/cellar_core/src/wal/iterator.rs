//! WAL replay.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{
    WalRecord, WalRecordType, CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION,
};

/// Iterates the records of a WAL image.
///
/// Yields `(offset, record)` pairs. A torn tail ends the iteration cleanly;
/// [`WalReader::valid_len`] then reports where the last complete record
/// ended so the caller can cut the tail off. Corruption yields one `Err` and
/// ends the iteration.
///
/// ```rust
/// use cellar_core::wal::{WalOp, WalReader, WalRecord};
/// use cellar_core::SequenceNumber;
///
/// let record = WalRecord::Commit {
///     sequence: SequenceNumber::new(1),
///     ops: vec![WalOp::Delete { key: b"k".to_vec() }],
/// };
/// let mut log = record.encode_frame().unwrap();
/// log.extend_from_slice(b"CWA"); // torn header
///
/// let mut reader = WalReader::new(&log);
/// assert_eq!(reader.by_ref().count(), 1);
/// assert!(reader.is_torn());
/// ```
#[derive(Debug)]
pub struct WalReader<'a> {
    log: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> WalReader<'a> {
    /// Creates a reader over a complete WAL image.
    #[must_use]
    pub fn new(log: &'a [u8]) -> Self {
        Self {
            log,
            offset: 0,
            finished: false,
        }
    }

    /// Length of the prefix made of complete, verified records.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.offset as u64
    }

    /// Whether bytes past the last complete record were left unread.
    #[must_use]
    pub fn is_torn(&self) -> bool {
        self.finished && self.offset < self.log.len()
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        let start = self.offset;
        let rest = &self.log[start..];
        if rest.len() < HEADER_SIZE {
            return Ok(None);
        }

        if rest[0..4] != WAL_MAGIC {
            return Err(CoreError::wal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = rest[6];
        let record_type = WalRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::wal_corruption(format!("unknown record type {type_byte} at offset {start}"))
        })?;

        let payload_len = u32::from_le_bytes([rest[7], rest[8], rest[9], rest[10]]) as usize;
        let total = HEADER_SIZE + payload_len + CRC_SIZE;
        if rest.len() < total {
            return Ok(None);
        }

        let body = &rest[..HEADER_SIZE + payload_len];
        let mut stored = [0u8; CRC_SIZE];
        stored.copy_from_slice(&rest[HEADER_SIZE + payload_len..total]);
        let stored = u32::from_le_bytes(stored);
        let computed = crc32fast::hash(body);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                offset: start as u64,
                expected: stored,
                actual: computed,
            });
        }

        let record = WalRecord::decode_payload(record_type, &body[HEADER_SIZE..])?;
        self.offset += total;
        Ok(Some((start as u64, record)))
    }
}

impl Iterator for WalReader<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
