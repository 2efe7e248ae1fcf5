//! Batch operation log.
//!
//! ```text
//! Set:    | 0x00 | key_len u32 | key | value_len u32 | value |
//! Delete: | 0x01 | key_len u32 | key |
//! ```
//!
//! Entries are concatenated and applied in order as one transaction. An
//! empty log is a valid, empty batch.

use super::{read_bytes, read_len, wire_len};
use crate::error::{FfiError, FfiResult};
use bytes::{BufMut, Bytes, BytesMut};

/// Opcode of a set entry.
pub const OP_SET: u8 = 0x00;

/// Opcode of a delete entry.
pub const OP_DELETE: u8 = 0x01;

/// One decoded batch entry, borrowing from the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp<'a> {
    /// Store `value` under `key`.
    Set {
        /// Key bytes.
        key: &'a [u8],
        /// Value bytes.
        value: &'a [u8],
    },
    /// Remove `key`; absent keys are skipped.
    Delete {
        /// Key bytes.
        key: &'a [u8],
    },
}

impl<'a> BatchOp<'a> {
    /// Key the entry touches.
    pub fn key(&self) -> &'a [u8] {
        match *self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Decodes a whole operation log, left to right.
///
/// Nothing is returned unless every entry decodes.
///
/// # Errors
///
/// `MalformedBatch` for a truncated length or payload, an unknown opcode,
/// or a zero-length key. The message names the byte offset of the entry.
pub fn decode_batch(log: &[u8]) -> FfiResult<Vec<BatchOp<'_>>> {
    let mut ops = Vec::new();
    let mut pos = 0;

    while pos < log.len() {
        let start = pos;
        let op = log[pos];
        pos += 1;
        if op != OP_SET && op != OP_DELETE {
            return Err(FfiError::malformed_batch(format!(
                "unknown opcode {op:#04x} at offset {start}"
            )));
        }

        let key_len = read_len(log, &mut pos).ok_or_else(|| truncated("key length", start))?;
        let key = read_bytes(log, &mut pos, key_len).ok_or_else(|| truncated("key", start))?;
        if key.is_empty() {
            return Err(FfiError::malformed_batch(format!(
                "empty key in entry at offset {start}"
            )));
        }

        if op == OP_SET {
            let value_len =
                read_len(log, &mut pos).ok_or_else(|| truncated("value length", start))?;
            let value =
                read_bytes(log, &mut pos, value_len).ok_or_else(|| truncated("value", start))?;
            ops.push(BatchOp::Set { key, value });
        } else {
            ops.push(BatchOp::Delete { key });
        }
    }

    Ok(ops)
}

fn truncated(what: &str, entry: usize) -> FfiError {
    FfiError::malformed_batch(format!("truncated {what} in entry at offset {entry}"))
}

/// Builds an operation log.
///
/// ```rust
/// use cellar_ffi::codec::{decode_batch, BatchBuilder, BatchOp};
///
/// let mut batch = BatchBuilder::new();
/// batch.set(b"a", b"1").unwrap().delete(b"b").unwrap();
/// let log = batch.finish();
///
/// let ops = decode_batch(&log).unwrap();
/// assert_eq!(ops[1], BatchOp::Delete { key: b"b" });
/// ```
#[derive(Debug, Default, Clone)]
pub struct BatchBuilder {
    buf: BytesMut,
    entries: usize,
}

impl BatchBuilder {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a set entry.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key or a length beyond `u32`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> FfiResult<&mut Self> {
        let key_len = checked_key(key)?;
        let value_len = wire_len(value.len(), "value")?;
        self.buf.reserve(9 + key.len() + value.len());
        self.buf.put_u8(OP_SET);
        self.buf.put_u32_le(key_len);
        self.buf.put_slice(key);
        self.buf.put_u32_le(value_len);
        self.buf.put_slice(value);
        self.entries += 1;
        Ok(self)
    }

    /// Appends a delete entry.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty key or a length beyond `u32`.
    pub fn delete(&mut self, key: &[u8]) -> FfiResult<&mut Self> {
        let key_len = checked_key(key)?;
        self.buf.reserve(5 + key.len());
        self.buf.put_u8(OP_DELETE);
        self.buf.put_u32_le(key_len);
        self.buf.put_slice(key);
        self.entries += 1;
        Ok(self)
    }

    /// Number of entries appended.
    pub fn len(&self) -> usize {
        self.entries
    }

    /// Whether no entry was appended.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Returns the encoded log.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

fn checked_key(key: &[u8]) -> FfiResult<u32> {
    if key.is_empty() {
        return Err(FfiError::invalid_argument("key must not be empty"));
    }
    wire_len(key.len(), "key")
}
