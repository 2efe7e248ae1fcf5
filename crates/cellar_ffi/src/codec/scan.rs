//! Scan result records.
//!
//! ```text
//! | key_len u32 | value_len u32 | key | value |
//! ```
//!
//! Records follow each other in ascending key order with nothing between
//! or after them.

use super::{read_bytes, read_len, wire_len};
use crate::error::{FfiError, FfiResult};
use bytes::{BufMut, BytesMut};

/// Accumulates scan records.
#[derive(Debug, Default)]
pub struct ScanWriter {
    buf: BytesMut,
    records: usize,
}

impl ScanWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a length exceeds the `u32` range.
    pub fn push(&mut self, key: &[u8], value: &[u8]) -> FfiResult<()> {
        let key_len = wire_len(key.len(), "key")?;
        let value_len = wire_len(value.len(), "value")?;
        self.buf.reserve(8 + key.len() + value.len());
        self.buf.put_u32_le(key_len);
        self.buf.put_u32_le(value_len);
        self.buf.put_slice(key);
        self.buf.put_slice(value);
        self.records += 1;
        Ok(())
    }

    /// Number of records written.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Whether no record was written.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// The encoded records.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// Iterates the records of a scan result buffer.
///
/// ```rust
/// use cellar_ffi::codec::{ScanRecords, ScanWriter};
///
/// let mut writer = ScanWriter::new();
/// writer.push(b"a", b"1").unwrap();
/// writer.push(b"ab", b"").unwrap();
///
/// let records: Vec<_> = ScanRecords::new(writer.as_bytes())
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(records, vec![(&b"a"[..], &b"1"[..]), (&b"ab"[..], &b""[..])]);
/// ```
#[derive(Debug, Clone)]
pub struct ScanRecords<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ScanRecords<'a> {
    /// Creates an iterator over `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            failed: false,
        }
    }

    fn read_record(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        let key_len = read_len(self.buf, &mut self.pos)?;
        let value_len = read_len(self.buf, &mut self.pos)?;
        let key = read_bytes(self.buf, &mut self.pos, key_len)?;
        let value = read_bytes(self.buf, &mut self.pos, value_len)?;
        Some((key, value))
    }
}

impl<'a> Iterator for ScanRecords<'a> {
    type Item = FfiResult<(&'a [u8], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        let start = self.pos;
        match self.read_record() {
            Some(record) => Some(Ok(record)),
            None => {
                self.failed = true;
                Some(Err(FfiError::invalid_argument(format!(
                    "truncated scan record at offset {start}"
                ))))
            }
        }
    }
}
