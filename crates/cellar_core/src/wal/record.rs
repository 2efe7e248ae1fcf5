//! WAL record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;

/// Magic bytes opening every WAL record.
pub const WAL_MAGIC: [u8; 4] = *b"CWAL";

/// Current WAL format version.
pub const WAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// Type byte of a WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// One committed update.
    Commit = 1,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A single mutation inside a committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalOp {
    /// Insert or overwrite a key.
    Put {
        /// The key.
        key: Vec<u8>,
        /// The new value.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// The key.
        key: Vec<u8>,
    },
}

impl WalOp {
    /// Returns the key this op touches.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// A WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalRecord {
    /// An atomically committed set of mutations.
    Commit {
        /// Sequence number assigned to the commit.
        sequence: SequenceNumber,
        /// Mutations in application order.
        ops: Vec<WalOp>,
    },
}

impl WalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Commit { .. } => WalRecordType::Commit,
        }
    }

    /// Serializes the payload (without envelope).
    ///
    /// Payload of a commit:
    /// `| sequence u64 | op_count u32 | ops... |`, each op
    /// `| tag u8 | key_len u32 | key | [value_len u32 | value] |`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a key, a value or the op count does not
    /// fit a 32-bit length field.
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let Self::Commit { sequence, ops } = self;

        let mut buf = Vec::with_capacity(12 + ops.iter().map(op_size).sum::<usize>());
        buf.extend_from_slice(&sequence.as_u64().to_le_bytes());
        buf.extend_from_slice(&len_u32(ops.len(), "op count")?.to_le_bytes());

        for op in ops {
            match op {
                WalOp::Put { key, value } => {
                    buf.push(OP_PUT);
                    put_bytes(&mut buf, key, "key")?;
                    put_bytes(&mut buf, value, "value")?;
                }
                WalOp::Delete { key } => {
                    buf.push(OP_DELETE);
                    put_bytes(&mut buf, key, "key")?;
                }
            }
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut cursor = PayloadCursor { payload, pos: 0 };

        match record_type {
            WalRecordType::Commit => {
                let sequence = SequenceNumber::new(cursor.read_u64()?);
                let count = cursor.read_u32()? as usize;
                // Every op takes at least 5 bytes; reject absurd counts before allocating.
                if count > cursor.remaining() / 5 {
                    return Err(CoreError::wal_corruption(format!(
                        "op count {count} exceeds payload size"
                    )));
                }

                let mut ops = Vec::with_capacity(count);
                for _ in 0..count {
                    let op = match cursor.read_u8()? {
                        OP_PUT => {
                            let key = cursor.read_bytes()?;
                            let value = cursor.read_bytes()?;
                            WalOp::Put { key, value }
                        }
                        OP_DELETE => WalOp::Delete {
                            key: cursor.read_bytes()?,
                        },
                        tag => {
                            return Err(CoreError::wal_corruption(format!(
                                "unknown op tag {tag}"
                            )))
                        }
                    };
                    ops.push(op);
                }

                if cursor.remaining() != 0 {
                    return Err(CoreError::wal_corruption(format!(
                        "{} trailing bytes in commit record",
                        cursor.remaining()
                    )));
                }
                Ok(Self::Commit { sequence, ops })
            }
        }
    }

    /// Encodes the record with its envelope and CRC.
    pub fn encode_frame(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = len_u32(payload.len(), "record payload")?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&WAL_MAGIC);
        frame.extend_from_slice(&WAL_VERSION.to_le_bytes());
        frame.push(self.record_type().as_byte());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

fn op_size(op: &WalOp) -> usize {
    match op {
        WalOp::Put { key, value } => 9 + key.len() + value.len(),
        WalOp::Delete { key } => 5 + key.len(),
    }
}

fn len_u32(len: usize, what: &str) -> CoreResult<u32> {
    u32::try_from(len)
        .map_err(|_| CoreError::invalid_argument(format!("{what} too large: {len} bytes")))
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8], what: &str) -> CoreResult<()> {
    buf.extend_from_slice(&len_u32(bytes.len(), what)?.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

struct PayloadCursor<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl PayloadCursor<'_> {
    fn remaining(&self) -> usize {
        self.payload.len() - self.pos
    }

    fn take(&mut self, n: usize) -> CoreResult<&[u8]> {
        if n > self.remaining() {
            return Err(CoreError::wal_corruption("unexpected end of payload"));
        }
        let slice = &self.payload[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> CoreResult<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn read_u64(&mut self) -> CoreResult<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn read_bytes(&mut self) -> CoreResult<Vec<u8>> {
        let len = self.read_u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}
