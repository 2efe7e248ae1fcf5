//! Binary encodings shared with foreign callers.
//!
//! All integers are little-endian `u32`; there are no separators, counts or
//! terminators.
//!
//! - [`batch`]: the operation log accepted by `cellar_apply`
//! - [`scan`]: the record buffer returned by `cellar_scan`

pub mod batch;
pub mod scan;

pub use batch::{decode_batch, BatchBuilder, BatchOp, OP_DELETE, OP_SET};
pub use scan::{ScanRecords, ScanWriter};

use crate::error::{FfiError, FfiResult};

/// Reads a little-endian `u32` length at `*pos`, advancing past it.
fn read_len(buf: &[u8], pos: &mut usize) -> Option<usize> {
    let raw: [u8; 4] = buf.get(*pos..*pos + 4)?.try_into().ok()?;
    *pos += 4;
    Some(u32::from_le_bytes(raw) as usize)
}

/// Borrows `len` bytes at `*pos`, advancing past them.
fn read_bytes<'a>(buf: &'a [u8], pos: &mut usize, len: usize) -> Option<&'a [u8]> {
    let end = pos.checked_add(len)?;
    let bytes = buf.get(*pos..end)?;
    *pos = end;
    Some(bytes)
}

/// Converts a length to its `u32` wire form.
fn wire_len(len: usize, what: &str) -> FfiResult<u32> {
    u32::try_from(len)
        .map_err(|_| FfiError::invalid_argument(format!("{what} of {len} bytes exceeds u32 range")))
}
