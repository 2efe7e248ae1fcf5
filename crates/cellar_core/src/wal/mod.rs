//! Write-ahead log.
//!
//! The WAL is the only data file of a durable store. Every committed update
//! is one record; replaying the records in order rebuilds the keyspace.
//!
//! ## Record Format
//!
//! ```text
//! | magic "CWAL" (4) | version u16 (2) | type u8 (1) | length u32 (4) | payload (N) | crc32 (4) |
//! ```
//!
//! All integers are little-endian. The CRC covers header and payload.
//!
//! ## Recovery Policy
//!
//! Tolerated (treated as a clean end of log, the torn tail is cut off):
//! - fewer than 11 header bytes left
//! - a length that runs past the end of the log
//!
//! Fatal (the store refuses to open):
//! - bad magic, unsupported version, unknown record type
//! - CRC mismatch
//! - a payload that does not decode

mod iterator;
mod record;
mod writer;

pub use iterator::WalReader;
pub use record::{WalOp, WalRecord, WalRecordType, WAL_MAGIC, WAL_VERSION};
pub use writer::WalManager;
