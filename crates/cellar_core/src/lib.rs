//! # Cellar Core
//!
//! Transactional, ordered key-value engine used by the Cellar boundary layer.
//!
//! This crate provides:
//! - A write-ahead log with CRC-checked records and crash recovery
//! - A versioned, lexicographically ordered keyspace
//! - `view` transactions (snapshot-consistent reads) and `update`
//!   transactions (serialized, atomic, read-your-writes)
//! - Prefix iteration, explicit `sync`, and log compaction
//!
//! ```rust
//! use cellar_core::Store;
//!
//! let store = Store::open_in_memory().unwrap();
//! store.update(|txn| {
//!     txn.set(b"user:1", b"ada")?;
//!     txn.set(b"user:2", b"grace")
//! }).unwrap();
//!
//! let users = store.scan_prefix(b"user:").unwrap();
//! assert_eq!(users.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
mod keyspace;
mod store;
mod transaction;
mod types;
pub mod wal;

pub use config::Config;
pub use dir::StoreDir;
pub use error::{CoreError, CoreResult};
pub use store::{Store, StoreStats};
pub use transaction::{ReadTxn, WriteTxn};
pub use types::{KeyValue, SequenceNumber};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
