//! # Cellar Storage
//!
//! Byte-store backends underneath the Cellar key-value engine.
//!
//! A backend is an **opaque, append-oriented byte store**. It knows nothing
//! about WAL records, keys or values; `cellar_core` owns every file format.
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - persistent storage on a single OS file
//! - [`InMemoryBackend`] - ephemeral storage for in-memory stores and tests
//!
//! ## Example
//!
//! ```rust
//! use cellar_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
