//! # Cellar FFI
//!
//! Stable C ABI for the Cellar key-value store.
//!
//! This crate provides:
//! - Opaque integer handles for open stores (`cellar_open` / `cellar_close`)
//! - Scalar `set` / `get` / `delete`, atomic batches and prefix scans
//! - A last-error channel (`cellar_last_error`, `cellar_last_error_code`)
//! - Caller-freed buffers (`cellar_free_buffer`, `cellar_free_string`)
//!
//! ## Conventions
//!
//! - Status-returning calls return `0` on success and `-1` on failure.
//! - Pointer-returning calls return null on failure. `cellar_scan` also
//!   returns null, with a success status, when nothing matches.
//! - Every call overwrites the last-error slot; success clears it.
//! - Returned buffers are owned by the caller until passed to the matching
//!   free function. Null never needs freeing.
//!
//! ## Rust API
//!
//! The same operations are available on [`Boundary`], which is what the
//! exported functions call into:
//!
//! ```rust
//! use cellar_ffi::{Boundary, ErrorKind};
//!
//! let boundary = Boundary::new();
//! let handle = boundary.open(None, true).unwrap();
//! boundary.set(handle, b"k", b"v").unwrap();
//! assert_eq!(boundary.get(handle, b"k").unwrap(), b"v");
//!
//! boundary.close(handle).unwrap();
//! let err = boundary.get(handle, b"k").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::InvalidHandle);
//! ```

#![warn(missing_docs)]

mod args;
pub mod boundary;
pub mod buffer;
pub mod codec;
pub mod error;
pub mod ops;
pub mod registry;
pub mod session;

pub use boundary::Boundary;
pub use buffer::ExportedBuffer;
pub use error::{ErrorChannel, ErrorKind, FfiError, FfiResult, STATUS_ERR, STATUS_OK};
pub use registry::{Handle, HandleRegistry};
