//! Session lifecycle exports.

use crate::args::path_from_ptr;
use crate::boundary::global;
use crate::error::status;
use std::ffi::{c_char, c_int};

/// Opens a store and returns its handle.
///
/// With a non-zero `in_memory` the path is ignored (and may be null).
/// Otherwise `path` names a directory, created if missing.
///
/// Returns 0 on failure; see `cellar_last_error`.
///
/// # Safety
///
/// `path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn cellar_open(path: *const c_char, in_memory: c_int) -> u64 {
    let in_memory = in_memory != 0;
    global()
        .call(|b| {
            let path = if in_memory {
                None
            } else {
                path_from_ptr(path, "path")?
            };
            b.open_path(path, in_memory)
        })
        .unwrap_or(0)
}

/// Closes a store and retires its handle.
///
/// Returns 0 on success, -1 on failure. If the engine fails to close, the
/// handle stays valid and the call can be retried.
#[no_mangle]
pub extern "C" fn cellar_close(handle: u64) -> c_int {
    status(global().call(|b| b.close(handle)))
}

/// Forces outstanding writes of a store to durable storage.
///
/// Returns 0 on success, -1 on failure.
#[no_mangle]
pub extern "C" fn cellar_sync(handle: u64) -> c_int {
    status(global().call(|b| b.sync(handle)))
}

/// Returns the library version as a static NUL-terminated string.
///
/// The string must not be freed.
#[no_mangle]
pub extern "C" fn cellar_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}
