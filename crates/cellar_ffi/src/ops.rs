//! Data operation exports.
//!
//! Input buffers are borrowed only for the duration of the call. Output
//! buffers belong to the caller and go back through `cellar_free_buffer`.

use crate::args::{bytes_from_ptr, export, export_scan, reset_out_len};
use crate::boundary::global;
use crate::error::status;
use std::ffi::c_int;
use std::ptr;

/// Stores `value` under `key`.
///
/// Returns 0 on success, -1 on failure.
///
/// # Safety
///
/// `key` and `value` must be valid for reads of their lengths (null is
/// allowed only with a zero length).
#[no_mangle]
pub unsafe extern "C" fn cellar_set(
    handle: u64,
    key: *const u8,
    key_len: usize,
    value: *const u8,
    value_len: usize,
) -> c_int {
    status(global().call(|b| {
        let key = bytes_from_ptr(key, key_len, "key")?;
        let value = bytes_from_ptr(value, value_len, "value")?;
        b.set(handle, key, value)
    }))
}

/// Returns a copy of the value stored under `key`.
///
/// On success `*out_len` receives the value length; a zero-length value
/// still returns a non-null pointer. A missing key returns null and records
/// `NotFound`.
///
/// # Safety
///
/// `key` must be valid for reads of `key_len` bytes. `out_len` must be
/// valid for writes. A non-null result must be released with
/// `cellar_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn cellar_get(
    handle: u64,
    key: *const u8,
    key_len: usize,
    out_len: *mut usize,
) -> *mut u8 {
    global()
        .call(|b| {
            reset_out_len(out_len)?;
            let key = bytes_from_ptr(key, key_len, "key")?;
            let value = b.get(handle, key)?;
            export(&value, out_len)
        })
        .unwrap_or(ptr::null_mut())
}

/// Removes `key`. Removing an absent key succeeds.
///
/// Returns 0 on success, -1 on failure.
///
/// # Safety
///
/// `key` must be valid for reads of `key_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn cellar_delete(handle: u64, key: *const u8, key_len: usize) -> c_int {
    status(global().call(|b| {
        let key = bytes_from_ptr(key, key_len, "key")?;
        b.delete(handle, key)
    }))
}

/// Applies an operation log as one atomic transaction.
///
/// The log is decoded completely before anything is written; a malformed
/// log records `MalformedBatch` and changes nothing.
///
/// Returns 0 on success, -1 on failure.
///
/// # Safety
///
/// `ops` must be valid for reads of `ops_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn cellar_apply(handle: u64, ops: *const u8, ops_len: usize) -> c_int {
    status(global().call(|b| {
        let log = bytes_from_ptr(ops, ops_len, "ops")?;
        b.apply(handle, log)
    }))
}

/// Returns every pair whose key starts with `prefix` as one record buffer.
///
/// An empty prefix matches every key. When nothing matches the result is
/// null with `*out_len == 0` and the call still succeeds.
///
/// # Safety
///
/// `prefix` must be valid for reads of `prefix_len` bytes. `out_len` must
/// be valid for writes. A non-null result must be released with
/// `cellar_free_buffer`.
#[no_mangle]
pub unsafe extern "C" fn cellar_scan(
    handle: u64,
    prefix: *const u8,
    prefix_len: usize,
    out_len: *mut usize,
) -> *mut u8 {
    global()
        .call(|b| {
            reset_out_len(out_len)?;
            let prefix = bytes_from_ptr(prefix, prefix_len, "prefix")?;
            let records = b.scan(handle, prefix)?;
            export_scan(&records, out_len)
        })
        .unwrap_or(ptr::null_mut())
}
