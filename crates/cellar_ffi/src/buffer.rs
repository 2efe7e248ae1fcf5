//! Buffers that cross the boundary.
//!
//! Every byte buffer returned to a caller is an [`ExportedBuffer`] turned
//! into a raw pointer. The allocation carries a hidden length header in
//! front of the data, so `cellar_free_buffer` needs only the pointer:
//!
//! ```text
//! | len: usize | data[0..len] |
//!              ^ pointer handed to the caller
//! ```
//!
//! A zero-length buffer is still a real allocation (the header alone), so a
//! caller can tell "empty value" apart from the null "no value" sentinel.

use crate::error::{FfiError, FfiResult};
use std::alloc::{self, Layout};
use std::ffi::{c_char, CString};
use std::mem;
use std::ptr::{self, NonNull};

const HEADER: usize = mem::size_of::<usize>();

fn layout_for(len: usize) -> Option<Layout> {
    let size = HEADER.checked_add(len)?;
    Layout::from_size_align(size, mem::align_of::<usize>()).ok()
}

/// A uniquely owned byte buffer destined for a foreign caller.
///
/// Not `Clone`. [`ExportedBuffer::into_raw`] gives up ownership to the
/// caller; [`ExportedBuffer::from_raw`] takes it back on the free path.
/// Dropping an unexported buffer frees it.
#[derive(Debug)]
pub struct ExportedBuffer {
    /// Start of the allocation (the header).
    base: NonNull<u8>,
    len: usize,
}

impl ExportedBuffer {
    /// Copies `data` into a new exportable allocation.
    ///
    /// # Errors
    ///
    /// `AllocationFailure` if the allocator refuses.
    pub fn from_slice(data: &[u8]) -> FfiResult<Self> {
        let len = data.len();
        let layout = layout_for(len).ok_or_else(|| FfiError::allocation(len))?;

        // SAFETY: layout has non-zero size (it always includes the header).
        let raw = unsafe { alloc::alloc(layout) };
        let base = NonNull::new(raw).ok_or_else(|| FfiError::allocation(len))?;

        // SAFETY: the allocation is HEADER + len bytes, aligned for usize.
        unsafe {
            base.as_ptr().cast::<usize>().write(len);
            ptr::copy_nonoverlapping(data.as_ptr(), base.as_ptr().add(HEADER), len);
        }
        Ok(Self { base, len })
    }

    /// Number of data bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no data bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Views the data bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the data region is initialized and lives as long as self.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(HEADER), self.len) }
    }

    /// Hands the buffer to the caller, returning the data pointer and length.
    ///
    /// The pointer is never null. It must come back through
    /// [`ExportedBuffer::from_raw`] to be freed.
    pub fn into_raw(self) -> (*mut u8, usize) {
        // SAFETY: HEADER bytes precede the data inside the allocation.
        let data = unsafe { self.base.as_ptr().add(HEADER) };
        let len = self.len;
        mem::forget(self);
        (data, len)
    }

    /// Reclaims a buffer previously passed out with [`ExportedBuffer::into_raw`].
    ///
    /// Returns `None` for null.
    ///
    /// # Safety
    ///
    /// `data` must be null or a pointer returned by `into_raw` that has not
    /// been reclaimed yet.
    pub unsafe fn from_raw(data: *mut u8) -> Option<Self> {
        if data.is_null() {
            return None;
        }
        let base = data.sub(HEADER);
        let len = base.cast::<usize>().read();
        NonNull::new(base).map(|base| Self { base, len })
    }
}

impl Drop for ExportedBuffer {
    fn drop(&mut self) {
        if let Some(layout) = layout_for(self.len) {
            // SAFETY: base was allocated with exactly this layout.
            unsafe { alloc::dealloc(self.base.as_ptr(), layout) };
        }
    }
}

/// Frees a buffer returned by `cellar_get` or `cellar_scan`.
///
/// Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or a buffer returned by this library that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn cellar_free_buffer(ptr: *mut u8) {
    drop(ExportedBuffer::from_raw(ptr));
}

/// Frees a string returned by `cellar_last_error`.
///
/// Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or a string returned by this library that has not
/// been freed yet.
#[no_mangle]
pub unsafe extern "C" fn cellar_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}
