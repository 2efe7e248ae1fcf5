//! Raw argument conversion.

use crate::buffer::ExportedBuffer;
use crate::codec::ScanWriter;
use crate::error::{FfiError, FfiResult};
use std::ffi::{c_char, CStr};
use std::path::Path;
use std::ptr;

/// Borrows a caller buffer. Null is allowed only with a zero length.
///
/// # Safety
///
/// A non-null `ptr` must be valid for reads of `len` bytes for `'a`.
pub(crate) unsafe fn bytes_from_ptr<'a>(
    ptr: *const u8,
    len: usize,
    name: &str,
) -> FfiResult<&'a [u8]> {
    if ptr.is_null() {
        if len > 0 {
            return Err(FfiError::invalid_argument(format!(
                "{name} must not be null when length > 0"
            )));
        }
        return Ok(&[]);
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

/// Reads an optional NUL-terminated path.
///
/// On Unix the bytes are taken as-is; elsewhere they must be UTF-8.
///
/// # Safety
///
/// A non-null `ptr` must point to a NUL-terminated string.
pub(crate) unsafe fn path_from_ptr<'a>(ptr: *const c_char, name: &str) -> FfiResult<Option<&'a Path>> {
    if ptr.is_null() {
        return Ok(None);
    }
    let bytes = CStr::from_ptr(ptr).to_bytes();

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        let _ = name;
        Ok(Some(Path::new(std::ffi::OsStr::from_bytes(bytes))))
    }

    #[cfg(not(unix))]
    {
        std::str::from_utf8(bytes)
            .map(|s| Some(Path::new(s)))
            .map_err(|e| FfiError::invalid_argument(format!("{name} is not valid UTF-8: {e}")))
    }
}

/// Checks an out-pointer for a length and zeroes it.
///
/// # Safety
///
/// A non-null `out_len` must be valid for writes.
pub(crate) unsafe fn reset_out_len(out_len: *mut usize) -> FfiResult<()> {
    if out_len.is_null() {
        return Err(FfiError::invalid_argument("out_len must not be null"));
    }
    *out_len = 0;
    Ok(())
}

/// Exports `data` and reports its length through `out_len`.
///
/// # Safety
///
/// `out_len` must be valid for writes.
pub(crate) unsafe fn export(data: &[u8], out_len: *mut usize) -> FfiResult<*mut u8> {
    let (buf, len) = ExportedBuffer::from_slice(data)?.into_raw();
    *out_len = len;
    Ok(buf)
}

/// Exports scan records; no records yields null with a zero length.
///
/// # Safety
///
/// `out_len` must be valid for writes.
pub(crate) unsafe fn export_scan(writer: &ScanWriter, out_len: *mut usize) -> FfiResult<*mut u8> {
    if writer.is_empty() {
        *out_len = 0;
        return Ok(ptr::null_mut());
    }
    export(writer.as_bytes(), out_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn null_with_zero_length_is_empty() {
        let bytes = unsafe { bytes_from_ptr(ptr::null(), 0, "key") }.unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn null_with_length_is_rejected() {
        let err = unsafe { bytes_from_ptr(ptr::null(), 3, "value") }.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.message(), "value must not be null when length > 0");
    }

    #[test]
    fn paths() {
        assert_eq!(unsafe { path_from_ptr(ptr::null(), "path") }.unwrap(), None);
        let path = c"/tmp/store";
        assert_eq!(
            unsafe { path_from_ptr(path.as_ptr(), "path") }.unwrap(),
            Some(Path::new("/tmp/store"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn unix_paths_keep_raw_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let raw = b"/tmp/caf\xe9\0";
        let path = unsafe { path_from_ptr(raw.as_ptr().cast(), "path") }
            .unwrap()
            .unwrap();
        assert_eq!(path.as_os_str().as_bytes(), b"/tmp/caf\xe9");
    }

    #[test]
    fn out_len_is_required() {
        assert!(unsafe { reset_out_len(ptr::null_mut()) }.is_err());
        let mut len = 9usize;
        unsafe { reset_out_len(&mut len) }.unwrap();
        assert_eq!(len, 0);
    }
}
