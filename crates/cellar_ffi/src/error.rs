//! Error kinds and the process-wide error channel.

use cellar_core::CoreError;
use parking_lot::Mutex;
use std::ffi::{c_char, c_int, CString};
use thiserror::Error;

/// Status returned by exports that succeed.
pub const STATUS_OK: c_int = 0;

/// Status returned by exports that fail.
pub const STATUS_ERR: c_int = -1;

/// Stable numeric category of a boundary failure.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The handle was never issued or has been closed.
    InvalidHandle = 1,
    /// A pointer, length, path or key was rejected.
    InvalidArgument = 2,
    /// `Get` found no value for the key.
    NotFound = 3,
    /// The batch buffer could not be decoded.
    MalformedBatch = 4,
    /// The storage engine reported an error.
    EngineFailure = 5,
    /// A return buffer could not be allocated.
    AllocationFailure = 6,
}

impl ErrorKind {
    /// Numeric code as seen across the boundary.
    pub const fn code(self) -> c_int {
        self as c_int
    }

    /// Inverse of [`ErrorKind::code`].
    pub fn from_code(code: c_int) -> Option<Self> {
        match code {
            1 => Some(Self::InvalidHandle),
            2 => Some(Self::InvalidArgument),
            3 => Some(Self::NotFound),
            4 => Some(Self::MalformedBatch),
            5 => Some(Self::EngineFailure),
            6 => Some(Self::AllocationFailure),
            _ => None,
        }
    }
}

/// A failure on its way to the error channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FfiError {
    kind: ErrorKind,
    message: String,
}

/// Result type for boundary operations.
pub type FfiResult<T> = Result<T, FfiError>;

impl FfiError {
    /// Creates an error of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Unknown or retired handle.
    pub fn invalid_handle(handle: u64) -> Self {
        Self::new(ErrorKind::InvalidHandle, format!("invalid handle {handle}"))
    }

    /// Rejected argument.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Missing key.
    pub fn not_found() -> Self {
        Self::new(ErrorKind::NotFound, "key not found")
    }

    /// Undecodable batch.
    pub fn malformed_batch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedBatch, message)
    }

    /// Engine-side failure.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EngineFailure, message)
    }

    /// Allocation failure of a return buffer.
    pub fn allocation(len: usize) -> Self {
        Self::new(
            ErrorKind::AllocationFailure,
            format!("failed to allocate {len} byte buffer"),
        )
    }

    /// Returns the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CoreError> for FfiError {
    fn from(err: CoreError) -> Self {
        let kind = match err {
            CoreError::InvalidArgument { .. } | CoreError::InvalidPath { .. } => {
                ErrorKind::InvalidArgument
            }
            _ => ErrorKind::EngineFailure,
        };
        Self::new(kind, err.to_string())
    }
}

#[derive(Debug)]
struct LastError {
    kind: ErrorKind,
    message: String,
}

/// The last-error slot.
///
/// One slot shared by every handle and thread. Every boundary call records
/// exactly one outcome; success clears the slot. A message read after a
/// failing call is only the caller's own if no other boundary call ran in
/// between on another thread.
#[derive(Debug, Default)]
pub struct ErrorChannel {
    slot: Mutex<Option<LastError>>,
}

impl ErrorChannel {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of an operation and passes its value through.
    pub fn record<T>(&self, result: FfiResult<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.clear();
                Some(value)
            }
            Err(err) => {
                self.set(&err);
                None
            }
        }
    }

    /// Records the outcome of a status-only operation.
    ///
    /// Returns [`STATUS_OK`] or [`STATUS_ERR`].
    pub fn record_status(&self, result: FfiResult<()>) -> c_int {
        status(self.record(result))
    }

    /// Stores `err` as the last error.
    pub fn set(&self, err: &FfiError) {
        *self.slot.lock() = Some(LastError {
            kind: err.kind,
            message: err.message.clone(),
        });
    }

    /// Empties the slot.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }

    /// Message of the last failure, if the slot is set.
    pub fn last(&self) -> Option<String> {
        self.slot.lock().as_ref().map(|e| e.message.clone())
    }

    /// Kind of the last failure, if the slot is set.
    pub fn last_kind(&self) -> Option<ErrorKind> {
        self.slot.lock().as_ref().map(|e| e.kind)
    }
}

/// Maps the outcome of [`crate::boundary::Boundary::call`] to a status.
pub(crate) fn status(outcome: Option<()>) -> c_int {
    match outcome {
        Some(()) => STATUS_OK,
        None => STATUS_ERR,
    }
}

/// Copies `message` into a caller-owned C string.
///
/// Interior NUL bytes are replaced so the message is never lost. Returns
/// null only if allocation fails.
pub(crate) fn to_c_string(message: &str) -> *mut c_char {
    let sanitized = message.replace('\0', "\u{FFFD}");
    CString::new(sanitized).map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Returns the last error message.
///
/// Returns null when the last boundary call succeeded. A non-null result is
/// a fresh copy owned by the caller and must be released with
/// `cellar_free_string`.
#[no_mangle]
pub extern "C" fn cellar_last_error() -> *mut c_char {
    match crate::boundary::global().errors().last() {
        Some(message) => to_c_string(&message),
        None => std::ptr::null_mut(),
    }
}

/// Returns the [`ErrorKind`] code of the last failure, or 0 when clear.
#[no_mangle]
pub extern "C" fn cellar_last_error_code() -> c_int {
    crate::boundary::global()
        .errors()
        .last_kind()
        .map_or(STATUS_OK, ErrorKind::code)
}

/// Clears the last error.
#[no_mangle]
pub extern "C" fn cellar_clear_error() {
    crate::boundary::global().errors().clear();
}
