//! ABI error codes and the thread-local diagnostic channel.
//!
//! Every exported function returns an [`ErrorCode`]. A code carrying the
//! `HAS_MESSAGE` flag guarantees that a detailed message was stored in
//! thread-local storage before the call returned; the message stays valid
//! until the next failing call on the same thread.

use std::cell::RefCell;
use std::os::raw::c_char;

use crate::marshal;

/// Error code returned across the ABI. Matches the managed-side `Error`
/// enum bit-for-bit; any change here is a breaking ABI change.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const SUCCESS: ErrorCode = ErrorCode(0);
    pub const UNKNOWN: ErrorCode = ErrorCode(1);
    pub const NATIVE_INTEROP_FAILURE: ErrorCode = ErrorCode(2);
    pub const OUT_OF_MEMORY: ErrorCode = ErrorCode(3);
    pub const UNALIGNED_OBJECT_PLACEMENT: ErrorCode = ErrorCode(4);
    pub const ARGUMENT_NULL: ErrorCode = ErrorCode(5);
    pub const ARGUMENT_OUT_OF_RANGE: ErrorCode = ErrorCode(6);
    pub const BUFFER_TOO_SMALL: ErrorCode = ErrorCode(7);
    pub const INVALID_ARGUMENT: ErrorCode = ErrorCode(8);

    /// OR'd onto `UNKNOWN` when a detailed message is available via
    /// the last-error-message entry points.
    pub const HAS_MESSAGE: i32 = 0x8000;

    pub const fn unknown_with_message() -> ErrorCode {
        ErrorCode(Self::UNKNOWN.0 | Self::HAS_MESSAGE)
    }

    pub fn is_success(self) -> bool {
        self.0 == 0
    }
}

/// Internal error type. Converted to an [`ErrorCode`] exactly once, at the
/// exported-function boundary; `Native` additionally stores its message in
/// the thread-local slot at that point.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Native(String),
    #[error("out of memory")]
    OutOfMemory,
    #[error("object placement address is not aligned")]
    UnalignedPlacement,
    #[error("argument is null")]
    ArgumentNull,
    #[error("argument out of range")]
    ArgumentOutOfRange,
    #[error("buffer too small")]
    BufferTooSmall,
    #[error("{0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn native(msg: impl Into<String>) -> Self {
        Error::Native(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Collapse to the ABI code, stashing the message for `Native` so the
    /// `HAS_MESSAGE` invariant holds before the boundary returns.
    pub fn into_code(self) -> ErrorCode {
        match self {
            Error::Native(msg) => {
                set_last_error_message(msg);
                ErrorCode::unknown_with_message()
            }
            Error::OutOfMemory => ErrorCode::OUT_OF_MEMORY,
            Error::UnalignedPlacement => ErrorCode::UNALIGNED_OBJECT_PLACEMENT,
            Error::ArgumentNull => ErrorCode::ARGUMENT_NULL,
            Error::ArgumentOutOfRange => ErrorCode::ARGUMENT_OUT_OF_RANGE,
            Error::BufferTooSmall => ErrorCode::BUFFER_TOO_SMALL,
            Error::InvalidArgument(msg) => {
                set_last_error_message(msg);
                ErrorCode::INVALID_ARGUMENT
            }
        }
    }
}

thread_local! {
    static LAST_ERROR_MESSAGE: RefCell<String> = const { RefCell::new(String::new()) };
}

/// Overwrite the thread-local message unconditionally.
pub fn set_last_error_message(msg: impl Into<String>) {
    LAST_ERROR_MESSAGE.with(|m| *m.borrow_mut() = msg.into());
}

pub fn with_last_error_message<R>(f: impl FnOnce(&str) -> R) -> R {
    LAST_ERROR_MESSAGE.with(|m| f(m.borrow().as_str()))
}

// ============================================================================
// Exports
// ============================================================================

/// Two-call convention, step 1: the byte length of the pending message.
#[no_mangle]
pub extern "C" fn TfGetLastErrorMessageLength(out: *mut i32) -> ErrorCode {
    if out.is_null() {
        return ErrorCode::ARGUMENT_NULL;
    }
    with_last_error_message(|msg| {
        let Ok(len) = i32::try_from(msg.len()) else {
            return ErrorCode::BUFFER_TOO_SMALL;
        };
        unsafe { *out = len };
        ErrorCode::SUCCESS
    })
}

/// Two-call convention, step 2: copy the message into a caller-sized
/// buffer. Exactly `length` bytes are copied, no terminator; the companion
/// length call sizes the buffer.
#[no_mangle]
pub extern "C" fn TfGetLastErrorMessage(buffer: *mut c_char, buffer_size: i32) -> ErrorCode {
    if buffer.is_null() {
        return ErrorCode::ARGUMENT_NULL;
    }
    with_last_error_message(|msg| {
        if (buffer_size as usize) < msg.len() || buffer_size < 0 {
            return ErrorCode::BUFFER_TOO_SMALL;
        }
        unsafe {
            std::ptr::copy_nonoverlapping(msg.as_ptr(), buffer as *mut u8, msg.len());
        }
        ErrorCode::SUCCESS
    })
}

/// One-call convention: an owned, NUL-terminated copy allocated with the
/// platform C allocator. Ownership transfers to the caller.
#[no_mangle]
pub extern "C" fn TfGetLastErrorMessageOwned(out: *mut *mut c_char) -> ErrorCode {
    if out.is_null() {
        return ErrorCode::ARGUMENT_NULL;
    }
    with_last_error_message(|msg| match marshal::export_string(msg) {
        Ok(ptr) => {
            unsafe { *out = ptr };
            ErrorCode::SUCCESS
        }
        Err(e) => e.into_code(),
    })
}
