//! String and buffer marshaling across the boundary.
//!
//! Two kinds of string cross the ABI: owned strings, allocated here with
//! the platform C allocator so the host's interop marshaller can `free`
//! them after copying, and borrowed pointers into a widget's internal
//! state, valid only until the next mutation of that widget.

use std::os::raw::c_char;

use crate::error::Error;

/// Allocate a NUL-terminated copy of `s` with `malloc`. Ownership
/// transfers to the caller.
pub fn export_string(s: &str) -> Result<*mut c_char, Error> {
    let ptr = unsafe { libc::malloc(s.len() + 1) } as *mut u8;
    if ptr.is_null() {
        return Err(Error::OutOfMemory);
    }
    unsafe {
        std::ptr::copy_nonoverlapping(s.as_ptr(), ptr, s.len());
        *ptr.add(s.len()) = 0;
    }
    Ok(ptr as *mut c_char)
}

/// Borrow a caller-supplied C string for the duration of a call.
///
/// # Safety
/// `ptr` must be NUL-terminated and remain valid for the call.
pub unsafe fn borrow_str<'a>(ptr: *const c_char) -> Result<&'a str, Error> {
    if ptr.is_null() {
        return Err(Error::ArgumentNull);
    }
    std::ffi::CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| Error::InvalidArgument("string is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn export_string_is_nul_terminated_and_freeable() {
        let ptr = export_string("hello").unwrap();
        let copy = unsafe { CStr::from_ptr(ptr) };
        assert_eq!(copy.to_str().unwrap(), "hello");
        unsafe { libc::free(ptr as *mut libc::c_void) };
    }

    #[test]
    fn borrow_str_validates_pointer_and_encoding() {
        assert!(matches!(
            unsafe { borrow_str(std::ptr::null()) },
            Err(Error::ArgumentNull)
        ));

        let bad = [0xFFu8, 0xFE, 0x00];
        assert!(matches!(
            unsafe { borrow_str(bad.as_ptr() as *const c_char) },
            Err(Error::InvalidArgument(_))
        ));

        let good = b"ok\0";
        assert_eq!(
            unsafe { borrow_str(good.as_ptr() as *const c_char) }.unwrap(),
            "ok"
        );
    }
}
