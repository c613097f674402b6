//! The virtual-method override table.
//!
//! A process-wide, fixed-size registry mapping overridable virtual methods
//! to host function pointers. Native trampolines consult their slot on
//! every virtual call: a populated slot bypasses the native default
//! entirely; a null slot falls through to it. Entries persist for process
//! lifetime — there is no removal operation.
//!
//! Slots are atomics so a host that populates the table from one thread
//! before starting others gets a well-defined publish; the documented
//! discipline is single-writer-before-many-readers.

use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::error::ErrorCode;

/// Overridable virtual methods. Matches the managed-side `VirtualMethod`
/// enum bit-for-bit; any change is a breaking ABI change.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualMethod {
    ApplicationDestructor = 0,
    ApplicationSuspend = 1,
    ApplicationResume = 2,
    ApplicationGetTileRect = 3,
    ApplicationHandleEvent = 4,
    ApplicationWriteShellMsg = 5,
}

pub const VIRTUAL_METHOD_COUNT: usize = 6;

impl VirtualMethod {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::ApplicationDestructor),
            1 => Some(Self::ApplicationSuspend),
            2 => Some(Self::ApplicationResume),
            3 => Some(Self::ApplicationGetTileRect),
            4 => Some(Self::ApplicationHandleEvent),
            5 => Some(Self::ApplicationWriteShellMsg),
            _ => None,
        }
    }
}

static TABLE: [AtomicPtr<c_void>; VIRTUAL_METHOD_COUNT] =
    [const { AtomicPtr::new(ptr::null_mut()) }; VIRTUAL_METHOD_COUNT];

pub fn override_method(method: VirtualMethod, function: *mut c_void) {
    TABLE[method as usize].store(function, Ordering::Release);
}

/// The raw slot value; null means native default behavior.
pub fn get_override(method: VirtualMethod) -> *mut c_void {
    TABLE[method as usize].load(Ordering::Acquire)
}

/// Install a host override for a virtual method, shared by all instances
/// of the overridable type. The native side cannot validate the function
/// pointer's signature or calling convention; that contract is the host's
/// to uphold.
#[no_mangle]
pub extern "C" fn TfOverrideMethod(method: i32, function: *mut c_void) -> ErrorCode {
    let Some(method) = VirtualMethod::from_i32(method) else {
        return ErrorCode::ARGUMENT_OUT_OF_RANGE;
    };
    override_method(method, function);
    ErrorCode::SUCCESS
}
