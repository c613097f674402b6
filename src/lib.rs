//! tfcore — native core of a terminal-forms binding.
//!
//! A flat C ABI over a small widget toolkit: forms, buttons, check
//! boxes, radio groups, list boxes, text boxes, and labels, plus the
//! geometry and event value types they exchange. Every exported entry
//! point returns an [`error::ErrorCode`] and reports failures through a
//! thread-local message channel; no panic crosses the boundary.
//!
//! The module split mirrors the layering: `checked`, `marshal`,
//! `handler`, and `vtable` are the boundary protocol; `screen`,
//! `terminal`, and `view` are the toolkit substrate; the widget modules
//! instantiate the protocol per type; `application` runs the loop.

// Exported functions take raw pointers across the C ABI by contract.
// Marking them `unsafe fn` would change the exported signature; null
// guards inside each body do the validation instead.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

mod application;
mod button;
mod checkbox;
mod checked;
mod context;
mod error;
mod events;
mod form;
mod geometry;
mod handler;
mod label;
mod listbox;
mod marshal;
mod radio_group;
mod screen;
mod terminal;
mod textbox;
mod view;
mod vtable;

use error::{Error, ErrorCode};

/// Smoke-test entry point: proves the library loads and the calling
/// convention lines up before the host touches anything stateful.
#[no_mangle]
pub extern "C" fn TfHealthCheck(out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = 123 };
        Ok(())
    })
}
