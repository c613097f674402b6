//! Two-state check box.

use std::os::raw::{c_char, c_void};

use crate::checked::{self, boundary_exports, Bool, Boundary, FALSE, TRUE};
use crate::error::{Error, ErrorCode};
use crate::events::{ev, Event};
use crate::handler::{EventHandler, EventHandlerFn};
use crate::marshal;
use crate::screen::{palette, DrawSurface};
use crate::view::{ViewCore, ViewKind, Widget};

#[repr(C)]
pub struct CheckBox {
    core: ViewCore,
    text: String,
    // Bit 0 carries the checked state; the remaining bits are reserved
    // for multi-state variants.
    value: u16,
    state_changed: EventHandler,
}

impl Default for CheckBox {
    fn default() -> Self {
        Self {
            core: ViewCore::new(ViewKind::CheckBox),
            text: String::new(),
            value: 0,
            state_changed: EventHandler::empty(),
        }
    }
}

impl Boundary for CheckBox {}

impl CheckBox {
    pub fn checked(&self) -> bool {
        self.value & 0x0001 != 0
    }

    pub fn set_checked(&mut self, checked: bool) {
        if self.checked() != checked {
            self.value ^= 0x0001;
            self.state_changed.invoke();
        }
    }

    pub fn toggle(&mut self) {
        self.set_checked(!self.checked());
    }
}

impl Widget for CheckBox {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn draw(&mut self, surface: &mut DrawSurface) {
        let (fg, bg) = if self.core.is_focused() {
            (palette::FOCUSED_FG, palette::FOCUSED_BG)
        } else {
            (palette::CONTROL_FG, palette::CONTROL_BG)
        };
        surface.fill_row(0, fg, bg);
        let mark = if self.checked() { 'X' } else { ' ' };
        surface.draw_str(0, 0, &format!("[{mark}] {}", self.text), fg, bg);
    }

    fn handle_event(&mut self, event: &mut Event) {
        if !self.core.is_enabled() {
            return;
        }
        let toggled = match event.what {
            ev::KEY_DOWN if self.core.is_focused() => {
                event.key_down.text_char() == Some(' ')
            }
            ev::MOUSE_DOWN => self.core.bounds.contains(event.mouse.pos),
            _ => false,
        };
        if toggled {
            event.clear();
            self.toggle();
        }
    }
}

boundary_exports!(
    CheckBox,
    TfCheckBoxNew,
    TfCheckBoxDelete,
    TfCheckBoxEquals,
    TfCheckBoxHash
);

#[no_mangle]
pub extern "C" fn TfCheckBoxGetText(this: *const CheckBox, out: *mut *mut c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        let exported = marshal::export_string(unsafe { &(*this).text })?;
        unsafe { *out = exported };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfCheckBoxSetText(this: *mut CheckBox, value: *const c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        let text = unsafe { marshal::borrow_str(value) }?;
        unsafe { (*this).text = text.to_owned() };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfCheckBoxGetChecked(this: *const CheckBox, out: *mut Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = if (*this).checked() { TRUE } else { FALSE } };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfCheckBoxSetChecked(this: *mut CheckBox, value: Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).set_checked(value != FALSE) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfCheckBoxSetStateChangedEventHandler(
    this: *mut CheckBox,
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe {
            (*this).state_changed = match function {
                Some(f) => EventHandler::new(f, user_data),
                None => EventHandler::empty(),
            };
        }
        Ok(())
    })
}
