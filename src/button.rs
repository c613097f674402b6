//! Push button.

use std::os::raw::{c_char, c_void};

use bitflags::bitflags;

use crate::checked::{self, boundary_exports, Bool, Boundary, FALSE, TRUE};
use crate::error::{Error, ErrorCode};
use crate::events::{ev, Event};
use crate::handler::{EventHandler, EventHandlerFn};
use crate::marshal;
use crate::screen::{palette, DrawSurface};
use crate::terminal::kb;
use crate::view::{ViewCore, ViewKind, Widget};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ButtonFlags: u16 {
        const IS_DEFAULT  = 0x0001;
        const ALIGN_LEFT  = 0x0002;
        const GRABS_FOCUS = 0x0004;
    }
}

#[repr(C)]
pub struct Button {
    core: ViewCore,
    text: String,
    flags: ButtonFlags,
    click: EventHandler,
}

impl Default for Button {
    fn default() -> Self {
        Self {
            core: ViewCore::new(ViewKind::Button),
            text: String::new(),
            flags: ButtonFlags::empty(),
            click: EventHandler::empty(),
        }
    }
}

impl Boundary for Button {}

impl Button {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Fires the click handler, when the button can act.
    pub fn press(&mut self) {
        if self.core.is_enabled() && self.core.is_visible() {
            self.click.invoke();
        }
    }
}

impl Widget for Button {
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
        surface.fill(fg, bg);
        let label = format!("[ {} ]", self.text);
        let x = if self.flags.contains(ButtonFlags::ALIGN_LEFT) {
            0
        } else {
            (surface.width() - label.len() as i32).max(0) / 2
        };
        let y = surface.height() / 2;
        surface.draw_str(x, y, &label, fg, bg);
    }

    fn handle_event(&mut self, event: &mut Event) {
        if !self.core.is_enabled() {
            return;
        }
        let pressed = match event.what {
            ev::KEY_DOWN if self.core.is_focused() => {
                event.key_down.key_code == kb::ENTER || event.key_down.text_char() == Some(' ')
            }
            ev::MOUSE_DOWN => self.core.bounds.contains(event.mouse.pos),
            _ => false,
        };
        if pressed {
            event.clear();
            self.press();
        }
    }
}

boundary_exports!(Button, TfButtonNew, TfButtonDelete, TfButtonEquals, TfButtonHash);

#[no_mangle]
pub extern "C" fn TfButtonGetText(this: *const Button, out: *mut *mut c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        let exported = marshal::export_string(unsafe { (*this).text() })?;
        unsafe { *out = exported };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfButtonSetText(this: *mut Button, value: *const c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        let text = unsafe { marshal::borrow_str(value) }?;
        unsafe { (*this).text = text.to_owned() };
        Ok(())
    })
}

macro_rules! button_flag_exports {
    ($flag:expr, $get:ident, $set:ident) => {
        #[no_mangle]
        pub extern "C" fn $get(this: *const Button, out: *mut Bool) -> ErrorCode {
            checked::ffi_guard(|| {
                if this.is_null() || out.is_null() {
                    return Err(Error::ArgumentNull);
                }
                unsafe { *out = if (*this).flags.contains($flag) { TRUE } else { FALSE } };
                Ok(())
            })
        }

        #[no_mangle]
        pub extern "C" fn $set(this: *mut Button, value: Bool) -> ErrorCode {
            checked::ffi_guard(|| {
                if this.is_null() {
                    return Err(Error::ArgumentNull);
                }
                unsafe { (*this).flags.set($flag, value != FALSE) };
                Ok(())
            })
        }
    };
}

button_flag_exports!(ButtonFlags::IS_DEFAULT, TfButtonGetIsDefault, TfButtonSetIsDefault);
button_flag_exports!(ButtonFlags::GRABS_FOCUS, TfButtonGetGrabsFocus, TfButtonSetGrabsFocus);

/// Text alignment: 0 centered, 1 left.
#[no_mangle]
pub extern "C" fn TfButtonGetTextAlign(this: *const Button, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe {
            *out = if (*this).flags.contains(ButtonFlags::ALIGN_LEFT) { 1 } else { 0 };
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfButtonSetTextAlign(this: *mut Button, value: i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        if !(0..=1).contains(&value) {
            return Err(Error::ArgumentOutOfRange);
        }
        unsafe { (*this).flags.set(ButtonFlags::ALIGN_LEFT, value == 1) };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfButtonSetClickEventHandler(
    this: *mut Button,
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe {
            (*this).click = match function {
                Some(f) => EventHandler::new(f, user_data),
                None => EventHandler::empty(),
            };
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfButtonPress(this: *mut Button) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).press() };
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::KeyDownEvent;
    use crate::geometry::Rect;
    use crate::handler::tests::count_calls;
    use crate::screen::Buffer;
    use crate::view::StateFlags;

    fn counting_button(count: &mut u32) -> Button {
        let mut button = Button::default();
        assert!(TfButtonSetClickEventHandler(
            &mut button,
            Some(count_calls),
            count as *mut u32 as *mut c_void,
        )
        .is_success());
        button
    }

    #[test]
    fn press_fires_click_handler() {
        let mut count = 0u32;
        let mut button = counting_button(&mut count);
        button.press();
        button.press();
        assert_eq!(count, 2);
    }

    #[test]
    fn disabled_button_does_not_fire() {
        let mut count = 0u32;
        let mut button = counting_button(&mut count);
        assert!(
            crate::view::TfControlSetEnabled(button.core_mut(), FALSE).is_success()
        );
        button.press();
        assert_eq!(count, 0);
    }

    #[test]
    fn handler_is_replaced_wholesale() {
        let mut first = 0u32;
        let mut second = 0u32;
        let mut button = counting_button(&mut first);
        assert!(TfButtonSetClickEventHandler(
            &mut button,
            Some(count_calls),
            &mut second as *mut u32 as *mut c_void,
        )
        .is_success());
        button.press();
        assert_eq!((first, second), (0, 1));
    }

    #[test]
    fn clearing_the_handler_makes_press_a_noop() {
        let mut count = 0u32;
        let mut button = counting_button(&mut count);
        assert!(
            TfButtonSetClickEventHandler(&mut button, None, std::ptr::null_mut()).is_success()
        );
        button.press();
        assert_eq!(count, 0);
    }

    #[test]
    fn enter_presses_the_focused_button() {
        let mut count = 0u32;
        let mut button = counting_button(&mut count);
        button.core_mut().state.insert(StateFlags::FOCUSED);

        let mut event = Event::key(KeyDownEvent::from_key(kb::ENTER, 0));
        button.handle_event(&mut event);
        assert_eq!(count, 1);
        assert!(event.is_nothing());

        // Unfocused button ignores the key.
        button.core_mut().state.remove(StateFlags::FOCUSED);
        let mut event = Event::key(KeyDownEvent::from_key(kb::ENTER, 0));
        button.handle_event(&mut event);
        assert_eq!(count, 1);
        assert!(!event.is_nothing());
    }

    #[test]
    fn mouse_down_inside_bounds_presses() {
        let mut count = 0u32;
        let mut button = counting_button(&mut count);
        button.core_mut().bounds = Rect::new(2, 1, 12, 2);

        let mut hit = Event::mouse(
            ev::MOUSE_DOWN,
            crate::events::MouseEventType {
                pos: crate::geometry::Point::new(5, 1),
                ..Default::default()
            },
        );
        button.handle_event(&mut hit);
        assert_eq!(count, 1);

        let mut miss = Event::mouse(
            ev::MOUSE_DOWN,
            crate::events::MouseEventType {
                pos: crate::geometry::Point::new(0, 0),
                ..Default::default()
            },
        );
        button.handle_event(&mut miss);
        assert_eq!(count, 1);
    }

    #[test]
    fn text_round_trips_through_owned_string() {
        let mut button = Button::default();
        let text = std::ffi::CString::new("OK").unwrap();
        assert!(TfButtonSetText(&mut button, text.as_ptr()).is_success());

        let mut out: *mut c_char = std::ptr::null_mut();
        assert!(TfButtonGetText(&button, &mut out).is_success());
        let round = unsafe { std::ffi::CStr::from_ptr(out) };
        assert_eq!(round.to_str().unwrap(), "OK");
        unsafe { libc::free(out as *mut c_void) };
    }

    #[test]
    fn text_align_is_range_checked() {
        let mut button = Button::default();
        assert!(TfButtonSetTextAlign(&mut button, 1).is_success());
        let mut align = 0;
        assert!(TfButtonGetTextAlign(&button, &mut align).is_success());
        assert_eq!(align, 1);
        assert_eq!(
            TfButtonSetTextAlign(&mut button, 2),
            ErrorCode::ARGUMENT_OUT_OF_RANGE
        );
    }

    #[test]
    fn draw_centers_the_label() {
        let mut button = Button::default();
        button.set_text("Go");
        button.core_mut().bounds = Rect::new(0, 0, 10, 1);

        let mut buffer = Buffer::new(10, 1);
        let mut surface = DrawSurface::new(&mut buffer, button.core().bounds);
        button.draw(&mut surface);
        assert_eq!(buffer.row_text(0), "  [ Go ]");
    }
}
