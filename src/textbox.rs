//! Single-line text editor.

use std::os::raw::{c_char, c_void};

use crate::checked::{self, boundary_exports, Boundary};
use crate::error::{Error, ErrorCode};
use crate::events::{ev, Event};
use crate::handler::{EventHandler, EventHandlerFn};
use crate::marshal;
use crate::screen::{palette, Cell, DrawSurface};
use crate::terminal::kb;
use crate::view::{ViewCore, ViewKind, Widget};

/// Hard cap on the editable text, in characters.
pub const TEXT_BOX_MAX_LENGTH: i32 = 256;

#[repr(C)]
pub struct TextBox {
    core: ViewCore,
    text: String,
    max_length: i32,
    /// Caret position in characters, 0..=len.
    cursor: i32,
    selection_start: i32,
    selection_length: i32,
    text_changed: EventHandler,
}

impl Default for TextBox {
    fn default() -> Self {
        Self {
            core: ViewCore::new(ViewKind::TextBox),
            text: String::new(),
            max_length: TEXT_BOX_MAX_LENGTH,
            cursor: 0,
            selection_start: 0,
            selection_length: 0,
            text_changed: EventHandler::empty(),
        }
    }
}

impl Boundary for TextBox {}

impl TextBox {
    pub fn text(&self) -> &str {
        &self.text
    }

    fn char_count(&self) -> i32 {
        self.text.chars().count() as i32
    }

    fn byte_offset(&self, chars: i32) -> usize {
        self.text
            .char_indices()
            .nth(chars as usize)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    /// Replaces the whole text, resetting caret and selection. Fires
    /// text-changed only when the content actually differs.
    pub fn set_text(&mut self, text: &str) {
        let truncated: String = text.chars().take(self.max_length as usize).collect();
        self.cursor = 0;
        self.selection_start = 0;
        self.selection_length = 0;
        if truncated != self.text {
            self.text = truncated;
            self.text_changed.invoke();
        }
    }

    pub fn select_range(&mut self, start: i32, length: i32) {
        let count = self.char_count();
        let start = start.clamp(0, count);
        let length = length.clamp(0, count - start);
        self.selection_start = start;
        self.selection_length = length;
        self.cursor = start + length;
    }

    pub fn select_all(&mut self) {
        self.select_range(0, self.char_count());
    }

    pub fn selected_text(&self) -> &str {
        let start = self.byte_offset(self.selection_start);
        let end = self.byte_offset(self.selection_start + self.selection_length);
        &self.text[start..end]
    }

    pub fn clear(&mut self) {
        self.set_text("");
    }

    fn delete_selection(&mut self) {
        if self.selection_length == 0 {
            return;
        }
        let start = self.byte_offset(self.selection_start);
        let end = self.byte_offset(self.selection_start + self.selection_length);
        self.text.replace_range(start..end, "");
        self.cursor = self.selection_start;
        self.selection_length = 0;
    }

    fn insert_char(&mut self, c: char) {
        self.delete_selection();
        if self.char_count() >= self.max_length {
            return;
        }
        let at = self.byte_offset(self.cursor);
        self.text.insert(at, c);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.selection_length > 0 {
            self.delete_selection();
        } else if self.cursor > 0 {
            let start = self.byte_offset(self.cursor - 1);
            let end = self.byte_offset(self.cursor);
            self.text.replace_range(start..end, "");
            self.cursor -= 1;
        }
    }

    fn delete_forward(&mut self) {
        if self.selection_length > 0 {
            self.delete_selection();
        } else if self.cursor < self.char_count() {
            let start = self.byte_offset(self.cursor);
            let end = self.byte_offset(self.cursor + 1);
            self.text.replace_range(start..end, "");
        }
    }

    fn move_cursor(&mut self, to: i32) {
        self.cursor = to.clamp(0, self.char_count());
        self.selection_length = 0;
        self.selection_start = self.cursor;
    }
}

impl Widget for TextBox {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn draw(&mut self, surface: &mut DrawSurface) {
        let focused = self.core.is_focused();
        surface.fill_row(0, palette::CONTROL_FG, palette::SELECTED_BG);
        surface.draw_str(0, 0, &self.text, palette::FOCUSED_FG, palette::SELECTED_BG);
        if focused {
            let under = self.text.chars().nth(self.cursor as usize).unwrap_or(' ');
            surface.put(
                self.cursor,
                0,
                Cell::new(under, palette::SELECTED_BG, palette::FOCUSED_FG),
            );
        }
    }

    fn handle_event(&mut self, event: &mut Event) {
        if !self.core.is_enabled() || !self.core.is_focused() || event.what != ev::KEY_DOWN {
            return;
        }
        let before = self.text.clone();
        let key = event.key_down;
        let handled = match key.key_code {
            kb::BACKSPACE => {
                self.backspace();
                true
            }
            kb::DELETE => {
                self.delete_forward();
                true
            }
            kb::LEFT => {
                self.move_cursor(self.cursor - 1);
                true
            }
            kb::RIGHT => {
                self.move_cursor(self.cursor + 1);
                true
            }
            kb::HOME => {
                self.move_cursor(0);
                true
            }
            kb::END => {
                self.move_cursor(self.char_count());
                true
            }
            _ => match key.text_char() {
                Some(c) if !c.is_control() => {
                    self.insert_char(c);
                    true
                }
                _ => false,
            },
        };
        if handled {
            event.clear();
            if self.text != before {
                self.text_changed.invoke();
            }
        }
    }
}

boundary_exports!(TextBox, TfTextBoxNew, TfTextBoxDelete, TfTextBoxEquals, TfTextBoxHash);

fn with_textbox<R>(
    this: *mut TextBox,
    f: impl FnOnce(&mut TextBox) -> Result<R, Error>,
) -> Result<R, Error> {
    if this.is_null() {
        return Err(Error::ArgumentNull);
    }
    f(unsafe { &mut *this })
}

#[no_mangle]
pub extern "C" fn TfTextBoxGetText(this: *mut TextBox, out: *mut *mut c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_textbox(this, |textbox| {
            let exported = marshal::export_string(&textbox.text)?;
            unsafe { *out = exported };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxSetText(this: *mut TextBox, value: *const c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        let text = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_textbox(this, |textbox| {
            textbox.set_text(&text);
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxGetMaxLength(this: *mut TextBox, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_textbox(this, |textbox| {
            unsafe { *out = textbox.max_length };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxSetMaxLength(this: *mut TextBox, value: i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if !(1..=TEXT_BOX_MAX_LENGTH).contains(&value) {
            return Err(Error::ArgumentOutOfRange);
        }
        with_textbox(this, |textbox| {
            textbox.max_length = value;
            if textbox.char_count() > value {
                let truncated: String = textbox.text.chars().take(value as usize).collect();
                textbox.set_text(&truncated);
            }
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxGetSelectionStart(this: *mut TextBox, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_textbox(this, |textbox| {
            unsafe { *out = textbox.selection_start };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxGetSelectionLength(this: *mut TextBox, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_textbox(this, |textbox| {
            unsafe { *out = textbox.selection_length };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxGetSelectedText(
    this: *mut TextBox,
    out: *mut *mut c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_textbox(this, |textbox| {
            let exported = marshal::export_string(textbox.selected_text())?;
            unsafe { *out = exported };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxSelectRange(this: *mut TextBox, start: i32, length: i32) -> ErrorCode {
    checked::ffi_guard(|| {
        with_textbox(this, |textbox| {
            textbox.select_range(start, length);
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxSelectAll(this: *mut TextBox) -> ErrorCode {
    checked::ffi_guard(|| {
        with_textbox(this, |textbox| {
            textbox.select_all();
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxClear(this: *mut TextBox) -> ErrorCode {
    checked::ffi_guard(|| {
        with_textbox(this, |textbox| {
            textbox.clear();
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfTextBoxSetTextChangedEventHandler(
    this: *mut TextBox,
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
) -> ErrorCode {
    checked::ffi_guard(|| {
        with_textbox(this, |textbox| {
            textbox.text_changed = match function {
                Some(f) => EventHandler::new(f, user_data),
                None => EventHandler::empty(),
            };
            Ok(())
        })
    })
}
