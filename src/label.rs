//! Static text label with an optional `&x` mnemonic marker.

use std::os::raw::c_char;

use crate::checked::{self, boundary_exports, Bool, Boundary, FALSE, TRUE};
use crate::error::{Error, ErrorCode};
use crate::events::Event;
use crate::geometry::Rect;
use crate::marshal;
use crate::screen::{palette, DrawSurface};
use crate::view::{ViewCore, ViewKind, Widget};

#[repr(C)]
pub struct Label {
    core: ViewCore,
    text: String,
    use_mnemonic: Bool,
}

impl Default for Label {
    fn default() -> Self {
        Self {
            core: ViewCore::new(ViewKind::Label),
            text: String::new(),
            use_mnemonic: TRUE,
        }
    }
}

impl Boundary for Label {}

impl Label {
    pub fn new(bounds: Rect, text: impl Into<String>) -> Self {
        let mut label = Self::default();
        label.core.bounds = bounds;
        label.text = text.into();
        label
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The character after the first `&`, when mnemonics are on.
    pub fn mnemonic(&self) -> Option<char> {
        if self.use_mnemonic == FALSE {
            return None;
        }
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if c == '&' {
                return chars.next().filter(|&c| c != '&');
            }
        }
        None
    }

    /// Display text with the mnemonic marker stripped.
    fn display_text(&self) -> String {
        if self.use_mnemonic == FALSE {
            return self.text.clone();
        }
        let mut out = String::with_capacity(self.text.len());
        let mut chars = self.text.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '&' {
                if let Some(&next) = chars.peek() {
                    out.push(next);
                    chars.next();
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl Widget for Label {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn draw(&mut self, surface: &mut DrawSurface) {
        let text = self.display_text();
        surface.fill_row(0, palette::CONTROL_FG, palette::CONTROL_BG);
        surface.draw_str(0, 0, &text, palette::CONTROL_FG, palette::CONTROL_BG);
        // Highlight the mnemonic character in place.
        if let Some(hot) = self.mnemonic() {
            if let Some(offset) = text.chars().position(|c| c == hot) {
                surface.draw_str(
                    offset as i32,
                    0,
                    &hot.to_string(),
                    palette::SHORTCUT_FG,
                    palette::CONTROL_BG,
                );
            }
        }
    }

    fn handle_event(&mut self, _event: &mut Event) {}
}

boundary_exports!(Label, TfLabelNew, TfLabelDelete, TfLabelEquals, TfLabelHash);

#[no_mangle]
pub extern "C" fn TfLabelNew2(
    out: *mut *mut Label,
    bounds: *const Rect,
    text: *const c_char,
) -> ErrorCode {
    if bounds.is_null() {
        return ErrorCode::ARGUMENT_NULL;
    }
    let text = match unsafe { marshal::borrow_str(text) } {
        Ok(text) => text.to_owned(),
        Err(e) => return e.into_code(),
    };
    let label = Label::new(unsafe { *bounds }, text);
    checked::checked_new_with(out, label)
}

#[no_mangle]
pub extern "C" fn TfLabelGetText(this: *const Label, out: *mut *mut c_char) -> ErrorCode {
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
pub extern "C" fn TfLabelSetText(this: *mut Label, value: *const c_char) -> ErrorCode {
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
pub extern "C" fn TfLabelGetUseMnemonic(this: *const Label, out: *mut Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = (*this).use_mnemonic };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfLabelSetUseMnemonic(this: *mut Label, value: Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).use_mnemonic = value };
        Ok(())
    })
}
