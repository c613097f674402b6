//! Event payload types exposed across the boundary.
//!
//! All four are value types with structural equality and the placement
//! trio, so the host can stack-allocate them. The `what` selector of
//! [`Event`] decides which payload is live; equality only inspects the
//! live payload.

use std::os::raw::c_void;

use crate::checked::{
    self, boundary_exports, combine_hash, placement_exports, Boundary,
};
use crate::error::{Error, ErrorCode};
use crate::geometry::{field_accessors, Point};

/// Event class masks for [`Event::what`].
pub mod ev {
    pub const NOTHING: u16 = 0x0000;
    pub const MOUSE_DOWN: u16 = 0x0001;
    pub const MOUSE_UP: u16 = 0x0002;
    pub const MOUSE_MOVE: u16 = 0x0004;
    pub const MOUSE_AUTO: u16 = 0x0008;
    pub const KEY_DOWN: u16 = 0x0010;
    pub const COMMAND: u16 = 0x0100;
    pub const BROADCAST: u16 = 0x0200;

    pub const MOUSE: u16 = MOUSE_DOWN | MOUSE_UP | MOUSE_MOVE | MOUSE_AUTO;
    pub const MESSAGE: u16 = COMMAND | BROADCAST;
}

/// Standard command codes carried by `evCommand` events.
pub mod cm {
    pub const QUIT: u16 = 1;
    pub const CLOSE: u16 = 4;
}

// ============================================================================
// MouseEventType
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MouseEventType {
    pub pos: Point,
    pub event_flags: u16,
    pub control_key_state: u16,
    pub buttons: u8,
    pub wheel: u8,
}

impl Boundary for MouseEventType {
    fn boundary_eq(&self, other: &Self) -> bool {
        self == other
    }

    fn boundary_hash(&self) -> i32 {
        let mut seed = 0;
        combine_hash(self.pos.boundary_hash(), &mut seed);
        combine_hash(self.event_flags, &mut seed);
        combine_hash(self.control_key_state, &mut seed);
        combine_hash(self.buttons, &mut seed);
        combine_hash(self.wheel, &mut seed);
        seed
    }
}

boundary_exports!(
    MouseEventType,
    TfMouseEventTypeNew,
    TfMouseEventTypeDelete,
    TfMouseEventTypeEquals,
    TfMouseEventTypeHash
);
placement_exports!(
    MouseEventType,
    TfMouseEventTypePlacementSize,
    TfMouseEventTypePlacementNew,
    TfMouseEventTypePlacementDelete
);

field_accessors!(MouseEventType, pos: Point, TfMouseEventTypeGetWhere, TfMouseEventTypeSetWhere);
field_accessors!(
    MouseEventType,
    event_flags: u16,
    TfMouseEventTypeGetEventFlags,
    TfMouseEventTypeSetEventFlags
);
field_accessors!(
    MouseEventType,
    control_key_state: u16,
    TfMouseEventTypeGetControlKeyState,
    TfMouseEventTypeSetControlKeyState
);
field_accessors!(MouseEventType, buttons: u8, TfMouseEventTypeGetButtons, TfMouseEventTypeSetButtons);
field_accessors!(MouseEventType, wheel: u8, TfMouseEventTypeGetWheel, TfMouseEventTypeSetWheel);

// ============================================================================
// KeyDownEvent
// ============================================================================

/// Longest UTF-8 sequence carried by one key press.
pub const MAX_KEY_TEXT: usize = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyDownEvent {
    pub key_code: u16,
    pub control_key_state: u16,
    pub text: [u8; MAX_KEY_TEXT],
    pub text_length: u8,
}

impl KeyDownEvent {
    pub fn from_key(key_code: u16, control_key_state: u16) -> Self {
        Self {
            key_code,
            control_key_state,
            ..Self::default()
        }
    }

    pub fn from_char(c: char, control_key_state: u16) -> Self {
        let mut event = Self {
            key_code: if c.is_ascii() { c as u16 } else { 0 },
            control_key_state,
            ..Self::default()
        };
        let mut buf = [0u8; MAX_KEY_TEXT];
        let encoded = c.encode_utf8(&mut buf);
        event.text[..encoded.len()].copy_from_slice(encoded.as_bytes());
        event.text_length = encoded.len() as u8;
        event
    }

    pub fn char_code(&self) -> u8 {
        (self.key_code & 0xFF) as u8
    }

    pub fn scan_code(&self) -> u8 {
        (self.key_code >> 8) as u8
    }

    pub fn text_bytes(&self) -> &[u8] {
        let len = (self.text_length as usize).min(MAX_KEY_TEXT);
        &self.text[..len]
    }

    /// The key text as a char, when the bytes form one valid scalar.
    pub fn text_char(&self) -> Option<char> {
        std::str::from_utf8(self.text_bytes())
            .ok()
            .and_then(|s| s.chars().next())
    }
}

impl Boundary for KeyDownEvent {
    fn boundary_eq(&self, other: &Self) -> bool {
        self.key_code == other.key_code
            && self.control_key_state == other.control_key_state
            && self.text_bytes() == other.text_bytes()
    }

    fn boundary_hash(&self) -> i32 {
        let mut seed = 0;
        combine_hash(self.key_code, &mut seed);
        combine_hash(self.control_key_state, &mut seed);
        combine_hash(self.text_length, &mut seed);
        for b in self.text_bytes() {
            combine_hash(*b, &mut seed);
        }
        seed
    }
}

boundary_exports!(
    KeyDownEvent,
    TfKeyDownEventNew,
    TfKeyDownEventDelete,
    TfKeyDownEventEquals,
    TfKeyDownEventHash
);
placement_exports!(
    KeyDownEvent,
    TfKeyDownEventPlacementSize,
    TfKeyDownEventPlacementNew,
    TfKeyDownEventPlacementDelete
);

field_accessors!(KeyDownEvent, key_code: u16, TfKeyDownEventGetKeyCode, TfKeyDownEventSetKeyCode);
field_accessors!(
    KeyDownEvent,
    control_key_state: u16,
    TfKeyDownEventGetControlKeyState,
    TfKeyDownEventSetControlKeyState
);

#[no_mangle]
pub extern "C" fn TfKeyDownEventGetCharCode(this: *const KeyDownEvent, out: *mut u8) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = (*this).char_code() };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfKeyDownEventSetCharCode(this: *mut KeyDownEvent, value: u8) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).key_code = ((*this).key_code & 0xFF00) | value as u16 };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfKeyDownEventGetScanCode(this: *const KeyDownEvent, out: *mut u8) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = (*this).scan_code() };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfKeyDownEventSetScanCode(this: *mut KeyDownEvent, value: u8) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { (*this).key_code = ((*this).key_code & 0x00FF) | ((value as u16) << 8) };
        Ok(())
    })
}

/// Borrows a pointer into the event's fixed text buffer; valid until the
/// event is mutated.
#[no_mangle]
pub extern "C" fn TfKeyDownEventGetText(
    this: *const KeyDownEvent,
    out: *mut *const u8,
    out_text_length: *mut u8,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || out.is_null() || out_text_length.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe {
            *out_text_length = (*this).text_length;
            *out = (*this).text.as_ptr();
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfKeyDownEventSetText(
    this: *mut KeyDownEvent,
    value: *const u8,
    text_length: u8,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() || (value.is_null() && text_length > 0) {
            return Err(Error::ArgumentNull);
        }
        if text_length as usize > MAX_KEY_TEXT {
            return Err(Error::BufferTooSmall);
        }
        unsafe {
            (*this).text = [0; MAX_KEY_TEXT];
            if text_length > 0 {
                std::ptr::copy_nonoverlapping(
                    value,
                    (*this).text.as_mut_ptr(),
                    text_length as usize,
                );
            }
            (*this).text_length = text_length;
        }
        Ok(())
    })
}

// ============================================================================
// MessageEvent
// ============================================================================

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MessageEvent {
    pub command: u16,
    pub info_ptr: *mut c_void,
}

impl Default for MessageEvent {
    fn default() -> Self {
        Self {
            command: 0,
            info_ptr: std::ptr::null_mut(),
        }
    }
}

impl Boundary for MessageEvent {
    fn boundary_eq(&self, other: &Self) -> bool {
        self.command == other.command && self.info_ptr == other.info_ptr
    }

    fn boundary_hash(&self) -> i32 {
        let mut seed = 0;
        combine_hash(self.command, &mut seed);
        combine_hash(self.info_ptr as usize, &mut seed);
        seed
    }
}

boundary_exports!(
    MessageEvent,
    TfMessageEventNew,
    TfMessageEventDelete,
    TfMessageEventEquals,
    TfMessageEventHash
);
placement_exports!(
    MessageEvent,
    TfMessageEventPlacementSize,
    TfMessageEventPlacementNew,
    TfMessageEventPlacementDelete
);

field_accessors!(MessageEvent, command: u16, TfMessageEventGetCommand, TfMessageEventSetCommand);
field_accessors!(
    MessageEvent,
    info_ptr: *mut c_void,
    TfMessageEventGetInfoPtr,
    TfMessageEventSetInfoPtr
);

// ============================================================================
// Event
// ============================================================================

/// A toolkit event. `what` selects the live payload; the other payloads
/// stay zeroed. (The original overlays them in a union — separate fields
/// keep the Rust layout fully defined while the accessors present the
/// same surface.)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Event {
    pub what: u16,
    pub mouse: MouseEventType,
    pub key_down: KeyDownEvent,
    pub message: MessageEvent,
}

impl Event {
    pub fn nothing() -> Self {
        Self::default()
    }

    pub fn key(key_down: KeyDownEvent) -> Self {
        Self {
            what: ev::KEY_DOWN,
            key_down,
            ..Self::default()
        }
    }

    pub fn mouse(what: u16, mouse: MouseEventType) -> Self {
        Self {
            what,
            mouse,
            ..Self::default()
        }
    }

    pub fn command(command: u16) -> Self {
        Self {
            what: ev::COMMAND,
            message: MessageEvent {
                command,
                info_ptr: std::ptr::null_mut(),
            },
            ..Self::default()
        }
    }

    /// Mark the event consumed so no later handler acts on it.
    pub fn clear(&mut self) {
        *self = Self::nothing();
    }

    pub fn is_nothing(&self) -> bool {
        self.what == ev::NOTHING
    }
}

impl Boundary for Event {
    fn boundary_eq(&self, other: &Self) -> bool {
        if self.what != other.what {
            return false;
        }
        match self.what {
            w if w & ev::MOUSE != 0 => self.mouse.boundary_eq(&other.mouse),
            ev::KEY_DOWN => self.key_down.boundary_eq(&other.key_down),
            w if w & ev::MESSAGE != 0 => self.message.boundary_eq(&other.message),
            _ => true,
        }
    }

    fn boundary_hash(&self) -> i32 {
        let mut seed = 0;
        combine_hash(self.what, &mut seed);
        match self.what {
            w if w & ev::MOUSE != 0 => combine_hash(self.mouse.boundary_hash(), &mut seed),
            ev::KEY_DOWN => combine_hash(self.key_down.boundary_hash(), &mut seed),
            w if w & ev::MESSAGE != 0 => combine_hash(self.message.boundary_hash(), &mut seed),
            _ => {}
        }
        seed
    }
}

boundary_exports!(Event, TfEventNew, TfEventDelete, TfEventEquals, TfEventHash);
placement_exports!(Event, TfEventPlacementSize, TfEventPlacementNew, TfEventPlacementDelete);

field_accessors!(Event, what: u16, TfEventGetWhat, TfEventSetWhat);
field_accessors!(Event, mouse: MouseEventType, TfEventGetMouse, TfEventSetMouse);
field_accessors!(Event, key_down: KeyDownEvent, TfEventGetKeyDown, TfEventSetKeyDown);
field_accessors!(Event, message: MessageEvent, TfEventGetMessage, TfEventSetMessage);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_event_equality_covers_text_content() {
        let a = KeyDownEvent::from_char('é', 0);
        let b = KeyDownEvent::from_char('é', 0);
        let c = KeyDownEvent::from_char('e', 0);
        assert!(a.boundary_eq(&b));
        assert_eq!(a.boundary_hash(), b.boundary_hash());
        assert!(!a.boundary_eq(&c));
    }

    #[test]
    fn key_text_round_trips_through_exports() {
        let mut event = KeyDownEvent::default();
        let text = "ß".as_bytes();
        assert!(TfKeyDownEventSetText(&mut event, text.as_ptr(), text.len() as u8).is_success());

        let mut ptr: *const u8 = std::ptr::null();
        let mut len = 0u8;
        assert!(TfKeyDownEventGetText(&event, &mut ptr, &mut len).is_success());
        let round = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
        assert_eq!(round, text);
        assert_eq!(event.text_char(), Some('ß'));
    }

    #[test]
    fn over_long_key_text_is_rejected() {
        let mut event = KeyDownEvent::default();
        let text = b"hello";
        assert_eq!(
            TfKeyDownEventSetText(&mut event, text.as_ptr(), text.len() as u8),
            ErrorCode::BUFFER_TOO_SMALL
        );
        assert_eq!(event.text_length, 0);
    }

    #[test]
    fn char_and_scan_codes_split_key_code() {
        let mut event = KeyDownEvent::from_key(0x1C0D, 0);
        assert_eq!(event.char_code(), 0x0D);
        assert_eq!(event.scan_code(), 0x1C);

        assert!(TfKeyDownEventSetCharCode(&mut event, 0x41).is_success());
        assert_eq!(event.key_code, 0x1C41);
        assert!(TfKeyDownEventSetScanCode(&mut event, 0x02).is_success());
        assert_eq!(event.key_code, 0x0241);
    }

    #[test]
    fn event_equality_follows_the_what_selector() {
        let mut a = Event::key(KeyDownEvent::from_char('x', 0));
        let mut b = Event::key(KeyDownEvent::from_char('x', 0));
        // A divergent *inactive* payload must not affect equality.
        b.mouse.buttons = 3;
        assert!(a.boundary_eq(&b));
        assert_eq!(a.boundary_hash(), b.boundary_hash());

        a.what = ev::MOUSE_DOWN;
        b.what = ev::MOUSE_DOWN;
        assert!(!a.boundary_eq(&b));
    }

    #[test]
    fn cleared_event_is_nothing() {
        let mut e = Event::command(cm::QUIT);
        assert!(!e.is_nothing());
        e.clear();
        assert!(e.is_nothing());
        assert!(e.boundary_eq(&Event::nothing()));
    }
}
