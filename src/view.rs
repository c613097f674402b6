//! Common control state and the control-level exports.
//!
//! Every widget embeds [`ViewCore`] as its first field and is
//! `#[repr(C)]`, so a widget pointer is a valid `*mut ViewCore` and the
//! `TfControl*` exports work on any of them. The `kind` tag recovers
//! the concrete type for drawing and event dispatch.

use std::ptr;

use bitflags::bitflags;

use crate::checked::{self, Bool, FALSE, TRUE};
use crate::error::{Error, ErrorCode};
use crate::events::Event;
use crate::geometry::Rect;
use crate::screen::DrawSurface;

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StateFlags: u16 {
        const VISIBLE  = 0x0001;
        const DISABLED = 0x0002;
        const FOCUSED  = 0x0004;
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Button = 0,
    CheckBox = 1,
    RadioButtonGroup = 2,
    ListBox = 3,
    TextBox = 4,
    Label = 5,
    Form = 6,
}

/// Shared head of every widget struct. Must stay the first field of
/// each `#[repr(C)]` widget so control exports can address any of them.
#[repr(C)]
#[derive(Debug)]
pub struct ViewCore {
    pub kind: ViewKind,
    pub bounds: Rect,
    pub state: StateFlags,
    pub can_focus: Bool,
    pub tab_index: i32,
    pub owner: *mut ViewCore,
}

impl ViewCore {
    pub fn new(kind: ViewKind) -> Self {
        let can_focus = match kind {
            ViewKind::Label | ViewKind::Form => FALSE,
            _ => TRUE,
        };
        Self {
            kind,
            bounds: Rect::default(),
            state: StateFlags::VISIBLE,
            can_focus,
            tab_index: 0,
            owner: ptr::null_mut(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.state.contains(StateFlags::VISIBLE)
    }

    pub fn is_enabled(&self) -> bool {
        !self.state.contains(StateFlags::DISABLED)
    }

    pub fn is_focused(&self) -> bool {
        self.state.contains(StateFlags::FOCUSED)
    }

    pub fn focusable(&self) -> bool {
        self.can_focus != FALSE && self.is_visible() && self.is_enabled()
    }

    fn set_flag(&mut self, flag: StateFlags, on: bool) {
        self.state.set(flag, on);
    }
}

/// Widget behavior behind the `kind` dispatch. Implementations draw
/// into a surface clipped to their own bounds and may consume the
/// event by clearing it.
pub(crate) trait Widget {
    fn core(&self) -> &ViewCore;
    fn core_mut(&mut self) -> &mut ViewCore;
    fn draw(&mut self, surface: &mut DrawSurface);
    fn handle_event(&mut self, event: &mut Event);
}

/// Recovers the concrete widget behind a core pointer.
///
/// # Safety
/// `core` must point at a live widget whose `kind` tag matches its
/// concrete type, and the returned borrow must not outlive it.
pub(crate) unsafe fn as_widget<'a>(core: *mut ViewCore) -> &'a mut dyn Widget {
    match (*core).kind {
        ViewKind::Button => &mut *(core as *mut crate::button::Button),
        ViewKind::CheckBox => &mut *(core as *mut crate::checkbox::CheckBox),
        ViewKind::RadioButtonGroup => &mut *(core as *mut crate::radio_group::RadioButtonGroup),
        ViewKind::ListBox => &mut *(core as *mut crate::listbox::ListBox),
        ViewKind::TextBox => &mut *(core as *mut crate::textbox::TextBox),
        ViewKind::Label => &mut *(core as *mut crate::label::Label),
        ViewKind::Form => &mut *(core as *mut crate::form::Form),
    }
}

fn with_core<R>(
    this: *mut ViewCore,
    f: impl FnOnce(&mut ViewCore) -> R,
) -> Result<R, Error> {
    if this.is_null() {
        return Err(Error::ArgumentNull);
    }
    Ok(f(unsafe { &mut *this }))
}

// ============================================================================
// Control exports
// ============================================================================

#[no_mangle]
pub extern "C" fn TfControlGetBounds(this: *mut ViewCore, out: *mut Rect) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_core(this, |core| unsafe { *out = core.bounds })
    })
}

#[no_mangle]
pub extern "C" fn TfControlSetBounds(this: *mut ViewCore, value: *const Rect) -> ErrorCode {
    checked::ffi_guard(|| {
        if value.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_core(this, |core| core.bounds = unsafe { *value })
    })
}

macro_rules! state_flag_exports {
    ($flag:expr, $invert:expr, $get:ident, $set:ident) => {
        #[no_mangle]
        pub extern "C" fn $get(this: *mut ViewCore, out: *mut Bool) -> ErrorCode {
            checked::ffi_guard(|| {
                if out.is_null() {
                    return Err(Error::ArgumentNull);
                }
                with_core(this, |core| {
                    let set = core.state.contains($flag) != $invert;
                    unsafe { *out = if set { TRUE } else { FALSE } };
                })
            })
        }

        #[no_mangle]
        pub extern "C" fn $set(this: *mut ViewCore, value: Bool) -> ErrorCode {
            checked::ffi_guard(|| {
                with_core(this, |core| {
                    core.set_flag($flag, (value != FALSE) != $invert);
                })
            })
        }
    };
}

state_flag_exports!(
    StateFlags::VISIBLE,
    false,
    TfControlGetVisible,
    TfControlSetVisible
);
state_flag_exports!(
    StateFlags::DISABLED,
    true,
    TfControlGetEnabled,
    TfControlSetEnabled
);

#[no_mangle]
pub extern "C" fn TfControlGetFocused(this: *mut ViewCore, out: *mut Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_core(this, |core| unsafe {
            *out = if core.is_focused() { TRUE } else { FALSE };
        })
    })
}

#[no_mangle]
pub extern "C" fn TfControlGetCanFocus(this: *mut ViewCore, out: *mut Bool) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_core(this, |core| unsafe { *out = core.can_focus })
    })
}

#[no_mangle]
pub extern "C" fn TfControlSetCanFocus(this: *mut ViewCore, value: Bool) -> ErrorCode {
    checked::ffi_guard(|| with_core(this, |core| core.can_focus = value))
}

#[no_mangle]
pub extern "C" fn TfControlGetTabIndex(this: *mut ViewCore, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_core(this, |core| unsafe { *out = core.tab_index })
    })
}

#[no_mangle]
pub extern "C" fn TfControlSetTabIndex(this: *mut ViewCore, value: i32) -> ErrorCode {
    checked::ffi_guard(|| with_core(this, |core| core.tab_index = value))
}

#[no_mangle]
pub extern "C" fn TfControlGetParent(
    this: *mut ViewCore,
    out: *mut *mut ViewCore,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_core(this, |core| unsafe { *out = core.owner })
    })
}

/// Moves focus to this control within its owning form. A no-op when the
/// control is not focusable or has no owner.
#[no_mangle]
pub extern "C" fn TfControlFocus(this: *mut ViewCore) -> ErrorCode {
    checked::ffi_guard(|| {
        if this.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe {
            let core = &mut *this;
            if !core.focusable() {
                return Ok(());
            }
            let owner = core.owner;
            if owner.is_null() || (*owner).kind != ViewKind::Form {
                return Ok(());
            }
            (*(owner as *mut crate::form::Form)).focus_child(this);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_core_defaults() {
        let core = ViewCore::new(ViewKind::Button);
        assert!(core.is_visible());
        assert!(core.is_enabled());
        assert!(!core.is_focused());
        assert!(core.focusable());

        let label = ViewCore::new(ViewKind::Label);
        assert!(!label.focusable());
    }

    #[test]
    fn disabled_control_is_not_focusable() {
        let mut core = ViewCore::new(ViewKind::CheckBox);
        core.set_flag(StateFlags::DISABLED, true);
        assert!(!core.focusable());
        assert!(!core.is_enabled());
    }

    #[test]
    fn visible_flag_round_trips_through_exports() {
        let mut core = ViewCore::new(ViewKind::Button);
        assert!(TfControlSetVisible(&mut core, FALSE).is_success());
        assert!(!core.is_visible());

        let mut out = TRUE;
        assert!(TfControlGetVisible(&mut core, &mut out).is_success());
        assert_eq!(out, FALSE);
    }

    #[test]
    fn enabled_export_inverts_the_disabled_flag() {
        let mut core = ViewCore::new(ViewKind::Button);
        assert!(TfControlSetEnabled(&mut core, FALSE).is_success());
        assert!(core.state.contains(StateFlags::DISABLED));

        let mut out = TRUE;
        assert!(TfControlGetEnabled(&mut core, &mut out).is_success());
        assert_eq!(out, FALSE);
    }

    #[test]
    fn bounds_round_trip() {
        let mut core = ViewCore::new(ViewKind::Button);
        let bounds = Rect::new(2, 3, 12, 5);
        assert!(TfControlSetBounds(&mut core, &bounds).is_success());

        let mut out = Rect::default();
        assert!(TfControlGetBounds(&mut core, &mut out).is_success());
        assert_eq!(out, bounds);
    }

    #[test]
    fn null_arguments_are_rejected() {
        let mut core = ViewCore::new(ViewKind::Button);
        assert_eq!(
            TfControlGetBounds(std::ptr::null_mut(), &mut Rect::default()),
            ErrorCode::ARGUMENT_NULL
        );
        assert_eq!(
            TfControlGetBounds(&mut core, std::ptr::null_mut()),
            ErrorCode::ARGUMENT_NULL
        );
    }
}
