//! Radio button group: an items collection with exactly one selection.

use std::os::raw::{c_char, c_void};

use crate::checked::{self, boundary_exports, Boundary};
use crate::error::{Error, ErrorCode};
use crate::events::{ev, Event};
use crate::handler::{EventHandler, EventHandlerFn};
use crate::marshal;
use crate::screen::{palette, DrawSurface};
use crate::terminal::kb;
use crate::view::{ViewCore, ViewKind, Widget};

#[repr(C)]
pub struct RadioButtonGroup {
    core: ViewCore,
    items: Vec<String>,
    selected: i32,
    // Guards duplicate notifications when several code paths converge
    // on the same final index within one operation.
    last_fired: i32,
    selection_changed: EventHandler,
}

impl Default for RadioButtonGroup {
    fn default() -> Self {
        Self {
            core: ViewCore::new(ViewKind::RadioButtonGroup),
            items: Vec::new(),
            selected: 0,
            last_fired: 0,
            selection_changed: EventHandler::empty(),
        }
    }
}

impl Boundary for RadioButtonGroup {}

impl RadioButtonGroup {
    pub fn item_count(&self) -> i32 {
        self.items.len() as i32
    }

    pub fn selected_index(&self) -> i32 {
        self.selected
    }

    fn check_index(&self, index: i32) -> Result<usize, Error> {
        if index < 0 || index >= self.item_count() {
            return Err(Error::invalid_argument(format!(
                "index {index} out of range for {} items",
                self.item_count()
            )));
        }
        Ok(index as usize)
    }

    /// Fires when the index differs from the last notified one.
    fn fire_guarded(&mut self) {
        if self.selected != self.last_fired {
            self.last_fired = self.selected;
            self.selection_changed.invoke();
        }
    }

    /// Fires unconditionally; used when the selected item itself was
    /// replaced even if the index value stayed the same.
    fn fire_forced(&mut self) {
        self.last_fired = self.selected;
        self.selection_changed.invoke();
    }

    pub fn set_selected_index(&mut self, index: i32) -> Result<(), Error> {
        self.check_index(index)?;
        self.selected = index;
        self.fire_guarded();
        Ok(())
    }

    pub fn add_item(&mut self, text: String) {
        self.items.push(text);
    }

    pub fn insert_item_at(&mut self, index: i32, text: String) -> Result<(), Error> {
        if index < 0 || index > self.item_count() {
            return Err(Error::invalid_argument(format!(
                "insert index {index} out of range for {} items",
                self.item_count()
            )));
        }
        self.items.insert(index as usize, text);
        // Insertion before the selection shifts the index silently; the
        // selected item itself did not change.
        if index <= self.selected {
            self.selected += 1;
            self.last_fired = self.selected;
        }
        Ok(())
    }

    pub fn remove_item_at(&mut self, index: i32) -> Result<(), Error> {
        let index = self.check_index(index)? as i32;
        self.items.remove(index as usize);
        if index < self.selected {
            self.selected -= 1;
            self.last_fired = self.selected;
        } else if index == self.selected {
            self.selected = self.selected.min(self.item_count() - 1).max(0);
            self.fire_forced();
        }
        Ok(())
    }

    pub fn clear_items(&mut self) {
        self.items.clear();
        let changed = self.selected != 0;
        self.selected = 0;
        if changed {
            self.fire_guarded();
        } else {
            self.last_fired = 0;
        }
    }

    fn move_selection(&mut self, delta: i32) {
        if self.items.is_empty() {
            return;
        }
        let next = (self.selected + delta).clamp(0, self.item_count() - 1);
        self.selected = next;
        self.fire_guarded();
    }
}

impl Widget for RadioButtonGroup {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn draw(&mut self, surface: &mut DrawSurface) {
        let focused = self.core.is_focused();
        for (row, item) in self.items.iter().enumerate() {
            let selected = row as i32 == self.selected;
            let (fg, bg) = if selected && focused {
                (palette::FOCUSED_FG, palette::FOCUSED_BG)
            } else {
                (palette::CONTROL_FG, palette::CONTROL_BG)
            };
            surface.fill_row(row as i32, fg, bg);
            let mark = if selected { '•' } else { ' ' };
            surface.draw_str(0, row as i32, &format!("({mark}) {item}"), fg, bg);
        }
    }

    fn handle_event(&mut self, event: &mut Event) {
        if !self.core.is_enabled() {
            return;
        }
        match event.what {
            ev::KEY_DOWN if self.core.is_focused() => match event.key_down.key_code {
                kb::UP => {
                    event.clear();
                    self.move_selection(-1);
                }
                kb::DOWN => {
                    event.clear();
                    self.move_selection(1);
                }
                _ => {}
            },
            ev::MOUSE_DOWN if self.core.bounds.contains(event.mouse.pos) => {
                let row = event.mouse.pos.y - self.core.bounds.a.y;
                if row >= 0 && row < self.item_count() {
                    event.clear();
                    self.selected = row;
                    self.fire_guarded();
                }
            }
            _ => {}
        }
    }
}

boundary_exports!(
    RadioButtonGroup,
    TfRadioButtonGroupNew,
    TfRadioButtonGroupDelete,
    TfRadioButtonGroupEquals,
    TfRadioButtonGroupHash
);

fn with_group<R>(
    this: *mut RadioButtonGroup,
    f: impl FnOnce(&mut RadioButtonGroup) -> Result<R, Error>,
) -> Result<R, Error> {
    if this.is_null() {
        return Err(Error::ArgumentNull);
    }
    f(unsafe { &mut *this })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupGetItemCount(
    this: *mut RadioButtonGroup,
    out: *mut i32,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_group(this, |group| {
            unsafe { *out = group.item_count() };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupGetItem(
    this: *mut RadioButtonGroup,
    index: i32,
    out: *mut *mut c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_group(this, |group| {
            let index = group.check_index(index)?;
            let exported = marshal::export_string(&group.items[index])?;
            unsafe { *out = exported };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupSetItem(
    this: *mut RadioButtonGroup,
    index: i32,
    value: *const c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        let text = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_group(this, |group| {
            let index = group.check_index(index)?;
            group.items[index] = text;
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupAddItem(
    this: *mut RadioButtonGroup,
    value: *const c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        let text = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_group(this, |group| {
            group.add_item(text);
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupInsertItemAt(
    this: *mut RadioButtonGroup,
    index: i32,
    value: *const c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        let text = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_group(this, |group| group.insert_item_at(index, text))
    })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupRemoveItemAt(
    this: *mut RadioButtonGroup,
    index: i32,
) -> ErrorCode {
    checked::ffi_guard(|| with_group(this, |group| group.remove_item_at(index)))
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupClearItems(this: *mut RadioButtonGroup) -> ErrorCode {
    checked::ffi_guard(|| {
        with_group(this, |group| {
            group.clear_items();
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupGetSelectedIndex(
    this: *mut RadioButtonGroup,
    out: *mut i32,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_group(this, |group| {
            unsafe { *out = group.selected_index() };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupSetSelectedIndex(
    this: *mut RadioButtonGroup,
    index: i32,
) -> ErrorCode {
    checked::ffi_guard(|| with_group(this, |group| group.set_selected_index(index)))
}

#[no_mangle]
pub extern "C" fn TfRadioButtonGroupSetSelectionChangedEventHandler(
    this: *mut RadioButtonGroup,
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
) -> ErrorCode {
    checked::ffi_guard(|| {
        with_group(this, |group| {
            group.selection_changed = match function {
                Some(f) => EventHandler::new(f, user_data),
                None => EventHandler::empty(),
            };
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::tests::count_calls;

    fn counting_group(count: &mut u32, items: &[&str]) -> RadioButtonGroup {
        let mut group = RadioButtonGroup::default();
        for item in items {
            group.add_item(item.to_string());
        }
        assert!(TfRadioButtonGroupSetSelectionChangedEventHandler(
            &mut group,
            Some(count_calls),
            count as *mut u32 as *mut c_void,
        )
        .is_success());
        group
    }

    #[test]
    fn default_selection_is_zero() {
        let group = RadioButtonGroup::default();
        assert_eq!(group.selected_index(), 0);
    }

    #[test]
    fn setting_the_same_index_does_not_refire() {
        let mut count = 0u32;
        let mut group = counting_group(&mut count, &["a", "b", "c"]);

        group.set_selected_index(0).unwrap();
        assert_eq!(count, 0);
        group.set_selected_index(2).unwrap();
        assert_eq!(count, 1);
        group.set_selected_index(2).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn insert_before_selection_shifts_silently() {
        let mut count = 0u32;
        let mut group = counting_group(&mut count, &["a", "b"]);
        group.set_selected_index(1).unwrap();
        assert_eq!(count, 1);

        group.insert_item_at(0, "z".to_string()).unwrap();
        assert_eq!(group.selected_index(), 2);
        assert_eq!(count, 1);
        // A later real change still fires through the guard.
        group.set_selected_index(0).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn removing_the_selected_item_fires_once() {
        let mut count = 0u32;
        let mut group = counting_group(&mut count, &["a", "b", "c"]);
        group.set_selected_index(1).unwrap();
        count = 0;

        // Resolved index stays 1 (now "c") but the item changed.
        group.remove_item_at(1).unwrap();
        assert_eq!(group.selected_index(), 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn removing_after_selection_does_not_fire() {
        let mut count = 0u32;
        let mut group = counting_group(&mut count, &["a", "b", "c"]);
        group.remove_item_at(2).unwrap();
        assert_eq!(group.selected_index(), 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn out_of_range_indexes_are_invalid_arguments() {
        let mut group = RadioButtonGroup::default();
        group.add_item("only".to_string());
        assert_eq!(
            TfRadioButtonGroupSetSelectedIndex(&mut group, 5) ,
            ErrorCode::INVALID_ARGUMENT
        );
        assert_eq!(
            TfRadioButtonGroupRemoveItemAt(&mut group, -1),
            ErrorCode::INVALID_ARGUMENT
        );
        // The failing call left state untouched.
        assert_eq!(group.item_count(), 1);
        assert_eq!(group.selected_index(), 0);
    }

    #[test]
    fn arrow_keys_move_the_selection() {
        use crate::events::KeyDownEvent;
        use crate::view::StateFlags;

        let mut count = 0u32;
        let mut group = counting_group(&mut count, &["a", "b"]);
        group.core_mut().state.insert(StateFlags::FOCUSED);

        let mut down = Event::key(KeyDownEvent::from_key(kb::DOWN, 0));
        group.handle_event(&mut down);
        assert_eq!(group.selected_index(), 1);
        assert_eq!(count, 1);

        // Already at the bottom; clamped, no fire.
        let mut down = Event::key(KeyDownEvent::from_key(kb::DOWN, 0));
        group.handle_event(&mut down);
        assert_eq!(group.selected_index(), 1);
        assert_eq!(count, 1);
    }
}
