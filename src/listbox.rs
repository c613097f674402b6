//! Scrollable list of selectable items.

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
pub struct ListBox {
    core: ViewCore,
    items: Vec<String>,
    /// -1 while the list is empty.
    selected: i32,
    last_fired: i32,
    top_index: i32,
    selection_changed: EventHandler,
    item_activated: EventHandler,
}

impl Default for ListBox {
    fn default() -> Self {
        Self {
            core: ViewCore::new(ViewKind::ListBox),
            items: Vec::new(),
            selected: -1,
            last_fired: -1,
            top_index: 0,
            selection_changed: EventHandler::empty(),
            item_activated: EventHandler::empty(),
        }
    }
}

impl Boundary for ListBox {}

impl ListBox {
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

    fn fire_guarded(&mut self) {
        if self.selected != self.last_fired {
            self.last_fired = self.selected;
            self.selection_changed.invoke();
        }
    }

    fn fire_forced(&mut self) {
        self.last_fired = self.selected;
        self.selection_changed.invoke();
    }

    /// -1 deselects; anything else must be a valid index.
    pub fn set_selected_index(&mut self, index: i32) -> Result<(), Error> {
        if index != -1 {
            self.check_index(index)?;
        }
        self.selected = index;
        self.fire_guarded();
        Ok(())
    }

    pub fn add_item(&mut self, text: String) {
        self.items.push(text);
        if self.selected == -1 {
            // The first item becomes the selection.
            self.selected = 0;
            self.fire_guarded();
        }
    }

    pub fn insert_item_at(&mut self, index: i32, text: String) -> Result<(), Error> {
        if index < 0 || index > self.item_count() {
            return Err(Error::invalid_argument(format!(
                "insert index {index} out of range for {} items",
                self.item_count()
            )));
        }
        let was_empty = self.items.is_empty();
        self.items.insert(index as usize, text);
        if was_empty {
            self.selected = 0;
            self.fire_guarded();
        } else if index <= self.selected {
            // Same item, shifted index. No notification.
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
            self.selected = if self.items.is_empty() {
                -1
            } else {
                self.selected.min(self.item_count() - 1)
            };
            self.fire_forced();
        }
        Ok(())
    }

    pub fn clear_items(&mut self) {
        self.items.clear();
        self.top_index = 0;
        if self.selected != -1 {
            self.selected = -1;
            self.fire_forced();
        }
    }

    pub fn activate(&mut self) {
        if self.selected != -1 {
            self.item_activated.invoke();
        }
    }

    fn move_selection(&mut self, delta: i32) {
        if self.items.is_empty() {
            return;
        }
        let next = (self.selected.max(0) + delta).clamp(0, self.item_count() - 1);
        self.selected = next;
        self.fire_guarded();
    }

    fn scroll_into_view(&mut self, visible_rows: i32) {
        if visible_rows < 1 || self.selected < 0 {
            return;
        }
        if self.selected < self.top_index {
            self.top_index = self.selected;
        } else if self.selected >= self.top_index + visible_rows {
            self.top_index = self.selected - visible_rows + 1;
        }
    }
}

impl Widget for ListBox {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn draw(&mut self, surface: &mut DrawSurface) {
        let focused = self.core.is_focused();
        self.scroll_into_view(surface.height());
        for row in 0..surface.height() {
            let index = self.top_index + row;
            if index >= self.item_count() {
                surface.fill_row(row, palette::CONTROL_FG, palette::CONTROL_BG);
                continue;
            }
            let selected = index == self.selected;
            let (fg, bg) = if selected && focused {
                (palette::FOCUSED_FG, palette::FOCUSED_BG)
            } else if selected {
                (palette::SELECTED_FG, palette::SELECTED_BG)
            } else {
                (palette::CONTROL_FG, palette::CONTROL_BG)
            };
            surface.fill_row(row, fg, bg);
            surface.draw_str(0, row, &self.items[index as usize], fg, bg);
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
                kb::HOME => {
                    event.clear();
                    self.move_selection(-self.item_count());
                }
                kb::END => {
                    event.clear();
                    self.move_selection(self.item_count());
                }
                kb::ENTER => {
                    event.clear();
                    self.activate();
                }
                _ => {}
            },
            ev::MOUSE_DOWN if self.core.bounds.contains(event.mouse.pos) => {
                let row = event.mouse.pos.y - self.core.bounds.a.y;
                let index = self.top_index + row;
                if index >= 0 && index < self.item_count() {
                    event.clear();
                    let already_selected = index == self.selected;
                    self.selected = index;
                    self.fire_guarded();
                    // A click on the current selection activates it.
                    if already_selected {
                        self.activate();
                    }
                }
            }
            _ => {}
        }
    }
}

boundary_exports!(ListBox, TfListBoxNew, TfListBoxDelete, TfListBoxEquals, TfListBoxHash);

fn with_listbox<R>(
    this: *mut ListBox,
    f: impl FnOnce(&mut ListBox) -> Result<R, Error>,
) -> Result<R, Error> {
    if this.is_null() {
        return Err(Error::ArgumentNull);
    }
    f(unsafe { &mut *this })
}

#[no_mangle]
pub extern "C" fn TfListBoxGetItemCount(this: *mut ListBox, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_listbox(this, |listbox| {
            unsafe { *out = listbox.item_count() };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxGetItem(
    this: *mut ListBox,
    index: i32,
    out: *mut *mut c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_listbox(this, |listbox| {
            let index = listbox.check_index(index)?;
            let exported = marshal::export_string(&listbox.items[index])?;
            unsafe { *out = exported };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxSetItem(
    this: *mut ListBox,
    index: i32,
    value: *const c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        let text = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_listbox(this, |listbox| {
            let index = listbox.check_index(index)?;
            listbox.items[index] = text;
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxAddItem(this: *mut ListBox, value: *const c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        let text = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_listbox(this, |listbox| {
            listbox.add_item(text);
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxInsertItemAt(
    this: *mut ListBox,
    index: i32,
    value: *const c_char,
) -> ErrorCode {
    checked::ffi_guard(|| {
        let text = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_listbox(this, |listbox| listbox.insert_item_at(index, text))
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxRemoveItemAt(this: *mut ListBox, index: i32) -> ErrorCode {
    checked::ffi_guard(|| with_listbox(this, |listbox| listbox.remove_item_at(index)))
}

#[no_mangle]
pub extern "C" fn TfListBoxClearItems(this: *mut ListBox) -> ErrorCode {
    checked::ffi_guard(|| {
        with_listbox(this, |listbox| {
            listbox.clear_items();
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxGetSelectedIndex(this: *mut ListBox, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_listbox(this, |listbox| {
            unsafe { *out = listbox.selected_index() };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxSetSelectedIndex(this: *mut ListBox, index: i32) -> ErrorCode {
    checked::ffi_guard(|| with_listbox(this, |listbox| listbox.set_selected_index(index)))
}

#[no_mangle]
pub extern "C" fn TfListBoxSetSelectionChangedEventHandler(
    this: *mut ListBox,
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
) -> ErrorCode {
    checked::ffi_guard(|| {
        with_listbox(this, |listbox| {
            listbox.selection_changed = match function {
                Some(f) => EventHandler::new(f, user_data),
                None => EventHandler::empty(),
            };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfListBoxSetItemActivatedEventHandler(
    this: *mut ListBox,
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
) -> ErrorCode {
    checked::ffi_guard(|| {
        with_listbox(this, |listbox| {
            listbox.item_activated = match function {
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

    fn counting_listbox(count: &mut u32) -> ListBox {
        let mut listbox = ListBox::default();
        assert!(TfListBoxSetSelectionChangedEventHandler(
            &mut listbox,
            Some(count_calls),
            count as *mut u32 as *mut c_void,
        )
        .is_success());
        listbox
    }

    #[test]
    fn empty_listbox_has_no_selection() {
        let mut listbox = ListBox::default();
        let mut index = 0;
        assert!(TfListBoxGetSelectedIndex(&mut listbox, &mut index).is_success());
        assert_eq!(index, -1);
    }

    #[test]
    fn selection_scenario_from_empty_list() {
        let mut count = 0u32;
        let mut listbox = counting_listbox(&mut count);

        // Add "A": first item auto-selects and fires once.
        listbox.add_item("A".to_string());
        assert_eq!(listbox.selected_index(), 0);
        assert_eq!(count, 1);

        // Insert "B" at 0: selection shifts to 1 without firing.
        listbox.insert_item_at(0, "B".to_string()).unwrap();
        assert_eq!(listbox.selected_index(), 1);
        assert_eq!(count, 1);

        // Remove the selected item at 1 with one item left: fires once,
        // landing on 0.
        listbox.remove_item_at(1).unwrap();
        assert_eq!(listbox.selected_index(), 0);
        assert_eq!(count, 2);
    }

    #[test]
    fn setting_the_current_index_does_not_refire() {
        let mut count = 0u32;
        let mut listbox = counting_listbox(&mut count);
        listbox.add_item("A".to_string());
        listbox.add_item("B".to_string());
        count = 0;

        listbox.set_selected_index(0).unwrap();
        assert_eq!(count, 0);
        listbox.set_selected_index(1).unwrap();
        assert_eq!(count, 1);
        listbox.set_selected_index(1).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn removing_the_last_item_deselects_and_fires() {
        let mut count = 0u32;
        let mut listbox = counting_listbox(&mut count);
        listbox.add_item("A".to_string());
        count = 0;

        listbox.remove_item_at(0).unwrap();
        assert_eq!(listbox.selected_index(), -1);
        assert_eq!(count, 1);
    }

    #[test]
    fn clear_fires_once_when_a_selection_existed() {
        let mut count = 0u32;
        let mut listbox = counting_listbox(&mut count);
        listbox.add_item("A".to_string());
        listbox.add_item("B".to_string());
        count = 0;

        listbox.clear_items();
        assert_eq!(listbox.selected_index(), -1);
        assert_eq!(count, 1);

        // Clearing an already empty list is silent.
        listbox.clear_items();
        assert_eq!(count, 1);
    }

    #[test]
    fn activation_requires_a_selection() {
        let mut activations = 0u32;
        let mut listbox = ListBox::default();
        assert!(TfListBoxSetItemActivatedEventHandler(
            &mut listbox,
            Some(count_calls),
            &mut activations as *mut u32 as *mut c_void,
        )
        .is_success());

        listbox.activate();
        assert_eq!(activations, 0);

        listbox.add_item("A".to_string());
        listbox.activate();
        assert_eq!(activations, 1);
    }

    #[test]
    fn enter_activates_the_focused_listbox() {
        use crate::events::KeyDownEvent;
        use crate::view::StateFlags;

        let mut activations = 0u32;
        let mut listbox = ListBox::default();
        assert!(TfListBoxSetItemActivatedEventHandler(
            &mut listbox,
            Some(count_calls),
            &mut activations as *mut u32 as *mut c_void,
        )
        .is_success());
        listbox.add_item("A".to_string());
        listbox.core_mut().state.insert(StateFlags::FOCUSED);

        let mut event = Event::key(KeyDownEvent::from_key(crate::terminal::kb::ENTER, 0));
        listbox.handle_event(&mut event);
        assert_eq!(activations, 1);
        assert!(event.is_nothing());
    }

    #[test]
    fn out_of_range_selection_is_rejected_without_side_effects() {
        let mut count = 0u32;
        let mut listbox = counting_listbox(&mut count);
        listbox.add_item("A".to_string());
        count = 0;

        assert_eq!(
            TfListBoxSetSelectedIndex(&mut listbox, 3),
            ErrorCode::INVALID_ARGUMENT
        );
        assert_eq!(listbox.selected_index(), 0);
        assert_eq!(count, 0);
    }

    #[test]
    fn item_round_trips_as_owned_string() {
        let mut listbox = ListBox::default();
        let item = std::ffi::CString::new("first").unwrap();
        assert!(TfListBoxAddItem(&mut listbox, item.as_ptr()).is_success());

        let mut out: *mut c_char = std::ptr::null_mut();
        assert!(TfListBoxGetItem(&mut listbox, 0, &mut out).is_success());
        let round = unsafe { std::ffi::CStr::from_ptr(out) };
        assert_eq!(round.to_str().unwrap(), "first");
        unsafe { libc::free(out as *mut c_void) };
    }

    #[test]
    fn long_lists_keep_the_selection_visible() {
        let mut listbox = ListBox::default();
        for i in 0..20 {
            listbox.add_item(format!("item {i}"));
        }
        listbox.set_selected_index(15).unwrap();
        listbox.scroll_into_view(5);
        assert_eq!(listbox.top_index, 11);

        listbox.set_selected_index(2).unwrap();
        listbox.scroll_into_view(5);
        assert_eq!(listbox.top_index, 2);
    }
}
