//! Top-level window: title bar, frame, and the child control collection.

use std::os::raw::{c_char, c_void};
use std::ptr;

use bitflags::bitflags;

use crate::checked::{self, boundary_exports, Bool, Boundary, FALSE, TRUE};
use crate::error::{Error, ErrorCode};
use crate::events::{cm, ev, Event};
use crate::geometry::Point;
use crate::handler::{EventHandler, EventHandlerFn};
use crate::marshal;
use crate::screen::{palette, Buffer, DrawSurface, FrameStyle};
use crate::terminal::kb;
use crate::view::{self, StateFlags, ViewCore, ViewKind, Widget};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WindowFlags: u16 {
        const CONTROL_BOX  = 0x0001;
        const MAXIMIZE_BOX = 0x0002;
        const RESIZABLE    = 0x0004;
    }
}

/// A form does not own its controls; the host constructs and destroys
/// them through their own exports. The collection holds raw borrows the
/// host must keep alive while attached.
#[repr(C)]
pub struct Form {
    core: ViewCore,
    title: String,
    flags: WindowFlags,
    children: Vec<*mut ViewCore>,
    focused: i32,
    closed: EventHandler,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            core: ViewCore::new(ViewKind::Form),
            title: String::new(),
            flags: WindowFlags::CONTROL_BOX,
            children: Vec::new(),
            focused: -1,
            closed: EventHandler::empty(),
        }
    }
}

impl Boundary for Form {}

impl Form {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn child_count(&self) -> i32 {
        self.children.len() as i32
    }

    fn check_index(&self, index: i32) -> Result<usize, Error> {
        if index < 0 || index >= self.child_count() {
            return Err(Error::invalid_argument(format!(
                "index {index} out of range for {} controls",
                self.child_count()
            )));
        }
        Ok(index as usize)
    }

    /// Client-area origin in screen coordinates (inside the frame).
    fn client_origin(&self) -> Point {
        Point::new(self.core.bounds.a.x + 1, self.core.bounds.a.y + 1)
    }

    pub fn insert_child(&mut self, child: *mut ViewCore) {
        self.insert_child_at(self.child_count(), child)
            .expect("append index is always valid");
    }

    pub fn insert_child_at(&mut self, index: i32, child: *mut ViewCore) -> Result<(), Error> {
        if child.is_null() {
            return Err(Error::ArgumentNull);
        }
        if index < 0 || index > self.child_count() {
            return Err(Error::invalid_argument(format!(
                "insert index {index} out of range for {} controls",
                self.child_count()
            )));
        }
        unsafe { (*child).owner = &mut self.core };
        self.children.insert(index as usize, child);
        if index <= self.focused {
            self.focused += 1;
        }
        // The first focusable control takes the focus.
        if self.focused == -1 && unsafe { (*child).focusable() } {
            self.focus_index(index);
        }
        Ok(())
    }

    pub fn remove_child_at(&mut self, index: i32) -> Result<(), Error> {
        let index = self.check_index(index)? as i32;
        let child = self.children.remove(index as usize);
        unsafe {
            (*child).owner = ptr::null_mut();
            (*child).state.remove(StateFlags::FOCUSED);
        }
        if index < self.focused {
            self.focused -= 1;
        } else if index == self.focused {
            self.focused = -1;
            self.focus_step(1);
        }
        Ok(())
    }

    fn focus_index(&mut self, index: i32) {
        if index == self.focused {
            return;
        }
        if let Ok(old) = self.check_index(self.focused) {
            unsafe { (*self.children[old]).state.remove(StateFlags::FOCUSED) };
        }
        self.focused = index;
        if let Ok(new) = self.check_index(index) {
            unsafe { (*self.children[new]).state.insert(StateFlags::FOCUSED) };
        }
    }

    pub(crate) fn focus_child(&mut self, child: *mut ViewCore) {
        if let Some(index) = self.children.iter().position(|&c| ptr::eq(c, child)) {
            self.focus_index(index as i32);
        }
    }

    /// Moves focus to the next focusable control in insertion order,
    /// wrapping around. `direction` is +1 or -1.
    fn focus_step(&mut self, direction: i32) {
        let count = self.child_count();
        if count == 0 {
            return;
        }
        let start = if self.focused == -1 { 0 } else { self.focused };
        for step in 1..=count {
            let index = (start + direction * step).rem_euclid(count);
            if unsafe { (*self.children[index as usize]).focusable() } {
                self.focus_index(index);
                return;
            }
        }
    }

    /// Detaches from the desktop and fires the closed notification. The
    /// handler is taken before the call, so a close from inside the
    /// handler cannot fire it again.
    pub fn close(&mut self) {
        self.core.state.remove(StateFlags::VISIBLE);
        crate::context::remove_form(&mut self.core);
        self.closed.take().invoke();
    }

    pub fn show(&mut self) {
        self.core.state.insert(StateFlags::VISIBLE);
        crate::context::insert_form(&mut self.core);
    }

    pub(crate) fn draw_children(&mut self, buffer: &mut Buffer) {
        let origin = self.client_origin();
        for &child in &self.children {
            unsafe {
                if !(*child).is_visible() {
                    continue;
                }
                let mut bounds = (*child).bounds;
                bounds.move_by(origin.x, origin.y);
                let mut surface = DrawSurface::new(buffer, bounds);
                view::as_widget(child).draw(&mut surface);
            }
        }
    }

    fn route_to_focused(&mut self, event: &mut Event) {
        if let Ok(index) = self.check_index(self.focused) {
            unsafe { view::as_widget(self.children[index]).handle_event(event) };
        }
    }

    fn route_mouse(&mut self, event: &mut Event) {
        let origin = self.client_origin();
        let local = Point::new(event.mouse.pos.x - origin.x, event.mouse.pos.y - origin.y);
        // Topmost child first.
        for index in (0..self.children.len()).rev() {
            let child = self.children[index];
            let core = unsafe { &*child };
            if !core.is_visible() || !core.bounds.contains(local) {
                continue;
            }
            if core.focusable() {
                self.focus_index(index as i32);
            }
            let screen_pos = event.mouse.pos;
            event.mouse.pos = local;
            unsafe { view::as_widget(child).handle_event(event) };
            event.mouse.pos = screen_pos;
            return;
        }
    }
}

impl Widget for Form {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn draw(&mut self, surface: &mut DrawSurface) {
        // The active form gets the double frame, background forms a single one.
        let style = if self.core.is_focused() {
            FrameStyle::Double
        } else {
            FrameStyle::Single
        };
        surface.draw_frame(style, &self.title, palette::FRAME_FG, palette::FRAME_BG);
    }

    fn handle_event(&mut self, event: &mut Event) {
        match event.what {
            ev::KEY_DOWN => {
                match event.key_down.key_code {
                    kb::TAB => {
                        event.clear();
                        self.focus_step(1);
                        return;
                    }
                    kb::SHIFT_TAB => {
                        event.clear();
                        self.focus_step(-1);
                        return;
                    }
                    kb::ESC if self.flags.contains(WindowFlags::CONTROL_BOX) => {
                        event.clear();
                        self.close();
                        return;
                    }
                    _ => {}
                }
                self.route_to_focused(event);
            }
            what if what & ev::MOUSE != 0 => self.route_mouse(event),
            ev::COMMAND if event.message.command == cm::CLOSE => {
                event.clear();
                self.close();
            }
            _ => {}
        }
    }
}

boundary_exports!(Form, TfFormNew, TfFormDelete, TfFormEquals, TfFormHash);

fn with_form<R>(
    this: *mut Form,
    f: impl FnOnce(&mut Form) -> Result<R, Error>,
) -> Result<R, Error> {
    if this.is_null() {
        return Err(Error::ArgumentNull);
    }
    f(unsafe { &mut *this })
}

#[no_mangle]
pub extern "C" fn TfFormGetTitle(this: *mut Form, out: *mut *mut c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_form(this, |form| {
            let exported = marshal::export_string(form.title())?;
            unsafe { *out = exported };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfFormSetTitle(this: *mut Form, value: *const c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        let title = unsafe { marshal::borrow_str(value) }?.to_owned();
        with_form(this, |form| {
            form.title = title;
            Ok(())
        })
    })
}

macro_rules! window_flag_exports {
    ($flag:expr, $get:ident, $set:ident) => {
        #[no_mangle]
        pub extern "C" fn $get(this: *mut Form, out: *mut Bool) -> ErrorCode {
            checked::ffi_guard(|| {
                if out.is_null() {
                    return Err(Error::ArgumentNull);
                }
                with_form(this, |form| {
                    unsafe { *out = if form.flags.contains($flag) { TRUE } else { FALSE } };
                    Ok(())
                })
            })
        }

        #[no_mangle]
        pub extern "C" fn $set(this: *mut Form, value: Bool) -> ErrorCode {
            checked::ffi_guard(|| {
                with_form(this, |form| {
                    form.flags.set($flag, value != FALSE);
                    Ok(())
                })
            })
        }
    };
}

window_flag_exports!(WindowFlags::CONTROL_BOX, TfFormGetControlBox, TfFormSetControlBox);
window_flag_exports!(WindowFlags::MAXIMIZE_BOX, TfFormGetMaximizeBox, TfFormSetMaximizeBox);
window_flag_exports!(WindowFlags::RESIZABLE, TfFormGetResizable, TfFormSetResizable);

#[no_mangle]
pub extern "C" fn TfFormShow(this: *mut Form) -> ErrorCode {
    checked::ffi_guard(|| {
        with_form(this, |form| {
            form.show();
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfFormClose(this: *mut Form) -> ErrorCode {
    checked::ffi_guard(|| {
        with_form(this, |form| {
            form.close();
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfFormSetClosedEventHandler(
    this: *mut Form,
    function: Option<EventHandlerFn>,
    user_data: *mut c_void,
) -> ErrorCode {
    checked::ffi_guard(|| {
        with_form(this, |form| {
            form.closed = match function {
                Some(f) => EventHandler::new(f, user_data),
                None => EventHandler::empty(),
            };
            Ok(())
        })
    })
}

// ============================================================================
// Control collection exports
// ============================================================================

#[no_mangle]
pub extern "C" fn TfControlCollectionInsert(this: *mut Form, control: *mut ViewCore) -> ErrorCode {
    checked::ffi_guard(|| {
        if control.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_form(this, |form| {
            form.insert_child(control);
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfControlCollectionInsertAt(
    this: *mut Form,
    index: i32,
    control: *mut ViewCore,
) -> ErrorCode {
    checked::ffi_guard(|| with_form(this, |form| form.insert_child_at(index, control)))
}

#[no_mangle]
pub extern "C" fn TfControlCollectionRemoveAt(this: *mut Form, index: i32) -> ErrorCode {
    checked::ffi_guard(|| with_form(this, |form| form.remove_child_at(index)))
}

#[no_mangle]
pub extern "C" fn TfControlCollectionCount(this: *mut Form, out: *mut i32) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_form(this, |form| {
            unsafe { *out = form.child_count() };
            Ok(())
        })
    })
}

#[no_mangle]
pub extern "C" fn TfControlCollectionAt(
    this: *mut Form,
    index: i32,
    out: *mut *mut ViewCore,
) -> ErrorCode {
    checked::ffi_guard(|| {
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        with_form(this, |form| {
            let index = form.check_index(index)?;
            unsafe { *out = form.children[index] };
            Ok(())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::Button;
    use crate::events::KeyDownEvent;
    use crate::geometry::Rect;
    use crate::handler::tests::count_calls;
    use crate::label::Label;
    use crate::textbox::TextBox;

    #[test]
    fn first_focusable_child_takes_focus() {
        let mut form = Form::default();
        let mut label = Label::default();
        let mut button = Button::default();

        form.insert_child(label.core_mut());
        assert_eq!(form.focused, -1);
        form.insert_child(button.core_mut());
        assert_eq!(form.focused, 1);
        assert!(button.core().is_focused());

        // Detach before the widgets drop.
        form.remove_child_at(1).unwrap();
        form.remove_child_at(0).unwrap();
    }

    #[test]
    fn tab_cycles_over_focusable_children_only() {
        let mut form = Form::default();
        let mut button = Button::default();
        let mut label = Label::default();
        let mut textbox = TextBox::default();

        form.insert_child(button.core_mut());
        form.insert_child(label.core_mut());
        form.insert_child(textbox.core_mut());
        assert!(button.core().is_focused());

        let mut tab = Event::key(KeyDownEvent::from_key(kb::TAB, 0));
        form.handle_event(&mut tab);
        assert!(!button.core().is_focused());
        assert!(textbox.core().is_focused());

        // Wraps around, skipping the label.
        let mut tab = Event::key(KeyDownEvent::from_key(kb::TAB, 0));
        form.handle_event(&mut tab);
        assert!(button.core().is_focused());

        let mut back = Event::key(KeyDownEvent::from_key(kb::SHIFT_TAB, kb::SHIFT));
        form.handle_event(&mut back);
        assert!(textbox.core().is_focused());

        while form.child_count() > 0 {
            form.remove_child_at(0).unwrap();
        }
    }

    #[test]
    fn removing_the_focused_child_moves_focus_on() {
        let mut form = Form::default();
        let mut first = Button::default();
        let mut second = Button::default();
        form.insert_child(first.core_mut());
        form.insert_child(second.core_mut());
        assert!(first.core().is_focused());

        form.remove_child_at(0).unwrap();
        assert!(!first.core().is_focused());
        assert!(second.core().is_focused());
        assert!(first.core().owner.is_null());

        form.remove_child_at(0).unwrap();
    }

    #[test]
    fn close_fires_exactly_once() {
        let mut count = 0u32;
        let mut form = Form::default();
        assert!(TfFormSetClosedEventHandler(
            &mut form,
            Some(count_calls),
            &mut count as *mut u32 as *mut c_void,
        )
        .is_success());

        form.close();
        assert_eq!(count, 1);
        form.close();
        assert_eq!(count, 1);
    }

    #[test]
    fn escape_closes_only_with_a_control_box() {
        let mut count = 0u32;
        let mut form = Form::default();
        assert!(TfFormSetClosedEventHandler(
            &mut form,
            Some(count_calls),
            &mut count as *mut u32 as *mut c_void,
        )
        .is_success());
        form.flags.remove(WindowFlags::CONTROL_BOX);

        let mut esc = Event::key(KeyDownEvent::from_key(kb::ESC, 0));
        form.handle_event(&mut esc);
        assert_eq!(count, 0);

        form.flags.insert(WindowFlags::CONTROL_BOX);
        let mut esc = Event::key(KeyDownEvent::from_key(kb::ESC, 0));
        form.handle_event(&mut esc);
        assert_eq!(count, 1);
    }

    #[test]
    fn close_command_closes_the_form() {
        let mut count = 0u32;
        let mut form = Form::default();
        assert!(TfFormSetClosedEventHandler(
            &mut form,
            Some(count_calls),
            &mut count as *mut u32 as *mut c_void,
        )
        .is_success());

        let mut event = Event::command(cm::CLOSE);
        form.handle_event(&mut event);
        assert_eq!(count, 1);
        assert!(event.is_nothing());
    }

    #[test]
    fn mouse_events_are_routed_in_client_coordinates() {
        let mut form = Form::default();
        form.core_mut().bounds = Rect::new(5, 3, 45, 15);
        let mut button = Button::default();
        button.core_mut().bounds = Rect::new(2, 1, 12, 2);
        let mut count = 0u32;
        assert!(crate::button::TfButtonSetClickEventHandler(
            &mut button,
            Some(count_calls),
            &mut count as *mut u32 as *mut c_void,
        )
        .is_success());
        form.insert_child(button.core_mut());

        // Screen (10, 5) → client (4, 1), inside the button.
        let mut click = Event::mouse(
            ev::MOUSE_DOWN,
            crate::events::MouseEventType {
                pos: Point::new(10, 5),
                ..Default::default()
            },
        );
        form.handle_event(&mut click);
        assert_eq!(count, 1);
        // The event position is restored after routing.
        assert_eq!(click.mouse.pos, Point::new(10, 5));

        form.remove_child_at(0).unwrap();
    }

    #[test]
    fn key_events_reach_the_focused_child() {
        let mut form = Form::default();
        let mut textbox = TextBox::default();
        form.insert_child(textbox.core_mut());
        assert!(textbox.core().is_focused());

        let mut event = Event::key(KeyDownEvent::from_char('x', 0));
        form.handle_event(&mut event);
        assert_eq!(textbox.text(), "x");

        form.remove_child_at(0).unwrap();
    }

    #[test]
    fn title_round_trips_through_owned_string() {
        let mut form = Form::default();
        let title = std::ffi::CString::new("Settings").unwrap();
        assert!(TfFormSetTitle(&mut form, title.as_ptr()).is_success());

        let mut out: *mut c_char = std::ptr::null_mut();
        assert!(TfFormGetTitle(&mut form, &mut out).is_success());
        let round = unsafe { std::ffi::CStr::from_ptr(out) };
        assert_eq!(round.to_str().unwrap(), "Settings");
        unsafe { libc::free(out as *mut c_void) };
    }

    #[test]
    fn frame_style_follows_form_focus() {
        let mut form = Form::default();
        form.core_mut().bounds = Rect::new(0, 0, 8, 3);
        let mut buffer = Buffer::new(8, 3);

        let mut surface = DrawSurface::new(&mut buffer, form.core().bounds);
        form.draw(&mut surface);
        assert_eq!(buffer.get(0, 0).unwrap().ch, '┌');

        form.core_mut().state.insert(StateFlags::FOCUSED);
        let mut surface = DrawSurface::new(&mut buffer, form.core().bounds);
        form.draw(&mut surface);
        assert_eq!(buffer.get(0, 0).unwrap().ch, '╔');
    }

    #[test]
    fn collection_exports_round_trip() {
        let mut form = Form::default();
        let mut button = Button::default();

        assert!(TfControlCollectionInsert(&mut form, button.core_mut()).is_success());
        let mut n = 0;
        assert!(TfControlCollectionCount(&mut form, &mut n).is_success());
        assert_eq!(n, 1);

        let mut child: *mut ViewCore = std::ptr::null_mut();
        assert!(TfControlCollectionAt(&mut form, 0, &mut child).is_success());
        assert!(std::ptr::eq(child, button.core_mut()));
        assert_eq!(
            TfControlCollectionAt(&mut form, 1, &mut child),
            ErrorCode::INVALID_ARGUMENT
        );

        assert!(TfControlCollectionRemoveAt(&mut form, 0).is_success());
    }
}
