//! Application run loop, overridable virtual surface, and debug hooks.
//!
//! The run loop is static: it polls the backend, dispatches events to
//! the topmost form, and repaints into the back buffer. The
//! `Application` handle exists for the host's overridable virtual
//! surface; each virtual method consults the override table and falls
//! back to native behavior, with a `_Base` export that always runs the
//! native path.

use std::collections::VecDeque;
use std::os::raw::{c_char, c_void};
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use std::sync::Mutex;

use crate::checked::{self, Bool, Boundary, FALSE, TRUE};
use crate::context;
use crate::error::{Error, ErrorCode};
use crate::events::{cm, ev, Event, KeyDownEvent, MouseEventType};
use crate::form::Form;
use crate::geometry::Rect;
use crate::marshal;
use crate::screen::{diff_buffers, palette, Cell, DrawSurface};
use crate::terminal::{CrosstermBackend, HeadlessBackend, TerminalBackend};
use crate::view::{self, StateFlags};
use crate::vtable::{self, VirtualMethod};

const POLL_TIMEOUT_MS: u32 = 50;

/// Headless runs have no input source once scripted events are
/// exhausted, so the loop exits after this many consecutive empty polls.
const HEADLESS_IDLE_LIMIT: u32 = 3;

/// With the screenshot enabled the loop stops on its own after a few
/// extra idle passes, so scripted sessions terminate.
const SCREENSHOT_EXTRA_IDLES: u32 = 5;

// ============================================================================
// Application handle
// ============================================================================

/// Host-visible application handle. The run loop itself is static; the
/// handle gives the host a stable instance pointer to drive the
/// overridable virtual methods against.
#[repr(C)]
#[derive(Default)]
pub struct Application {
    suspended: Bool,
}

impl Boundary for Application {}

type VoidMethodFn = unsafe extern "C" fn(this: *mut c_void);
type GetTileRectFn = unsafe extern "C" fn(this: *mut c_void) -> *const Rect;
type HandleEventFn = unsafe extern "C" fn(this: *mut c_void, event: *mut Event);

fn override_slot(method: VirtualMethod) -> Option<*mut c_void> {
    let ptr = vtable::get_override(method);
    if ptr.is_null() {
        None
    } else {
        Some(ptr)
    }
}

fn app_mut<'a>(this: *mut Application) -> Result<&'a mut Application, Error> {
    if this.is_null() {
        return Err(Error::ArgumentNull);
    }
    Ok(unsafe { &mut *this })
}

// ============================================================================
// Native virtual behavior
// ============================================================================

fn suspend_native(app: &mut Application) -> Result<(), Error> {
    if app.suspended == TRUE {
        return Ok(());
    }
    // Outside a run there is no terminal state to hand back.
    if let Ok(mut ctx) = context::context_write() {
        ctx.backend.shutdown()?;
    }
    app.suspended = TRUE;
    Ok(())
}

fn resume_native(app: &mut Application) -> Result<(), Error> {
    if app.suspended == FALSE {
        return Ok(());
    }
    if let Ok(mut ctx) = context::context_write() {
        ctx.backend.init()?;
    }
    app.suspended = FALSE;
    Ok(())
}

fn tile_rect_native() -> Rect {
    match context::context_write() {
        Ok(ctx) => {
            let (w, h) = ctx.backend.size();
            Rect::new(0, 0, w as i32, h as i32)
        }
        Err(_) => Rect::new(0, 0, 80, 24),
    }
}

/// Native event routing: quit commands stop the loop, everything else
/// goes to the topmost form.
fn dispatch_event(event: &mut Event) {
    if event.what == ev::COMMAND && event.message.command == cm::QUIT {
        context::request_quit();
        event.clear();
        return;
    }
    if let Some(form) = context::active_form() {
        unsafe { view::as_widget(form).handle_event(event) };
    }
}

// ============================================================================
// Virtual trampolines
// ============================================================================

#[no_mangle]
pub extern "C" fn TfApplicationNew(out: *mut *mut Application) -> ErrorCode {
    checked::checked_new(out)
}

/// Deleting the handle consults the destructor slot first so a managed
/// subclass can release its own state.
#[no_mangle]
pub extern "C" fn TfApplicationDelete(this: *mut Application) -> ErrorCode {
    if !this.is_null() {
        if let Some(slot) = override_slot(VirtualMethod::ApplicationDestructor) {
            let f: VoidMethodFn = unsafe { std::mem::transmute(slot) };
            unsafe { f(this as *mut c_void) };
        }
    }
    checked::checked_delete(this)
}

#[no_mangle]
pub extern "C" fn TfApplicationEquals(
    this: *const Application,
    other: *const Application,
    out: *mut Bool,
) -> ErrorCode {
    checked::checked_equals(this, other, out)
}

#[no_mangle]
pub extern "C" fn TfApplicationHash(this: *const Application, out: *mut i32) -> ErrorCode {
    checked::checked_hash(this, out)
}

#[no_mangle]
pub extern "C" fn TfApplicationSuspend(this: *mut Application) -> ErrorCode {
    checked::ffi_guard(|| {
        let app = app_mut(this)?;
        match override_slot(VirtualMethod::ApplicationSuspend) {
            Some(slot) => {
                let f: VoidMethodFn = unsafe { std::mem::transmute(slot) };
                unsafe { f(this as *mut c_void) };
                Ok(())
            }
            None => suspend_native(app),
        }
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationSuspend_Base(this: *mut Application) -> ErrorCode {
    checked::ffi_guard(|| suspend_native(app_mut(this)?))
}

#[no_mangle]
pub extern "C" fn TfApplicationResume(this: *mut Application) -> ErrorCode {
    checked::ffi_guard(|| {
        let app = app_mut(this)?;
        match override_slot(VirtualMethod::ApplicationResume) {
            Some(slot) => {
                let f: VoidMethodFn = unsafe { std::mem::transmute(slot) };
                unsafe { f(this as *mut c_void) };
                Ok(())
            }
            None => resume_native(app),
        }
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationResume_Base(this: *mut Application) -> ErrorCode {
    checked::ffi_guard(|| resume_native(app_mut(this)?))
}

#[no_mangle]
pub extern "C" fn TfApplicationGetTileRect(this: *mut Application, out: *mut Rect) -> ErrorCode {
    checked::ffi_guard(|| {
        app_mut(this)?;
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        let rect = match override_slot(VirtualMethod::ApplicationGetTileRect) {
            Some(slot) => {
                let f: GetTileRectFn = unsafe { std::mem::transmute(slot) };
                let r = unsafe { f(this as *mut c_void) };
                if r.is_null() {
                    tile_rect_native()
                } else {
                    unsafe { *r }
                }
            }
            None => tile_rect_native(),
        };
        unsafe { *out = rect };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationGetTileRect_Base(
    this: *mut Application,
    out: *mut Rect,
) -> ErrorCode {
    checked::ffi_guard(|| {
        app_mut(this)?;
        if out.is_null() {
            return Err(Error::ArgumentNull);
        }
        unsafe { *out = tile_rect_native() };
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationHandleEvent(this: *mut Application, event: *mut Event) -> ErrorCode {
    checked::ffi_guard(|| {
        app_mut(this)?;
        if event.is_null() {
            return Err(Error::ArgumentNull);
        }
        match override_slot(VirtualMethod::ApplicationHandleEvent) {
            Some(slot) => {
                let f: HandleEventFn = unsafe { std::mem::transmute(slot) };
                unsafe { f(this as *mut c_void, event) };
            }
            None => dispatch_event(unsafe { &mut *event }),
        }
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationHandleEvent_Base(
    this: *mut Application,
    event: *mut Event,
) -> ErrorCode {
    checked::ffi_guard(|| {
        app_mut(this)?;
        if event.is_null() {
            return Err(Error::ArgumentNull);
        }
        dispatch_event(unsafe { &mut *event });
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationWriteShellMsg(this: *mut Application) -> ErrorCode {
    checked::ffi_guard(|| {
        app_mut(this)?;
        if let Some(slot) = override_slot(VirtualMethod::ApplicationWriteShellMsg) {
            let f: VoidMethodFn = unsafe { std::mem::transmute(slot) };
            unsafe { f(this as *mut c_void) };
        }
        // Native behavior is a no-op: the alternate screen owns the
        // display, so there is no shell prompt to annotate.
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationWriteShellMsg_Base(this: *mut Application) -> ErrorCode {
    checked::ffi_guard(|| {
        app_mut(this)?;
        Ok(())
    })
}

// ============================================================================
// Run loop
// ============================================================================

fn run_with_backend(backend: Box<dyn TerminalBackend>, headless: bool) -> Result<(), Error> {
    context::init_context(backend)?;
    context::reset_quit();

    let start: Result<(), Error> = (|| {
        let mut ctx = context::context_write()?;
        ctx.backend.init()?;
        let (w, h) = ctx.backend.size();
        ctx.front_buffer.resize(w, h);
        ctx.back_buffer.resize(w, h);
        Ok(())
    })();
    let result = match start {
        Ok(()) => run_loop(headless),
        Err(e) => Err(e),
    };

    // Shut the backend down outside the context lock.
    let shutdown = match context::destroy_context()? {
        Some(mut backend) => backend.shutdown(),
        None => Ok(()),
    };
    result.and(shutdown)
}

fn run_loop(headless: bool) -> Result<(), Error> {
    let mut idle_streak = 0u32;
    let mut screenshot_idles = 0u32;

    render()?;
    while !context::quit_requested() {
        let events = context::context_write()?.backend.read_events(POLL_TIMEOUT_MS);
        if events.is_empty() {
            idle(&mut idle_streak, &mut screenshot_idles, headless)?;
        } else {
            idle_streak = 0;
            for mut event in events {
                dispatch_event(&mut event);
            }
        }
        render()?;
    }
    Ok(())
}

fn idle(idle_streak: &mut u32, screenshot_idles: &mut u32, headless: bool) -> Result<(), Error> {
    // Scripted events are fed one per idle pass so each gets a full
    // dispatch-and-repaint cycle, like real input would.
    if let Some(mut event) = next_script_event() {
        *idle_streak = 0;
        dispatch_event(&mut event);
        return Ok(());
    }

    *idle_streak += 1;

    let screenshot = debug_lock()?.screenshot_path.clone();
    if let Some(path) = screenshot {
        save_screenshot(&path)?;
        *screenshot_idles += 1;
        if *screenshot_idles > SCREENSHOT_EXTRA_IDLES {
            context::request_quit();
        }
    }
    if headless && *idle_streak > HEADLESS_IDLE_LIMIT {
        context::request_quit();
    }
    Ok(())
}

fn render() -> Result<(), Error> {
    let forms = context::desktop_forms();
    let mut ctx = context::context_write()?;
    let context::AppContext {
        backend,
        front_buffer,
        back_buffer,
    } = &mut *ctx;

    let (w, h) = backend.size();
    if back_buffer.width != w || back_buffer.height != h {
        front_buffer.resize(w, h);
        back_buffer.resize(w, h);
    }

    let backdrop = Cell::new('▒', palette::DESKTOP_FG, palette::DESKTOP_BG);
    for y in 0..h {
        for x in 0..w {
            back_buffer.set(x, y, backdrop);
        }
    }

    // Only the topmost form is active; its frame draws differently.
    let top = forms.last().copied();
    for &form in &forms {
        unsafe {
            (*form)
                .state
                .set(StateFlags::FOCUSED, top == Some(form));
            if !(*form).is_visible() {
                continue;
            }
            let bounds = (*form).bounds;
            let mut surface = DrawSurface::new(back_buffer, bounds);
            view::as_widget(form).draw(&mut surface);
            // Children draw on the full buffer at client-offset bounds.
            (*(form as *mut Form)).draw_children(back_buffer);
        }
    }

    let updates = diff_buffers(front_buffer, back_buffer);
    backend.write_diff(&updates)?;
    backend.flush()?;
    std::mem::swap(front_buffer, back_buffer);
    Ok(())
}

// ============================================================================
// Debug facilities
// ============================================================================

const SCREENSHOT_WIDTH: u16 = 40;
const SCREENSHOT_HEIGHT: u16 = 12;

struct DebugConfig {
    screenshot_path: Option<PathBuf>,
    script: VecDeque<Event>,
}

// SAFETY: scripted events carry key and mouse payloads only; the
// message pointer stays null.
unsafe impl Send for DebugConfig {}

static DEBUG: Mutex<DebugConfig> = Mutex::new(DebugConfig {
    screenshot_path: None,
    script: VecDeque::new(),
});

fn debug_lock() -> Result<std::sync::MutexGuard<'static, DebugConfig>, Error> {
    DEBUG
        .lock()
        .map_err(|e| Error::native(format!("debug state lock poisoned after panic: {e}")))
}

fn next_script_event() -> Option<Event> {
    DEBUG.lock().ok()?.script.pop_front()
}

/// Fixed 40x12 crop of the live screen, written as UTF-8 text with
/// trailing blanks trimmed. On taller screens the bottom screen row is
/// folded into the last snapshot row so status lines stay visible.
fn save_screenshot(path: &Path) -> Result<(), Error> {
    let ctx = context::context_write()?;
    let screen = &ctx.front_buffer;

    let mut out = String::new();
    for y in 0..SCREENSHOT_HEIGHT {
        let source_row = if y == SCREENSHOT_HEIGHT - 1 && screen.height > SCREENSHOT_HEIGHT {
            screen.height - 1
        } else {
            y
        };
        let mut line = String::new();
        if source_row < screen.height {
            for x in 0..SCREENSHOT_WIDTH.min(screen.width) {
                if let Some(cell) = screen.get(x, source_row) {
                    line.push(cell.ch);
                }
            }
        }
        while line.ends_with(' ') {
            line.pop();
        }
        out.push_str(&line);
        out.push('\n');
    }
    drop(ctx);

    std::fs::write(path, out)
        .map_err(|e| Error::native(format!("debug screenshot {}: {e}", path.display())))
}

fn next_field_value(tokens: &mut SplitWhitespace, field: &str) -> Result<i32, Error> {
    let token = tokens
        .next()
        .ok_or_else(|| Error::invalid_argument(format!("missing value for {field}")))?;
    token
        .parse()
        .map_err(|_| Error::invalid_argument(format!("bad value for {field}: {token}")))
}

fn parse_key_down(tokens: &mut SplitWhitespace) -> Result<Event, Error> {
    let mut key = KeyDownEvent::default();
    while let Some(field) = tokens.next() {
        match field {
            "code:" => key.key_code = next_field_value(tokens, field)? as u16,
            "ctrl:" => key.control_key_state = next_field_value(tokens, field)? as u16,
            "text:" => {
                // text: is last; the remaining tokens are UTF-8 bytes.
                let mut length = 0usize;
                for token in tokens.by_ref() {
                    let byte: u8 = token.parse().map_err(|_| {
                        Error::invalid_argument(format!("bad text byte: {token}"))
                    })?;
                    if length < key.text.len() {
                        key.text[length] = byte;
                        length += 1;
                    }
                }
                key.text_length = length as u8;
            }
            other => {
                return Err(Error::invalid_argument(format!(
                    "unknown key event field: {other}"
                )))
            }
        }
    }
    Ok(Event::key(key))
}

fn parse_mouse(what: u16, tokens: &mut SplitWhitespace) -> Result<Event, Error> {
    let mut mouse = MouseEventType::default();
    while let Some(field) = tokens.next() {
        let value = next_field_value(tokens, field)?;
        match field {
            "x:" => mouse.pos.x = value,
            "y:" => mouse.pos.y = value,
            "flags:" => mouse.event_flags = value as u16,
            "ctrl:" => mouse.control_key_state = value as u16,
            "buttons:" => mouse.buttons = value as u8,
            "wheel:" => mouse.wheel = value as u8,
            other => {
                return Err(Error::invalid_argument(format!(
                    "unknown mouse event field: {other}"
                )))
            }
        }
    }
    Ok(Event::mouse(what, mouse))
}

/// Line-oriented event script: one event per line, `#` comments.
fn parse_event_script(text: &str) -> Result<Vec<Event>, Error> {
    let mut events = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let kind = tokens.next().unwrap_or_default();
        let event = match kind {
            "KEYDOWN" => parse_key_down(&mut tokens)?,
            "MOUSEDOWN" => parse_mouse(ev::MOUSE_DOWN, &mut tokens)?,
            "MOUSEUP" => parse_mouse(ev::MOUSE_UP, &mut tokens)?,
            "MOUSEMOVE" => parse_mouse(ev::MOUSE_MOVE, &mut tokens)?,
            "MOUSEAUTO" => parse_mouse(ev::MOUSE_AUTO, &mut tokens)?,
            other => {
                return Err(Error::invalid_argument(format!(
                    "unknown event type: {other}"
                )))
            }
        };
        events.push(event);
    }
    Ok(events)
}

// ============================================================================
// Static entry points
// ============================================================================

/// Runs the application against the real terminal until the last form
/// closes or quit is requested.
#[no_mangle]
pub extern "C" fn TfApplicationStaticRun() -> ErrorCode {
    checked::ffi_guard(|| run_with_backend(Box::new(CrosstermBackend::new()), false))
}

/// Runs the same loop over the in-memory backend. Exits on its own once
/// scripted input is exhausted.
#[no_mangle]
pub extern "C" fn TfApplicationStaticRunHeadless(width: u16, height: u16) -> ErrorCode {
    checked::ffi_guard(|| {
        if width == 0 || height == 0 {
            return Err(Error::ArgumentOutOfRange);
        }
        run_with_backend(Box::new(HeadlessBackend::new(width, height)), true)
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationStaticQuit() -> ErrorCode {
    context::request_quit();
    ErrorCode::SUCCESS
}

#[no_mangle]
pub extern "C" fn TfApplicationStaticEnableDebugScreenshot(output_file: *const c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        let path = unsafe { marshal::borrow_str(output_file)? };
        debug_lock()?.screenshot_path = Some(PathBuf::from(path));
        Ok(())
    })
}

#[no_mangle]
pub extern "C" fn TfApplicationStaticEnableDebugEvents(input_file: *const c_char) -> ErrorCode {
    checked::ffi_guard(|| {
        let path = unsafe { marshal::borrow_str(input_file)? };
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::native(format!("debug event script {path}: {e}")))?;
        let events = parse_event_script(&text)?;
        debug_lock()?.script.extend(events);
        Ok(())
    })
}
