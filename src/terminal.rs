//! TerminalBackend trait + crossterm implementation.
//!
//! The event loop and renderer depend on this trait, not on crossterm
//! directly. That keeps the application runnable headless, with scripted
//! input and a captured screen, in tests and CI.

use crate::error::Error;
use crate::events::{ev, Event, KeyDownEvent, MouseEventType};
use crate::geometry::Point;
use crate::screen::{color_to_crossterm, Buffer, CellAttrs, CellUpdate};

/// BIOS-style key codes: scan code in the high byte, character code in
/// the low byte.
pub mod kb {
    pub const ENTER: u16 = 0x1C0D;
    pub const ESC: u16 = 0x011B;
    pub const TAB: u16 = 0x0F09;
    pub const SHIFT_TAB: u16 = 0x0F00;
    pub const BACKSPACE: u16 = 0x0E08;
    pub const UP: u16 = 0x4800;
    pub const DOWN: u16 = 0x5000;
    pub const LEFT: u16 = 0x4B00;
    pub const RIGHT: u16 = 0x4D00;
    pub const HOME: u16 = 0x4700;
    pub const END: u16 = 0x4F00;
    pub const PAGE_UP: u16 = 0x4900;
    pub const PAGE_DOWN: u16 = 0x5100;
    pub const INSERT: u16 = 0x5200;
    pub const DELETE: u16 = 0x5300;
    pub const F1: u16 = 0x3B00;

    // control_key_state flags
    pub const SHIFT: u16 = 0x0003;
    pub const CTRL: u16 = 0x0004;
    pub const ALT: u16 = 0x0008;
}

/// Mouse button masks for [`MouseEventType::buttons`].
pub mod mb {
    pub const LEFT: u8 = 0x01;
    pub const RIGHT: u8 = 0x02;
    pub const MIDDLE: u8 = 0x04;
}

// ============================================================================
// TerminalBackend Trait
// ============================================================================

pub trait TerminalBackend {
    fn init(&mut self) -> Result<(), Error>;
    fn shutdown(&mut self) -> Result<(), Error>;
    fn size(&self) -> (u16, u16);
    fn write_diff(&mut self, diff: &[CellUpdate]) -> Result<(), Error>;
    fn flush(&mut self) -> Result<(), Error>;
    fn read_events(&mut self, timeout_ms: u32) -> Vec<Event>;

    /// The captured screen, when the backend keeps one.
    fn captured_screen(&self) -> Option<&Buffer> {
        None
    }
}

fn io_error(what: &str, e: impl std::fmt::Display) -> Error {
    Error::Native(format!("{what}: {e}"))
}

// ============================================================================
// CrosstermBackend
// ============================================================================

pub struct CrosstermBackend {
    width: u16,
    height: u16,
}

impl CrosstermBackend {
    pub fn new() -> Self {
        let (w, h) = crossterm::terminal::size().unwrap_or((80, 24));
        Self {
            width: w,
            height: h,
        }
    }
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalBackend for CrosstermBackend {
    fn init(&mut self) -> Result<(), Error> {
        use crossterm::{
            cursor,
            event::EnableMouseCapture,
            terminal::{enable_raw_mode, EnterAlternateScreen},
            ExecutableCommand,
        };

        enable_raw_mode().map_err(|e| io_error("raw mode", e))?;
        let mut stdout = std::io::stdout();
        stdout
            .execute(EnterAlternateScreen)
            .map_err(|e| io_error("alternate screen", e))?;
        stdout
            .execute(EnableMouseCapture)
            .map_err(|e| io_error("mouse capture", e))?;
        // Widgets draw their own focus/selection cursors as inverted
        // cells, so the OS cursor stays hidden for the whole session.
        stdout
            .execute(cursor::Hide)
            .map_err(|e| io_error("hide cursor", e))?;

        let (w, h) = crossterm::terminal::size().unwrap_or((80, 24));
        self.width = w;
        self.height = h;

        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        use crossterm::{
            cursor,
            event::DisableMouseCapture,
            terminal::{disable_raw_mode, LeaveAlternateScreen},
            ExecutableCommand,
        };

        let mut stdout = std::io::stdout();
        stdout
            .execute(cursor::Show)
            .map_err(|e| io_error("show cursor", e))?;
        stdout
            .execute(DisableMouseCapture)
            .map_err(|e| io_error("disable mouse", e))?;
        stdout
            .execute(LeaveAlternateScreen)
            .map_err(|e| io_error("leave alternate screen", e))?;
        disable_raw_mode().map_err(|e| io_error("disable raw mode", e))?;

        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        crossterm::terminal::size().unwrap_or((self.width, self.height))
    }

    fn write_diff(&mut self, diff: &[CellUpdate]) -> Result<(), Error> {
        use crossterm::{
            cursor::MoveTo,
            style::{
                Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor,
            },
            QueueableCommand,
        };

        let mut stdout = std::io::stdout();

        for update in diff {
            stdout
                .queue(MoveTo(update.x, update.y))
                .map_err(|e| io_error("move", e))?;

            match color_to_crossterm(update.cell.fg) {
                Some(c) => stdout.queue(SetForegroundColor(c)),
                None => stdout.queue(SetForegroundColor(Color::Reset)),
            }
            .map_err(|e| io_error("fg", e))?;

            match color_to_crossterm(update.cell.bg) {
                Some(c) => stdout.queue(SetBackgroundColor(c)),
                None => stdout.queue(SetBackgroundColor(Color::Reset)),
            }
            .map_err(|e| io_error("bg", e))?;

            if update.cell.attrs.contains(CellAttrs::BOLD) {
                stdout
                    .queue(SetAttribute(Attribute::Bold))
                    .map_err(|e| io_error("bold", e))?;
            }
            if update.cell.attrs.contains(CellAttrs::ITALIC) {
                stdout
                    .queue(SetAttribute(Attribute::Italic))
                    .map_err(|e| io_error("italic", e))?;
            }
            if update.cell.attrs.contains(CellAttrs::UNDERLINE) {
                stdout
                    .queue(SetAttribute(Attribute::Underlined))
                    .map_err(|e| io_error("underline", e))?;
            }

            stdout
                .queue(Print(update.cell.ch))
                .map_err(|e| io_error("print", e))?;

            // Reset attributes after each cell
            stdout
                .queue(SetAttribute(Attribute::Reset))
                .map_err(|e| io_error("reset", e))?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        use std::io::Write;
        std::io::stdout().flush().map_err(|e| io_error("flush", e))
    }

    fn read_events(&mut self, timeout_ms: u32) -> Vec<Event> {
        use crossterm::event;

        let mut events = Vec::new();
        let timeout = std::time::Duration::from_millis(timeout_ms as u64);

        if event::poll(timeout).unwrap_or(false) {
            while event::poll(std::time::Duration::ZERO).unwrap_or(false) {
                match event::read() {
                    Ok(raw) => {
                        if let Some(translated) = translate_event(raw, &mut self.width, &mut self.height) {
                            events.push(translated);
                        }
                    }
                    Err(_) => break,
                }
            }
        }

        events
    }
}

fn translate_modifiers(mods: crossterm::event::KeyModifiers) -> u16 {
    use crossterm::event::KeyModifiers;
    let mut state = 0;
    if mods.contains(KeyModifiers::SHIFT) {
        state |= kb::SHIFT;
    }
    if mods.contains(KeyModifiers::CONTROL) {
        state |= kb::CTRL;
    }
    if mods.contains(KeyModifiers::ALT) {
        state |= kb::ALT;
    }
    state
}

fn translate_event(
    raw: crossterm::event::Event,
    width: &mut u16,
    height: &mut u16,
) -> Option<Event> {
    use crossterm::event::{
        Event as RawEvent, KeyCode, KeyEventKind, MouseButton, MouseEventKind,
    };

    match raw {
        RawEvent::Key(key_event) => {
            if key_event.kind != KeyEventKind::Press {
                return None;
            }
            let state = translate_modifiers(key_event.modifiers);
            let key_down = match key_event.code {
                KeyCode::Char(c) => KeyDownEvent::from_char(c, state),
                KeyCode::Enter => KeyDownEvent::from_key(kb::ENTER, state),
                KeyCode::Esc => KeyDownEvent::from_key(kb::ESC, state),
                KeyCode::Tab => KeyDownEvent::from_key(kb::TAB, state),
                KeyCode::BackTab => KeyDownEvent::from_key(kb::SHIFT_TAB, state | kb::SHIFT),
                KeyCode::Backspace => KeyDownEvent::from_key(kb::BACKSPACE, state),
                KeyCode::Up => KeyDownEvent::from_key(kb::UP, state),
                KeyCode::Down => KeyDownEvent::from_key(kb::DOWN, state),
                KeyCode::Left => KeyDownEvent::from_key(kb::LEFT, state),
                KeyCode::Right => KeyDownEvent::from_key(kb::RIGHT, state),
                KeyCode::Home => KeyDownEvent::from_key(kb::HOME, state),
                KeyCode::End => KeyDownEvent::from_key(kb::END, state),
                KeyCode::PageUp => KeyDownEvent::from_key(kb::PAGE_UP, state),
                KeyCode::PageDown => KeyDownEvent::from_key(kb::PAGE_DOWN, state),
                KeyCode::Insert => KeyDownEvent::from_key(kb::INSERT, state),
                KeyCode::Delete => KeyDownEvent::from_key(kb::DELETE, state),
                KeyCode::F(n) => {
                    KeyDownEvent::from_key(kb::F1 + (((n.saturating_sub(1)) as u16) << 8), state)
                }
                _ => return None,
            };
            Some(Event::key(key_down))
        }
        RawEvent::Mouse(mouse_event) => {
            let (what, buttons) = match mouse_event.kind {
                MouseEventKind::Down(MouseButton::Left) => (ev::MOUSE_DOWN, mb::LEFT),
                MouseEventKind::Down(MouseButton::Right) => (ev::MOUSE_DOWN, mb::RIGHT),
                MouseEventKind::Down(MouseButton::Middle) => (ev::MOUSE_DOWN, mb::MIDDLE),
                MouseEventKind::Up(MouseButton::Left) => (ev::MOUSE_UP, mb::LEFT),
                MouseEventKind::Up(MouseButton::Right) => (ev::MOUSE_UP, mb::RIGHT),
                MouseEventKind::Up(MouseButton::Middle) => (ev::MOUSE_UP, mb::MIDDLE),
                MouseEventKind::Drag(MouseButton::Left) => (ev::MOUSE_MOVE, mb::LEFT),
                MouseEventKind::Moved => (ev::MOUSE_MOVE, 0),
                _ => return None,
            };
            Some(Event::mouse(
                what,
                MouseEventType {
                    pos: Point::new(mouse_event.column as i32, mouse_event.row as i32),
                    control_key_state: translate_modifiers(mouse_event.modifiers),
                    buttons,
                    ..MouseEventType::default()
                },
            ))
        }
        RawEvent::Resize(w, h) => {
            *width = w;
            *height = h;
            None
        }
        _ => None,
    }
}

// ============================================================================
// HeadlessBackend
// ============================================================================

/// In-memory backend with a scripted input queue and a captured screen.
/// Drives the application in tests and in headless debug runs.
pub struct HeadlessBackend {
    width: u16,
    height: u16,
    screen: Buffer,
    queue: std::collections::VecDeque<Event>,
}

impl HeadlessBackend {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            screen: Buffer::new(width, height),
            queue: std::collections::VecDeque::new(),
        }
    }

    pub fn inject(&mut self, event: Event) {
        self.queue.push_back(event);
    }

    pub fn screen(&self) -> &Buffer {
        &self.screen
    }
}

impl TerminalBackend for HeadlessBackend {
    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn write_diff(&mut self, diff: &[CellUpdate]) -> Result<(), Error> {
        for update in diff {
            self.screen.set(update.x, update.y, update.cell);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn read_events(&mut self, _timeout_ms: u32) -> Vec<Event> {
        match self.queue.pop_front() {
            Some(event) => vec![event],
            None => Vec::new(),
        }
    }

    fn captured_screen(&self) -> Option<&Buffer> {
        Some(&self.screen)
    }
}
