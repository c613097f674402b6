//! Cell grid the widgets draw into.
//!
//! Rendering is double-buffered: widgets paint the front buffer every
//! frame, the front/back diff goes to the terminal backend, then the
//! buffers swap.

use bitflags::bitflags;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::geometry::Rect;

// ============================================================================
// Color Encoding (u32)
// ============================================================================
//
// Bits 31-24: Mode tag
//   0x00 = Default (terminal default)
//   0x01 = RGB truecolor (bits 23-0 = 0xRRGGBB)
//   0x02 = Indexed (bits 7-0 = palette index 0-255)

pub const COLOR_DEFAULT: u32 = 0x00000000;

pub const fn indexed(index: u8) -> u32 {
    0x02000000 | index as u32
}

pub fn color_tag(color: u32) -> u8 {
    ((color >> 24) & 0xFF) as u8
}

pub fn color_to_crossterm(color: u32) -> Option<crossterm::style::Color> {
    match color_tag(color) {
        0x00 => None, // Default — no override
        0x01 => {
            let r = ((color >> 16) & 0xFF) as u8;
            let g = ((color >> 8) & 0xFF) as u8;
            let b = (color & 0xFF) as u8;
            Some(crossterm::style::Color::Rgb { r, g, b })
        }
        0x02 => {
            let index = (color & 0xFF) as u8;
            Some(crossterm::style::Color::AnsiValue(index))
        }
        _ => None, // Invalid tag — treat as Default
    }
}

/// Desktop-style palette entries.
pub mod palette {
    use super::indexed;

    pub const DESKTOP_FG: u32 = indexed(7);
    pub const DESKTOP_BG: u32 = indexed(4);
    pub const FRAME_FG: u32 = indexed(15);
    pub const FRAME_BG: u32 = indexed(7);
    pub const CONTROL_FG: u32 = indexed(0);
    pub const CONTROL_BG: u32 = indexed(7);
    pub const FOCUSED_FG: u32 = indexed(15);
    pub const FOCUSED_BG: u32 = indexed(2);
    pub const SELECTED_FG: u32 = indexed(15);
    pub const SELECTED_BG: u32 = indexed(4);
    pub const SHORTCUT_FG: u32 = indexed(3);
}

// ============================================================================
// Cell Attributes (bitflags)
// ============================================================================

bitflags! {
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CellAttrs: u8 {
        const BOLD      = 0b0000_0001;
        const ITALIC    = 0b0000_0010;
        const UNDERLINE = 0b0000_0100;
    }
}

// ============================================================================
// Cell & Buffer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: u32,
    pub bg: u32,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: 0,
            bg: 0,
            attrs: CellAttrs::empty(),
        }
    }
}

impl Cell {
    pub fn new(ch: char, fg: u32, bg: u32) -> Self {
        Self {
            ch,
            fg,
            bg,
            attrs: CellAttrs::empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub width: u16,
    pub height: u16,
    pub cells: Vec<Cell>,
}

impl Buffer {
    pub fn new(width: u16, height: u16) -> Self {
        let size = (width as usize) * (height as usize);
        Self {
            width,
            height,
            cells: vec![Cell::default(); size],
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = (width as usize) * (height as usize);
        self.cells.resize(size, Cell::default());
        self.clear();
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::default();
        }
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.width && y < self.height {
            Some(&self.cells[(y as usize) * (self.width as usize) + (x as usize)])
        } else {
            None
        }
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[(y as usize) * (self.width as usize) + (x as usize)] = cell;
        }
    }

    /// One row as a string, with trailing blanks trimmed.
    pub fn row_text(&self, y: u16) -> String {
        let mut line = String::new();
        for x in 0..self.width {
            if let Some(cell) = self.get(x, y) {
                line.push(cell.ch);
            }
        }
        line.trim_end().to_string()
    }
}

// ============================================================================
// Cell Update (for TerminalBackend trait)
// ============================================================================

#[derive(Debug, Clone)]
pub struct CellUpdate {
    pub x: u16,
    pub y: u16,
    pub cell: Cell,
}

/// Diff the presented frame (`front`) against the freshly drawn one
/// (`back`). Returns the updates that turn the screen into `back`;
/// every cell counts as changed when sizes differ.
pub fn diff_buffers(front: &Buffer, back: &Buffer) -> Vec<CellUpdate> {
    let resized = front.width != back.width || front.height != back.height;
    let mut updates = Vec::new();
    for y in 0..back.height {
        for x in 0..back.width {
            let cell = back.get(x, y).expect("in-range cell");
            let changed = resized
                || match front.get(x, y) {
                    Some(f) => cell != f,
                    None => true,
                };
            if changed {
                updates.push(CellUpdate { x, y, cell: *cell });
            }
        }
    }
    updates
}

// ============================================================================
// Frame Characters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStyle {
    Single,
    Double,
}

impl FrameStyle {
    /// (top-left, top-right, bottom-left, bottom-right, horizontal, vertical)
    pub fn chars(self) -> (char, char, char, char, char, char) {
        match self {
            Self::Single => ('┌', '┐', '└', '┘', '─', '│'),
            Self::Double => ('╔', '╗', '╚', '╝', '═', '║'),
        }
    }
}

// ============================================================================
// Draw Surface
// ============================================================================

/// A clipped drawing window over the screen buffer. Coordinates are local
/// to `bounds.a`; writes outside the bounds or the buffer are dropped.
pub struct DrawSurface<'a> {
    buffer: &'a mut Buffer,
    bounds: Rect,
}

impl<'a> DrawSurface<'a> {
    pub fn new(buffer: &'a mut Buffer, bounds: Rect) -> Self {
        Self { buffer, bounds }
    }

    pub fn width(&self) -> i32 {
        self.bounds.width()
    }

    pub fn height(&self) -> i32 {
        self.bounds.height()
    }

    pub fn put(&mut self, x: i32, y: i32, cell: Cell) {
        if x < 0 || y < 0 || x >= self.bounds.width() || y >= self.bounds.height() {
            return;
        }
        let sx = self.bounds.a.x + x;
        let sy = self.bounds.a.y + y;
        if sx >= 0 && sy >= 0 {
            self.buffer.set(sx as u16, sy as u16, cell);
        }
    }

    pub fn fill(&mut self, fg: u32, bg: u32) {
        for y in 0..self.height() {
            for x in 0..self.width() {
                self.put(x, y, Cell::new(' ', fg, bg));
            }
        }
    }

    pub fn fill_row(&mut self, y: i32, fg: u32, bg: u32) {
        for x in 0..self.width() {
            self.put(x, y, Cell::new(' ', fg, bg));
        }
    }

    /// Draw a string starting at a local position, advancing by display
    /// width, truncated at the right edge.
    pub fn draw_str(&mut self, x: i32, y: i32, text: &str, fg: u32, bg: u32) {
        let mut col = x;
        for grapheme in text.graphemes(true) {
            let width = UnicodeWidthStr::width(grapheme) as i32;
            if col + width > self.width() {
                break;
            }
            // One cell per grapheme; wide graphemes occupy a following blank.
            let ch = grapheme.chars().next().unwrap_or(' ');
            self.put(col, y, Cell::new(ch, fg, bg));
            for pad in 1..width {
                self.put(col + pad, y, Cell::new(' ', fg, bg));
            }
            col += width.max(1);
        }
    }

    /// Outline the surface and fill the interior.
    pub fn draw_frame(&mut self, style: FrameStyle, title: &str, fg: u32, bg: u32) {
        let (tl, tr, bl, br, horiz, vert) = style.chars();
        let w = self.width();
        let h = self.height();
        if w < 1 || h < 1 {
            return;
        }

        self.fill(fg, bg);
        self.put(0, 0, Cell::new(tl, fg, bg));
        self.put(w - 1, 0, Cell::new(tr, fg, bg));
        self.put(0, h - 1, Cell::new(bl, fg, bg));
        self.put(w - 1, h - 1, Cell::new(br, fg, bg));
        for x in 1..(w - 1) {
            self.put(x, 0, Cell::new(horiz, fg, bg));
            self.put(x, h - 1, Cell::new(horiz, fg, bg));
        }
        for y in 1..(h - 1) {
            self.put(0, y, Cell::new(vert, fg, bg));
            self.put(w - 1, y, Cell::new(vert, fg, bg));
        }

        if !title.is_empty() && w > 4 {
            let text = format!(" {title} ");
            let text_w = UnicodeWidthStr::width(text.as_str()) as i32;
            let x = ((w - text_w) / 2).max(1);
            self.draw_str(x, 0, &text, fg, bg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point, Rect};

    fn rect(x1: i32, y1: i32, x2: i32, y2: i32) -> Rect {
        Rect {
            a: Point::new(x1, y1),
            b: Point::new(x2, y2),
        }
    }

    #[test]
    fn buffer_get_set_and_bounds() {
        let mut buf = Buffer::new(10, 5);
        assert_eq!(buf.cells.len(), 50);
        buf.set(3, 2, Cell::new('X', 0, 0));
        assert_eq!(buf.get(3, 2).unwrap().ch, 'X');
        assert_eq!(buf.get(0, 0).unwrap().ch, ' ');
        assert!(buf.get(10, 5).is_none());
    }

    #[test]
    fn diff_reports_only_changed_cells() {
        let front = Buffer::new(10, 5);
        let mut back = Buffer::new(10, 5);
        back.set(1, 1, Cell::new('A', 0, 0));
        back.set(4, 3, Cell::new('B', 0, 0));

        let diff = diff_buffers(&front, &back);
        assert_eq!(diff.len(), 2);
        assert_eq!((diff[0].x, diff[0].y, diff[0].cell.ch), (1, 1, 'A'));
        assert_eq!((diff[1].x, diff[1].y, diff[1].cell.ch), (4, 3, 'B'));
    }

    #[test]
    fn diff_after_resize_covers_everything() {
        let front = Buffer::new(3, 2);
        let back = Buffer::new(2, 2);
        assert_eq!(diff_buffers(&front, &back).len(), 4);
    }

    #[test]
    fn surface_clips_to_bounds() {
        let mut buf = Buffer::new(20, 10);
        let mut surface = DrawSurface::new(&mut buf, rect(5, 2, 10, 5));
        surface.put(0, 0, Cell::new('A', 0, 0));
        surface.put(4, 2, Cell::new('B', 0, 0));
        surface.put(5, 0, Cell::new('C', 0, 0)); // past right edge
        surface.put(-1, 0, Cell::new('D', 0, 0));

        assert_eq!(buf.get(5, 2).unwrap().ch, 'A');
        assert_eq!(buf.get(9, 4).unwrap().ch, 'B');
        for x in 10..20 {
            assert_eq!(buf.get(x, 2).unwrap().ch, ' ');
        }
    }

    #[test]
    fn draw_str_truncates_at_edge() {
        let mut buf = Buffer::new(20, 10);
        let mut surface = DrawSurface::new(&mut buf, rect(0, 0, 5, 1));
        surface.draw_str(0, 0, "hello world", 0, 0);
        assert_eq!(buf.row_text(0), "hello");
    }

    #[test]
    fn draw_str_accounts_for_wide_graphemes() {
        let mut buf = Buffer::new(10, 1);
        let mut surface = DrawSurface::new(&mut buf, rect(0, 0, 10, 1));
        surface.draw_str(0, 0, "日x", 0, 0);
        assert_eq!(buf.get(0, 0).unwrap().ch, '日');
        assert_eq!(buf.get(1, 0).unwrap().ch, ' ');
        assert_eq!(buf.get(2, 0).unwrap().ch, 'x');
    }

    #[test]
    fn frame_draws_corners_and_title() {
        let mut buf = Buffer::new(20, 5);
        let mut surface = DrawSurface::new(&mut buf, rect(0, 0, 12, 5));
        surface.draw_frame(FrameStyle::Double, "Hi", 0, 0);

        assert_eq!(buf.get(0, 0).unwrap().ch, '╔');
        assert_eq!(buf.get(11, 0).unwrap().ch, '╗');
        assert_eq!(buf.get(0, 4).unwrap().ch, '╚');
        assert_eq!(buf.get(11, 4).unwrap().ch, '╝');
        assert_eq!(buf.get(0, 2).unwrap().ch, '║');
        assert!(buf.row_text(0).contains(" Hi "));
    }

    #[test]
    fn row_text_trims_trailing_blanks() {
        let mut buf = Buffer::new(10, 1);
        buf.set(0, 0, Cell::new('a', 0, 0));
        buf.set(2, 0, Cell::new('b', 0, 0));
        assert_eq!(buf.row_text(0), "a b");
    }

    #[test]
    fn color_encoding_round_trip() {
        assert!(color_to_crossterm(COLOR_DEFAULT).is_none());
        match color_to_crossterm(0x01FF0000) {
            Some(crossterm::style::Color::Rgb { r, g, b }) => assert_eq!((r, g, b), (255, 0, 0)),
            other => panic!("expected Rgb, got {other:?}"),
        }
        match color_to_crossterm(indexed(7)) {
            Some(crossterm::style::Color::AnsiValue(7)) => {}
            other => panic!("expected AnsiValue(7), got {other:?}"),
        }
        assert!(color_to_crossterm(0x03000000).is_none());
    }
}
