//! Screen buffer
//!
//! This module defines a session's character grid and cursor. Bytes are
//! applied one at a time; newline, carriage return and backspace are the
//! only control characters, every other byte lands in the grid as the
//! character with the same code point.

use serde::Serialize;
use unicode_width::UnicodeWidthChar;

const LINE_FEED: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';
const BACKSPACE: u8 = 0x08;

/// Cursor position (0-indexed)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub x: u16,
    pub y: u16,
}

/// Character grid with a cursor
///
/// The cursor always stays inside the grid. After a character is written
/// into the last column the cursor parks there with a pending wrap, and the
/// next printable byte moves it to the start of the following row first.
#[derive(Clone, Debug)]
pub struct ScreenBuffer {
    cols: u16,
    rows: u16,
    lines: Vec<Row>,
    cursor: Cursor,
    wrap_pending: bool,
}

impl ScreenBuffer {
    /// Create a blank buffer. Both dimensions must be non-zero.
    pub fn new(cols: u16, rows: u16) -> Self {
        debug_assert!(cols > 0 && rows > 0, "screen dimensions must be non-zero");
        Self {
            cols,
            rows,
            lines: (0..rows).map(|_| Row::new(cols)).collect(),
            cursor: Cursor::default(),
            wrap_pending: false,
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Whether the next printable byte wraps to a new row
    pub fn wrap_pending(&self) -> bool {
        self.wrap_pending
    }

    /// Apply `bytes` in order, reporting the cursor after every byte
    pub fn write<F>(&mut self, bytes: &[u8], mut on_cursor: F)
    where
        F: FnMut(Cursor),
    {
        for &byte in bytes {
            match byte {
                LINE_FEED => self.linefeed(),
                CARRIAGE_RETURN => self.carriage_return(),
                BACKSPACE => self.backspace(),
                _ => self.put_char(char::from(byte)),
            }
            on_cursor(self.cursor);
        }
    }

    /// Resize the grid, keeping the top-left overlapping region
    pub fn resize(&mut self, cols: u16, rows: u16) {
        debug_assert!(cols > 0 && rows > 0, "screen dimensions must be non-zero");

        // Column the cursor would be in without the deferred wrap
        let logical_col = self.cursor.x + u16::from(self.wrap_pending);

        self.lines.truncate(rows as usize);
        while self.lines.len() < rows as usize {
            self.lines.push(Row::new(cols));
        }
        if cols != self.cols {
            for row in &mut self.lines {
                row.resize(cols);
            }
        }

        self.cols = cols;
        self.rows = rows;
        self.cursor.x = logical_col.min(cols - 1);
        self.cursor.y = self.cursor.y.min(rows - 1);
        self.wrap_pending = false;
    }

    fn put_char(&mut self, ch: char) {
        if self.wrap_pending {
            self.wrap_pending = false;
            self.lines[self.cursor.y as usize].wrapped = true;
            self.cursor.x = 0;
            self.advance_row();
        }

        let Cursor { x, y } = self.cursor;
        self.lines[y as usize].cells[x as usize] = Cell { ch };

        if x + 1 >= self.cols {
            self.wrap_pending = true;
        } else {
            self.cursor.x += 1;
        }
    }

    /// Line feed - column 0 of the next row, scrolling at the bottom
    fn linefeed(&mut self) {
        self.wrap_pending = false;
        self.cursor.x = 0;
        self.advance_row();
    }

    fn carriage_return(&mut self) {
        self.wrap_pending = false;
        self.cursor.x = 0;
    }

    fn backspace(&mut self) {
        // A pending wrap already sits one column past the cursor
        if self.wrap_pending {
            self.wrap_pending = false;
        } else {
            self.cursor.x = self.cursor.x.saturating_sub(1);
        }
    }

    fn advance_row(&mut self) {
        if self.cursor.y + 1 >= self.rows {
            self.scroll_up();
        } else {
            self.cursor.y += 1;
        }
    }

    /// Drop the top row and append a blank one
    fn scroll_up(&mut self) {
        self.lines.remove(0);
        self.lines.push(Row::new(self.cols));
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        self.lines.get(y as usize)?.cells.get(x as usize)
    }

    pub fn row(&self, y: u16) -> Option<&Row> {
        self.lines.get(y as usize)
    }

    /// Printable text of one row, trailing blanks trimmed
    pub fn row_text(&self, y: u16) -> Option<String> {
        self.row(y).map(Row::text)
    }

    /// Text of the whole screen
    ///
    /// Rows joined by auto-wrap are concatenated; trailing empty rows are
    /// dropped.
    pub fn text(&self) -> String {
        let mut result = String::new();
        for (idx, row) in self.lines.iter().enumerate() {
            result.push_str(&row.text());
            if idx + 1 < self.lines.len() && !row.wrapped {
                result.push('\n');
            }
        }
        while result.ends_with('\n') {
            result.pop();
        }
        result
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        ScreenSnapshot {
            cols: self.cols,
            rows: self.rows,
            cursor: self.cursor,
            lines: self
                .lines
                .iter()
                .map(|row| row.cells.iter().map(Cell::display_char).collect())
                .collect(),
        }
    }
}

/// Copy of a screen for hosts that paint it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScreenSnapshot {
    pub cols: u16,
    pub rows: u16,
    pub cursor: Cursor,
    /// One entry per row, exactly `cols` display characters wide
    pub lines: Vec<String>,
}

/// A single row
#[derive(Clone, Debug)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// Continued onto the next row by auto-wrap
    pub wrapped: bool,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            wrapped: false,
        }
    }

    pub fn resize(&mut self, new_cols: u16) {
        self.cells.resize(new_cols as usize, Cell::default());
    }

    fn text(&self) -> String {
        let mut text: String = self.cells.iter().map(Cell::display_char).collect();
        text.truncate(text.trim_end_matches(' ').len());
        text
    }
}

/// A single cell
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// `'\0'` when blank
    pub ch: char,
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        self.ch == '\0'
    }

    /// Character to paint: blanks and control characters become spaces
    pub fn display_char(&self) -> char {
        match self.ch.width() {
            Some(width) if width > 0 => self.ch,
            _ => ' ',
        }
    }
}
