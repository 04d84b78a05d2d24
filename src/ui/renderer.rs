//! Snapshot renderers for the demo host
//!
//! The engine never paints; these renderers show what a host does with a
//! [`ScreenSnapshot`]. `Renderer` draws into the real terminal with
//! crossterm, `DebugRenderer` produces a plain-text dump.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Attribute, Print, ResetColor, SetAttribute},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};

use crate::core::screen::ScreenSnapshot;

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    /// Size of the last frame, a change forces a clear
    last_size: (u16, u16),
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            last_size: (0, 0),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;

        self.initialized = true;
        Ok(())
    }

    /// Cleanup the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show, EnableLineWrap, LeaveAlternateScreen);
        let _ = stdout.flush();

        // Raw mode last, otherwise the shell is left unusable
        terminal::disable_raw_mode()?;
        println!();
        Ok(())
    }

    /// Draw a snapshot with a status line below it
    pub fn render(&mut self, snapshot: &ScreenSnapshot, status: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());

        queue!(stdout, Hide)?;
        if self.last_size != (snapshot.cols, snapshot.rows) {
            queue!(stdout, Clear(ClearType::All))?;
            self.last_size = (snapshot.cols, snapshot.rows);
        }

        for (row, line) in snapshot.lines.iter().enumerate() {
            queue!(stdout, MoveTo(0, row as u16), Print(line))?;
        }

        queue!(
            stdout,
            MoveTo(0, snapshot.rows),
            Clear(ClearType::CurrentLine),
            SetAttribute(Attribute::Reverse),
            Print(status),
            SetAttribute(Attribute::Reset),
            MoveTo(snapshot.cursor.x, snapshot.cursor.y),
            Show
        )?;

        stdout.flush()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Debug renderer (text output)
pub struct DebugRenderer;

impl DebugRenderer {
    /// Render a snapshot to a string, marking the cursor row and cell
    pub fn render(snapshot: &ScreenSnapshot) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "=== Screen {}x{} ===\n",
            snapshot.cols, snapshot.rows
        ));
        output.push_str(&format!(
            "Cursor: ({}, {})\n",
            snapshot.cursor.x, snapshot.cursor.y
        ));
        output.push_str("─".repeat(snapshot.cols as usize).as_str());
        output.push('\n');

        for (row_idx, line) in snapshot.lines.iter().enumerate() {
            let on_cursor_row = row_idx == snapshot.cursor.y as usize;
            output.push(if on_cursor_row { '>' } else { ' ' });

            for (col_idx, ch) in line.chars().enumerate() {
                if on_cursor_row && col_idx == snapshot.cursor.x as usize {
                    output.push('█');
                } else {
                    output.push(ch);
                }
            }

            output.push('\n');
        }

        output.push_str("─".repeat(snapshot.cols as usize).as_str());
        output.push('\n');

        output
    }
}
