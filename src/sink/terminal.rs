//! Terminal sink: previews the matrix in a true-color terminal.
//!
//! Each terminal cell shows two vertically stacked pixels using the upper
//! half block (`▀`): the foreground paints the top pixel and the background
//! the bottom one. A 64x64 matrix therefore needs a 64x32 terminal area.
//!
//! Frames are diffed against what is on screen and only changed cells are
//! written, accumulated in a single buffer and flushed with one syscall.

use super::FrameSink;
use crate::canvas::{Canvas, Rgb};
use crate::error::Result;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout, Write};

const HALF_BLOCK: &[u8] = "\u{2580}".as_bytes();

/// State tracker for the diffing algorithm.
///
/// This tracks the "current" terminal state (cursor position, colors)
/// to minimize the number of escape sequences we need to emit.
#[derive(Debug, Clone)]
struct DiffState {
    /// Last known cursor X position (0-indexed).
    cursor_x: u16,
    /// Last known cursor Y position (0-indexed).
    cursor_y: u16,
    /// Last emitted foreground color.
    fg: Option<Rgb>,
    /// Last emitted background color.
    bg: Option<Rgb>,
}

impl DiffState {
    /// Create a new diff state with unknown terminal state.
    const fn new() -> Self {
        Self {
            cursor_x: u16::MAX,
            cursor_y: u16::MAX,
            fg: None,
            bg: None,
        }
    }
}

/// The top and bottom pixel of terminal row `row`, column `x`.
#[inline]
fn cell_colors(canvas: &Canvas, x: u16, row: u16) -> (Rgb, Rgb) {
    let top = canvas.get(i32::from(x), i32::from(row) * 2).unwrap_or_default();
    let bottom = canvas
        .get(i32::from(x), i32::from(row) * 2 + 1)
        .unwrap_or_default();
    (top, bottom)
}

/// Render the difference between two frames into an ANSI sequence buffer.
///
/// With `current == None` every cell is written. Returns the number of
/// terminal cells emitted.
fn render_diff(
    current: Option<&Canvas>,
    next: &Canvas,
    output: &mut Vec<u8>,
    state: &mut DiffState,
) -> usize {
    let rows = next.height().div_ceil(2);
    let mut changed = 0;

    for row in 0..rows {
        for x in 0..next.width() {
            let (top, bottom) = cell_colors(next, x, row);
            if current.is_some_and(|c| cell_colors(c, x, row) == (top, bottom)) {
                continue;
            }
            changed += 1;

            if state.cursor_y != row || state.cursor_x != x {
                emit_cursor_move(output, x, row);
                state.cursor_x = x;
                state.cursor_y = row;
            }
            if state.fg != Some(top) {
                emit_fg_color(output, top);
                state.fg = Some(top);
            }
            if state.bg != Some(bottom) {
                emit_bg_color(output, bottom);
                state.bg = Some(bottom);
            }
            output.extend_from_slice(HALF_BLOCK);
            state.cursor_x += 1;
        }
    }

    changed
}

/// Emit a cursor move sequence.
///
/// Uses the most compact representation:
/// - `\x1b[H` for home (1,1)
/// - `\x1b[{row};{col}H` for absolute positioning
#[inline]
fn emit_cursor_move(output: &mut Vec<u8>, x: u16, y: u16) {
    // ANSI uses 1-indexed positions
    let row = y + 1;
    let col = x + 1;

    if row == 1 && col == 1 {
        output.extend_from_slice(b"\x1b[H");
    } else if col == 1 {
        let _ = write!(output, "\x1b[{row}H");
    } else {
        let _ = write!(output, "\x1b[{row};{col}H");
    }
}

/// Emit a foreground color sequence (true color).
#[inline]
fn emit_fg_color(output: &mut Vec<u8>, color: Rgb) {
    let _ = write!(output, "\x1b[38;2;{};{};{}m", color.r, color.g, color.b);
}

/// Emit a background color sequence (true color).
#[inline]
fn emit_bg_color(output: &mut Vec<u8>, color: Rgb) {
    let _ = write!(output, "\x1b[48;2;{};{};{}m", color.r, color.g, color.b);
}

/// A frame sink that draws into the terminal's alternate screen.
pub struct TerminalSink {
    /// Frame currently on screen (None until the first present).
    front: Option<Canvas>,
    /// Spare canvas handed out before the first present.
    spare: Canvas,
    /// Diff state for cursor/color tracking.
    diff_state: DiffState,
    /// Pre-allocated output buffer.
    output: Vec<u8>,
    /// Terminal stdout handle.
    stdout: Stdout,
}

impl TerminalSink {
    /// Enter the alternate screen and prepare a `width`×`height` pixel area.
    pub fn new(width: u16, height: u16) -> Result<Self> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
        execute!(stdout, terminal::Clear(terminal::ClearType::All))?;

        Ok(Self {
            front: None,
            spare: Canvas::new(width, height),
            diff_state: DiffState::new(),
            output: Vec::with_capacity(65536),
            stdout,
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.output.is_empty() {
            self.output.extend_from_slice(b"\x1b[0m");
            self.stdout.write_all(&self.output)?;
            self.stdout.flush()?;
            // The reset cleared our colors.
            self.diff_state.fg = None;
            self.diff_state.bg = None;
        }
        Ok(())
    }
}

impl FrameSink for TerminalSink {
    fn width(&self) -> u16 {
        self.spare.width()
    }

    fn height(&self) -> u16 {
        self.spare.height()
    }

    fn present(&mut self, frame: Canvas) -> Result<Canvas> {
        self.output.clear();
        render_diff(self.front.as_ref(), &frame, &mut self.output, &mut self.diff_state);
        self.flush()?;

        let previous = self.front.replace(frame);
        Ok(previous.unwrap_or_else(|| self.spare.clone()))
    }

    fn clear(&mut self) -> Result<()> {
        let blank = Canvas::new(self.width(), self.height());
        let _ = self.present(blank)?;
        Ok(())
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, cursor::Show, LeaveAlternateScreen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_identical_frames() {
        let a = Canvas::new(8, 8);
        let b = Canvas::new(8, 8);
        let mut output = Vec::new();
        let mut state = DiffState::new();

        assert_eq!(render_diff(Some(&a), &b, &mut output, &mut state), 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_diff_single_pixel_change() {
        let a = Canvas::new(8, 8);
        let mut b = Canvas::new(8, 8);
        b.set_pixel(3, 5, Rgb::new(255, 0, 0));

        let mut output = Vec::new();
        let mut state = DiffState::new();

        // Pixel row 5 is the bottom half of terminal row 2.
        assert_eq!(render_diff(Some(&a), &b, &mut output, &mut state), 1);
        let output_str = String::from_utf8_lossy(&output);
        assert!(output_str.contains("\x1b[3;4H"));
        assert!(output_str.contains("\x1b[48;2;255;0;0m"));
    }

    #[test]
    fn test_full_render_covers_every_cell() {
        let frame = Canvas::new(4, 5);
        let mut output = Vec::new();
        let mut state = DiffState::new();

        // Odd heights round up: 3 terminal rows of 4 cells.
        assert_eq!(render_diff(None, &frame, &mut output, &mut state), 12);
    }

    #[test]
    fn test_adjacent_cells_no_cursor_move() {
        let a = Canvas::new(8, 2);
        let mut b = Canvas::new(8, 2);
        b.draw_line(0, 0, 2, 0, Rgb::WHITE);

        let mut output = Vec::new();
        let mut state = DiffState::new();
        render_diff(Some(&a), &b, &mut output, &mut state);

        let output_str = String::from_utf8_lossy(&output);
        assert_eq!(output_str.matches("\x1b[H").count(), 1);
        assert_eq!(output_str.matches('H').count(), 1);
    }

    #[test]
    fn test_cursor_move_optimization() {
        let mut output = Vec::new();

        emit_cursor_move(&mut output, 0, 0);
        assert_eq!(&output, b"\x1b[H");

        output.clear();
        emit_cursor_move(&mut output, 0, 5);
        assert_eq!(&output, b"\x1b[6H");

        output.clear();
        emit_cursor_move(&mut output, 10, 5);
        assert_eq!(&output, b"\x1b[6;11H");
    }
}
