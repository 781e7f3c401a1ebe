// SPDX-License-Identifier: MIT
//
// Screen diffing by revert: erase exactly the rows a block occupied.
//
// Stateful widgets (progress bars, menus, overwriting status lines) redraw in
// place. They do not track a cell grid; they remember the plain text they
// printed last, work out how many terminal rows it took at the current width,
// move the cursor back to the first of those rows, and clear to the end of the
// screen. Then the new block is printed where the old one was.
//
// `Screen` is the cursor-control surface, gated on the destination stream:
// when stdout is not decorated (a pipe, a file, `NO_COLOR`), every operation
// here writes nothing. `Snapshot` is the per-widget memory of the last block.

use std::io;

use crate::ansi;
use crate::output::{Output, Target};
use crate::width;

/// Clamp a row/column count to what a CSI parameter can carry.
fn clamp(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

// ─── Screen ─────────────────────────────────────────────────────────────────

/// Cursor movement and erase operations on an [`Output`]'s stdout.
#[derive(Debug, Clone)]
pub struct Screen {
    output: Output,
}

impl Screen {
    #[must_use]
    pub const fn new(output: Output) -> Self {
        Self { output }
    }

    /// The output this screen writes to.
    #[must_use]
    pub const fn output(&self) -> &Output {
        &self.output
    }

    /// Whether operations on this screen emit anything.
    #[must_use]
    pub fn is_decorated(&self) -> bool {
        self.output.is_stdout_decorated()
    }

    /// Encode with `f` and write, if stdout is decorated.
    fn emit(&self, f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> io::Result<()> {
        if !self.is_decorated() {
            return Ok(());
        }
        let mut buf = Vec::with_capacity(16);
        f(&mut buf)?;
        self.output.write(Target::Stdout, &buf)
    }

    // ── Movement ────────────────────────────────────────────────────

    /// Move up `n` rows. Zero writes nothing.
    ///
    /// # Errors
    ///
    /// Propagates the output's I/O error. Same for every operation below.
    pub fn move_up(&self, n: usize) -> io::Result<()> {
        self.emit(|w| ansi::cursor_up(w, clamp(n)))
    }

    pub fn move_down(&self, n: usize) -> io::Result<()> {
        self.emit(|w| ansi::cursor_down(w, clamp(n)))
    }

    pub fn move_right(&self, n: usize) -> io::Result<()> {
        self.emit(|w| ansi::cursor_right(w, clamp(n)))
    }

    pub fn move_left(&self, n: usize) -> io::Result<()> {
        self.emit(|w| ansi::cursor_left(w, clamp(n)))
    }

    /// Move to `column` on the current row.
    pub fn move_to_column(&self, column: usize) -> io::Result<()> {
        self.emit(|w| ansi::cursor_to_column(w, clamp(column)))
    }

    /// Move to `(row, column)`.
    pub fn move_to(&self, row: usize, column: usize) -> io::Result<()> {
        self.emit(|w| ansi::cursor_to(w, clamp(row), clamp(column)))
    }

    // ── Erase ───────────────────────────────────────────────────────

    pub fn clear_line(&self) -> io::Result<()> {
        self.emit(ansi::clear_line)
    }

    pub fn clear_line_right(&self) -> io::Result<()> {
        self.emit(ansi::clear_line_right)
    }

    pub fn clear_line_left(&self) -> io::Result<()> {
        self.emit(ansi::clear_line_left)
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        self.emit(ansi::clear_screen)
    }

    /// Erase from the cursor to the end of the screen.
    pub fn clear_below(&self) -> io::Result<()> {
        self.emit(ansi::clear_below)
    }

    /// Erase from the start of the screen to the cursor.
    pub fn clear_above(&self) -> io::Result<()> {
        self.emit(ansi::clear_above)
    }

    // ── Cursor State ────────────────────────────────────────────────

    pub fn hide_cursor(&self) -> io::Result<()> {
        self.emit(ansi::cursor_hide)
    }

    pub fn show_cursor(&self) -> io::Result<()> {
        self.emit(ansi::cursor_show)
    }

    pub fn save_cursor(&self) -> io::Result<()> {
        self.emit(ansi::cursor_save)
    }

    pub fn restore_cursor(&self) -> io::Result<()> {
        self.emit(ansi::cursor_restore)
    }

    pub fn bell(&self) -> io::Result<()> {
        self.emit(ansi::bell)
    }

    // ── Revert ──────────────────────────────────────────────────────

    /// Erase the last `rows` rows, leaving the cursor at column 0 of the
    /// first of them.
    pub fn revert(&self, rows: usize) -> io::Result<()> {
        self.emit(|w| ansi::revert(w, clamp(rows)))
    }
}

// ─── Snapshot ───────────────────────────────────────────────────────────────

/// How a [`Snapshot`] learns the terminal width when counting rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidthMode {
    /// Sample the width once and keep using it.
    #[default]
    Fixed,
    /// Re-query the width on every revert, following resizes.
    Adaptive,
}

/// The plain text of the block a widget rendered last.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    plain: Option<String>,
    mode: WidthMode,
    columns: Option<usize>,
}

impl Snapshot {
    #[must_use]
    pub const fn new(mode: WidthMode) -> Self {
        Self {
            plain: None,
            mode,
            columns: None,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> WidthMode {
        self.mode
    }

    /// Switch width sampling. Drops the cached column count.
    pub const fn set_mode(&mut self, mode: WidthMode) {
        self.mode = mode;
        self.columns = None;
    }

    /// Remember `plain` (markup already stripped) as the last block.
    pub fn record(&mut self, plain: &str) {
        self.plain = Some(width::normalize_newlines(plain).into_owned());
    }

    /// The remembered block, if any.
    #[must_use]
    pub fn plain(&self) -> Option<&str> {
        self.plain.as_deref()
    }

    /// Forget the remembered block without touching the screen.
    pub fn clear(&mut self) {
        self.plain = None;
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.plain.is_none()
    }

    /// Column budget used for row counting.
    pub fn columns(&mut self, output: &Output) -> usize {
        match self.mode {
            WidthMode::Adaptive => usize::from(output.terminal_size(true).cols),
            WidthMode::Fixed => *self
                .columns
                .get_or_insert_with(|| usize::from(output.terminal_size(false).cols)),
        }
    }

    /// Rows the remembered block occupies, zero when there is none.
    pub fn rows(&mut self, output: &Output) -> usize {
        let columns = self.columns(output);
        self.plain
            .as_deref()
            .map_or(0, |plain| width::section_lines(plain, columns))
    }

    /// Erase the remembered block and forget it. A no-op when empty.
    ///
    /// # Errors
    ///
    /// Propagates the output's I/O error. The snapshot is cleared either way.
    pub fn revert(&mut self, screen: &Screen) -> io::Result<()> {
        if self.plain.is_none() {
            return Ok(());
        }
        let rows = self.rows(screen.output());
        self.plain = None;
        screen.revert(rows)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
