// SPDX-License-Identifier: MIT
//
// ANSI cursor and erase sequence encoding.
//
// Pure functions that write escape sequences to any `impl Write`. No state
// and no decoration checks: whether a sequence should be emitted at all is
// decided by `Screen`, which gates every call on the destination stream.
//
// Coordinates are passed through untouched. `cursor_to_column(w, 0)` writes
// `ESC[0G`, which terminals treat the same as column 1. Callers that track
// 1-based positions pass them as-is.

use std::io::{self, Write};

// ─── Relative Movement ───────────────────────────────────────────────────────

/// Move the cursor up `n` rows (CUU). Writes nothing when `n` is zero.
#[inline]
pub fn cursor_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}A")
}

/// Move the cursor down `n` rows (CUD). Writes nothing when `n` is zero.
#[inline]
pub fn cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}B")
}

/// Move the cursor right `n` columns (CUF). Writes nothing when `n` is zero.
#[inline]
pub fn cursor_right(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}C")
}

/// Move the cursor left `n` columns (CUB). Writes nothing when `n` is zero.
#[inline]
pub fn cursor_left(w: &mut impl Write, n: u16) -> io::Result<()> {
    if n == 0 {
        return Ok(());
    }
    write!(w, "\x1b[{n}D")
}

// ─── Absolute Movement ───────────────────────────────────────────────────────

/// Move the cursor to `column` on the current row (CHA).
#[inline]
pub fn cursor_to_column(w: &mut impl Write, column: u16) -> io::Result<()> {
    write!(w, "\x1b[{column}G")
}

/// Move the cursor to `(row, column)` (CUP).
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, column: u16) -> io::Result<()> {
    write!(w, "\x1b[{row};{column}H")
}

// ─── Cursor State ────────────────────────────────────────────────────────────

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Save the cursor position (DECSC).
#[inline]
pub fn cursor_save(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b7")
}

/// Restore the saved cursor position (DECRC).
#[inline]
pub fn cursor_restore(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b8")
}

// ─── Erase ───────────────────────────────────────────────────────────────────

/// Erase the whole current line (EL 2).
#[inline]
pub fn clear_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2K")
}

/// Erase from the cursor to the end of the line (EL 0).
#[inline]
pub fn clear_line_right(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0K")
}

/// Erase from the start of the line to the cursor (EL 1).
#[inline]
pub fn clear_line_left(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[1K")
}

/// Erase the whole screen (ED 2). The cursor does not move.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Erase from the cursor to the end of the screen (ED 0).
#[inline]
pub fn clear_below(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0J")
}

/// Erase from the start of the screen to the cursor (ED 1).
#[inline]
pub fn clear_above(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[1J")
}

// ─── Misc ────────────────────────────────────────────────────────────────────

/// Ring the terminal bell (BEL).
#[inline]
pub fn bell(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x07")
}

/// Erase a block of `rows` rows ending at the cursor row.
///
/// Column 0, up `rows - 1`, then clear to the end of the screen. A block of
/// one row (or zero) skips the upward move entirely.
pub fn revert(w: &mut impl Write, rows: u16) -> io::Result<()> {
    cursor_to_column(w, 0)?;
    if rows > 1 {
        cursor_up(w, rows - 1)?;
    }
    clear_below(w)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
