// SPDX-License-Identifier: MIT
//
// Column-width arithmetic: how many terminal cells a string occupies.
//
// Every "how many rows do I erase" decision in the screen layer is built on
// the three functions here: `char_width`, `line_width`, and `section_lines`.
// The wrap packer uses the same per-codepoint widths so a wrapped line never
// exceeds the column budget it was given.
//
// # Width model
//
//   - Ordinary codepoints are 1 column.
//   - East-Asian Wide / Fullwidth codepoints are 2 columns. The ranges are an
//     explicit table (below), not a general Unicode property lookup, so the
//     result is stable across platforms and crate versions.
//   - A tab is expanded to 8 spaces before measuring.
//   - Anything else, including emoji and combining marks, is 1 column. Emoji
//     are deliberately not corrected: terminals disagree about them, and
//     guessing wrong by one column is no worse than guessing wrong by the
//     other. Output that must line up with the window should avoid emoji.
//
// The internal line separator is `\n`. Callers normalize `\r\n` with
// [`normalize_newlines`] before measuring multi-line text.

use std::borrow::Cow;

use thiserror::Error;

/// Width of a tab character once expanded.
pub const TAB_WIDTH: usize = 8;

/// The internal line separator.
pub const EOL: char = '\n';

/// Inclusive codepoint ranges rendered two columns wide.
#[rustfmt::skip]
const WIDE_RANGES: &[(u32, u32)] = &[
    (0x1100, 0x115F),   // Hangul Jamo initial consonants
    (0x11A3, 0x11A7),
    (0x11FA, 0x11FF),
    (0x2329, 0x232A),   // angle brackets
    (0x2E80, 0x2E99),   // CJK radicals supplement
    (0x2E9B, 0x2EF3),
    (0x2F00, 0x2FD5),   // Kangxi radicals
    (0x2FF0, 0x2FFB),   // ideographic description
    (0x3000, 0x303E),   // CJK symbols and punctuation
    (0x3041, 0x3096),   // Hiragana
    (0x3099, 0x30FF),   // Katakana
    (0x3105, 0x312F),   // Bopomofo
    (0x3131, 0x318E),   // Hangul compatibility Jamo
    (0x3190, 0x31BA),
    (0x31C0, 0x31E3),   // CJK strokes
    (0x31F0, 0x321E),
    (0x3220, 0x3247),
    (0x3250, 0x32FE),   // enclosed CJK
    (0x3300, 0x4DBF),   // CJK compatibility + extension A
    (0x4E00, 0xA48C),   // CJK unified ideographs + Yi
    (0xA490, 0xA4C6),
    (0xA960, 0xA97C),   // Hangul Jamo extended A
    (0xAC00, 0xD7A3),   // Hangul syllables
    (0xD7B0, 0xD7C6),
    (0xD7CB, 0xD7FB),
    (0xF900, 0xFAFF),   // CJK compatibility ideographs
    (0xFE10, 0xFE19),   // vertical forms
    (0xFE30, 0xFE52),   // CJK compatibility forms
    (0xFE54, 0xFE66),
    (0xFE68, 0xFE6B),
    (0xFF01, 0xFF60),   // fullwidth forms
    (0xFFE0, 0xFFE6),
    (0x1B000, 0x1B001), // Kana supplement
    (0x1F200, 0x1F202), // enclosed ideographic supplement
    (0x1F210, 0x1F23A),
    (0x1F240, 0x1F248),
    (0x1F250, 0x1F251),
    (0x20000, 0x2FFFD), // CJK extensions B..
    (0x30000, 0x3FFFD),
];

/// Errors raised by the wrap packer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WidthError {
    /// The fill character does not occupy exactly one column.
    #[error("fill character {fill:?} is {width} columns wide, expected 1")]
    FillWidth { fill: char, width: usize },
}

/// Horizontal placement of text inside a padded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    /// Text on the left, padding on the right.
    #[default]
    Left,
    /// Text on the right, padding on the left.
    Right,
    /// Padding split on both sides; the odd column goes right.
    Center,
}

/// Whether `ch` falls in one of the wide ranges.
fn is_wide(ch: char) -> bool {
    let cp = u32::from(ch);
    if cp < WIDE_RANGES[0].0 {
        return false;
    }
    WIDE_RANGES
        .binary_search_by(|&(lo, hi)| {
            if cp < lo {
                std::cmp::Ordering::Greater
            } else if cp > hi {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Column width of a single character.
///
/// ```
/// use conch_term::width::char_width;
///
/// assert_eq!(char_width('a'), 1);
/// assert_eq!(char_width('中'), 2);
/// assert_eq!(char_width('\t'), 8);
/// ```
#[must_use]
pub fn char_width(ch: char) -> usize {
    if ch == '\t' {
        TAB_WIDTH
    } else if is_wide(ch) {
        2
    } else {
        1
    }
}

/// Column width of a single line (no embedded line breaks expected).
#[must_use]
pub fn line_width(line: &str) -> usize {
    line.chars().map(char_width).sum()
}

/// Width of the widest line in a multi-line block.
#[must_use]
pub fn section_width(text: &str) -> usize {
    normalize_newlines(text)
        .split(EOL)
        .map(line_width)
        .max()
        .unwrap_or(0)
}

/// Number of terminal rows `text` occupies at `columns` wide.
///
/// Each line takes `ceil(width / columns)` rows, with a floor of one row
/// even when the line is empty. A zero column budget is treated as one.
///
/// `text` must already use `\n` separators.
#[must_use]
pub fn section_lines(text: &str, columns: usize) -> usize {
    let columns = columns.max(1);
    text.split(EOL)
        .map(|line| line_width(line).div_ceil(columns).max(1))
        .sum()
}

/// Convert `\r\n` line endings to `\n`. Borrows when nothing changes.
#[must_use]
pub fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains("\r\n") {
        Cow::Owned(text.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Greedy line packer.
///
/// Splits `text` on line breaks, then packs each line's characters into rows
/// no wider than `max_width`. Blank input lines are kept. With a `fill`
/// character, every produced row is padded to `max_width` according to
/// `align` (blank lines become a full row of `fill`).
///
/// A `max_width` of zero disables packing and returns the input lines.
///
/// # Errors
///
/// Returns [`WidthError::FillWidth`] if `fill` is not exactly one column wide.
///
/// ```
/// use conch_term::width::{wrap, Align};
///
/// let rows = wrap("abcdef", 4, Some('.'), Align::Right).unwrap();
/// assert_eq!(rows, vec!["abcd", "..ef"]);
/// ```
pub fn wrap(
    text: &str,
    max_width: usize,
    fill: Option<char>,
    align: Align,
) -> Result<Vec<String>, WidthError> {
    if let Some(fill) = fill {
        let width = char_width(fill);
        if width != 1 {
            return Err(WidthError::FillWidth { fill, width });
        }
    }

    let text = normalize_newlines(text);
    if max_width == 0 {
        return Ok(text.split(EOL).map(str::to_owned).collect());
    }

    let mut rows = Vec::new();
    for section in text.split(EOL) {
        if section.is_empty() {
            rows.push(fill.map_or_else(String::new, |f| f.to_string().repeat(max_width)));
            continue;
        }

        let mut line = String::new();
        let mut width = 0;
        for ch in section.chars() {
            let w = char_width(ch);
            if width + w > max_width && !line.is_empty() {
                rows.push(pad(std::mem::take(&mut line), width, max_width, fill, align));
                width = 0;
            }
            line.push(ch);
            width += w;
        }
        if !line.is_empty() {
            rows.push(pad(line, width, max_width, fill, align));
        }
    }
    Ok(rows)
}

/// Pad `line` (currently `width` columns) out to `target` with `fill`.
fn pad(line: String, width: usize, target: usize, fill: Option<char>, align: Align) -> String {
    let Some(fill) = fill else { return line };
    if width >= target {
        return line;
    }
    let gap = target - width;
    let (left, right) = match align {
        Align::Left => (0, gap),
        Align::Right => (gap, 0),
        Align::Center => (gap / 2, gap - gap / 2),
    };
    let mut padded = String::with_capacity(line.len() + gap);
    padded.extend(std::iter::repeat_n(fill, left));
    padded.push_str(&line);
    padded.extend(std::iter::repeat_n(fill, right));
    padded
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── char_width ──────────────────────────────────────────────────

    #[test]
    fn ascii_is_one_column() {
        for ch in ' '..='~' {
            assert_eq!(char_width(ch), 1, "{ch:?}");
        }
    }

    #[test]
    fn cjk_is_two_columns() {
        assert_eq!(char_width('中'), 2);
        assert_eq!(char_width('あ'), 2);
        assert_eq!(char_width('한'), 2);
        assert_eq!(char_width('Ａ'), 2); // fullwidth A
        assert_eq!(char_width('\u{3000}'), 2); // ideographic space
    }

    #[test]
    fn tab_is_eight_columns() {
        assert_eq!(char_width('\t'), TAB_WIDTH);
        assert_eq!(line_width("a\tb"), 10);
    }

    #[test]
    fn emoji_is_not_corrected() {
        assert_eq!(char_width('⭐'), 1);
        assert_eq!(char_width('😀'), 1);
    }

    #[test]
    fn range_edges() {
        assert_eq!(char_width('\u{10FF}'), 1);
        assert_eq!(char_width('\u{1100}'), 2);
        assert_eq!(char_width('\u{115F}'), 2);
        assert_eq!(char_width('\u{1160}'), 1);
        assert_eq!(char_width('\u{3FFFD}'), 2);
        assert_eq!(char_width('\u{3FFFE}'), 1);
    }

    #[test]
    fn wide_table_is_sorted() {
        for pair in WIDE_RANGES.windows(2) {
            assert!(pair[0].1 < pair[1].0, "{pair:x?}");
        }
    }

    // ── line_width ──────────────────────────────────────────────────

    #[test]
    fn ascii_width_equals_length() {
        for s in ["", "a", "hello world", "~!@#$%^&*()_+"] {
            assert_eq!(line_width(s), s.len());
        }
    }

    #[test]
    fn fullwidth_width_is_double_count() {
        let s = "中文字符测试";
        assert_eq!(line_width(s), 2 * s.chars().count());
    }

    #[test]
    fn mixed_width() {
        assert_eq!(line_width("ab中c"), 5);
    }

    #[test]
    fn section_width_is_widest_line() {
        assert_eq!(section_width("ab\r\nabcd\nabc"), 4);
        assert_eq!(section_width(""), 0);
    }

    // ── section_lines ───────────────────────────────────────────────

    #[test]
    fn empty_text_is_one_row() {
        assert_eq!(section_lines("", 80), 1);
    }

    #[test]
    fn single_line_rows_round_up() {
        assert_eq!(section_lines("abc", 80), 1);
        assert_eq!(section_lines(&"x".repeat(80), 80), 1);
        assert_eq!(section_lines(&"x".repeat(81), 80), 2);
        assert_eq!(section_lines(&"x".repeat(160), 80), 2);
    }

    #[test]
    fn rows_sum_over_lines() {
        // "abc" → 1, "" → 1, 12 cols at 5 → 3, trailing "" → 1
        assert_eq!(section_lines("abc\n\n123456789012\n", 5), 6);
    }

    #[test]
    fn wide_chars_count_double_for_rows() {
        assert_eq!(section_lines("中中中", 4), 2);
    }

    #[test]
    fn zero_columns_does_not_divide_by_zero() {
        assert_eq!(section_lines("abc", 0), 3);
    }

    // ── wrap ────────────────────────────────────────────────────────

    #[test]
    fn wrap_packs_greedily() {
        assert_eq!(wrap("abcdefg", 3, None, Align::Left).unwrap(), vec!["abc", "def", "g"]);
    }

    #[test]
    fn wrap_never_splits_wide_char() {
        assert_eq!(wrap("a中b", 2, None, Align::Left).unwrap(), vec!["a", "中", "b"]);
    }

    #[test]
    fn wrap_preserves_blank_lines() {
        assert_eq!(wrap("ab\n\ncd", 5, None, Align::Left).unwrap(), vec!["ab", "", "cd"]);
    }

    #[test]
    fn wrap_fills_blank_lines() {
        assert_eq!(wrap("\n", 3, Some('-'), Align::Left).unwrap(), vec!["---", "---"]);
    }

    #[test]
    fn wrap_align_left_pads_right() {
        assert_eq!(wrap("ab", 5, Some('.'), Align::Left).unwrap(), vec!["ab..."]);
    }

    #[test]
    fn wrap_align_right_pads_left() {
        assert_eq!(wrap("ab", 5, Some('.'), Align::Right).unwrap(), vec!["...ab"]);
    }

    #[test]
    fn wrap_align_center_extra_goes_right() {
        assert_eq!(wrap("ab", 5, Some('.'), Align::Center).unwrap(), vec![".ab.."]);
        assert_eq!(wrap("ab", 6, Some('.'), Align::Center).unwrap(), vec!["..ab.."]);
    }

    #[test]
    fn wrap_pads_short_wide_row() {
        // "中" is 2 wide; the row cannot take "文" so it is padded to 3.
        assert_eq!(wrap("中文", 3, Some(' '), Align::Left).unwrap(), vec!["中 ", "文 "]);
    }

    #[test]
    fn wrap_rejects_wide_fill() {
        assert_eq!(
            wrap("ab", 5, Some('中'), Align::Left),
            Err(WidthError::FillWidth { fill: '中', width: 2 })
        );
    }

    #[test]
    fn wrap_rejects_tab_fill() {
        assert!(wrap("ab", 5, Some('\t'), Align::Left).is_err());
    }

    #[test]
    fn wrap_zero_width_returns_lines() {
        assert_eq!(wrap("ab\r\ncd", 0, None, Align::Left).unwrap(), vec!["ab", "cd"]);
    }

    #[test]
    fn wrapped_rows_fit_budget() {
        let text = "the quick 中文 brown fox jumps over the lazy 狗";
        for max in 2..12 {
            for row in wrap(text, max, None, Align::Left).unwrap() {
                assert!(line_width(&row) <= max, "{row:?} > {max}");
            }
        }
    }

    #[test]
    fn normalize_borrows_when_clean() {
        assert!(matches!(normalize_newlines("a\nb"), Cow::Borrowed(_)));
        assert_eq!(normalize_newlines("a\r\nb"), "a\nb");
    }
}
