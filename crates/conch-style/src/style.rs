//! Text styles and their SGR encoding.
//!
//! A [`Style`] is a partial description: every field may be left unset, and
//! an unset field inherits from whatever style it is layered over. Boolean
//! modifiers are tracked as two bitsets, `on` (explicitly true) and `off`
//! (explicitly false), so a child can switch off a parent's `bold` without
//! losing the parent's other settings.
//!
//! Encoding is fixed-order: modifiers (bold, dim, italic, underline,
//! blinking, strikethrough), then foreground, then background. The same style
//! always produces the same bytes.

use std::fmt::Write as _;

use bitflags::bitflags;

use crate::color::{BG_RESET, Color8, FG_RESET};

bitflags! {
    /// Boolean text modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        /// SGR 1, reset by 22.
        const BOLD          = 1 << 0;
        /// SGR 2, reset by 22.
        const DIM           = 1 << 1;
        /// SGR 3, reset by 23.
        const ITALIC        = 1 << 2;
        /// SGR 4, reset by 24.
        const UNDERLINE     = 1 << 3;
        /// SGR 5, reset by 25. Not widely supported.
        const BLINKING      = 1 << 4;
        /// SGR 9, reset by 29.
        const STRIKETHROUGH = 1 << 5;
    }
}

/// (modifier, set code, reset code) in encoding order.
const MODIFIER_CODES: [(Modifiers, u8, u8); 6] = [
    (Modifiers::BOLD, 1, 22),
    (Modifiers::DIM, 2, 22),
    (Modifiers::ITALIC, 3, 23),
    (Modifiers::UNDERLINE, 4, 24),
    (Modifiers::BLINKING, 5, 25),
    (Modifiers::STRIKETHROUGH, 9, 29),
];

impl Modifiers {
    /// Look up a modifier by its markup attribute name, ignoring case.
    #[must_use]
    pub fn from_attr(name: &str) -> Option<Self> {
        Self::all()
            .iter_names()
            .find(|(flag, _)| flag.eq_ignore_ascii_case(name))
            .map(|(_, m)| m)
    }
}

/// A partial text style.
///
/// ```
/// use conch_style::{Color8, Style};
///
/// let style = Style::new().bold().fg(Color8::Red);
/// assert_eq!(style.render("X", true), "\x1b[1;31mX\x1b[22;39m");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Style {
    pub color: Option<Color8>,
    pub background: Option<Color8>,
    pub bright: Option<bool>,
    pub bg_bright: Option<bool>,
    /// Modifiers explicitly switched on.
    pub on: Modifiers,
    /// Modifiers explicitly switched off.
    pub off: Modifiers,
    /// Line terminators appended after the rendered text.
    pub newlines: Option<usize>,
}

impl Style {
    /// The empty style: renders text unchanged.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            color: None,
            background: None,
            bright: None,
            bg_bright: None,
            on: Modifiers::empty(),
            off: Modifiers::empty(),
            newlines: None,
        }
    }

    // -- Setters ------------------------------------------------------------

    /// Switch `modifiers` on or off explicitly.
    #[must_use]
    pub fn set(mut self, modifiers: Modifiers, enabled: bool) -> Self {
        if enabled {
            self.on |= modifiers;
            self.off -= modifiers;
        } else {
            self.off |= modifiers;
            self.on -= modifiers;
        }
        self
    }

    #[must_use]
    pub fn bold(self) -> Self {
        self.set(Modifiers::BOLD, true)
    }

    #[must_use]
    pub fn dim(self) -> Self {
        self.set(Modifiers::DIM, true)
    }

    #[must_use]
    pub fn italic(self) -> Self {
        self.set(Modifiers::ITALIC, true)
    }

    #[must_use]
    pub fn underline(self) -> Self {
        self.set(Modifiers::UNDERLINE, true)
    }

    #[must_use]
    pub fn blinking(self) -> Self {
        self.set(Modifiers::BLINKING, true)
    }

    #[must_use]
    pub fn strikethrough(self) -> Self {
        self.set(Modifiers::STRIKETHROUGH, true)
    }

    /// Foreground color.
    #[must_use]
    pub const fn fg(mut self, color: Color8) -> Self {
        self.color = Some(color);
        self
    }

    /// Background color.
    #[must_use]
    pub const fn bg(mut self, color: Color8) -> Self {
        self.background = Some(color);
        self
    }

    /// Use the bright variant of the foreground color.
    #[must_use]
    pub const fn bright(mut self, bright: bool) -> Self {
        self.bright = Some(bright);
        self
    }

    /// Use the bright variant of the background color.
    #[must_use]
    pub const fn bg_bright(mut self, bright: bool) -> Self {
        self.bg_bright = Some(bright);
        self
    }

    /// Append `n` line terminators after rendering.
    #[must_use]
    pub const fn newlines(mut self, n: usize) -> Self {
        self.newlines = Some(n);
        self
    }

    // -- Queries ------------------------------------------------------------

    /// Effective modifiers: switched on and not switched off.
    #[must_use]
    pub const fn modifiers(&self) -> Modifiers {
        self.on.difference(self.off)
    }

    /// Whether `modifier` is effectively on.
    #[must_use]
    pub const fn has(&self, modifier: Modifiers) -> bool {
        self.modifiers().contains(modifier)
    }

    // -- Cascade ------------------------------------------------------------

    /// Layer `self` over `parent`: fields set here win, unset fields inherit.
    ///
    /// ```
    /// use conch_style::{Color8, Style};
    ///
    /// let parent = Style::new().fg(Color8::Red);
    /// let child = Style::new().bold();
    /// assert_eq!(child.over(&parent), Style::new().fg(Color8::Red).bold());
    /// ```
    #[must_use]
    pub fn over(&self, parent: &Self) -> Self {
        Self {
            color: self.color.or(parent.color),
            background: self.background.or(parent.background),
            bright: self.bright.or(parent.bright),
            bg_bright: self.bg_bright.or(parent.bg_bright),
            on: (parent.on - self.off) | self.on,
            off: (parent.off - self.on) | self.off,
            newlines: self.newlines.or(parent.newlines),
        }
    }

    /// The same style without trailing newlines.
    #[must_use]
    pub const fn without_newlines(mut self) -> Self {
        self.newlines = None;
        self
    }

    // -- Encoding -----------------------------------------------------------

    /// SGR set and reset codes, in encoding order.
    #[must_use]
    pub fn escapes(&self) -> (Vec<u8>, Vec<u8>) {
        let mut set = Vec::new();
        let mut unset = Vec::new();
        let modifiers = self.modifiers();
        for (flag, on, off) in MODIFIER_CODES {
            if modifiers.contains(flag) {
                set.push(on);
                unset.push(off);
            }
        }
        if let Some(color) = self.color {
            set.push(color.fg_code(self.bright.unwrap_or(false)));
            unset.push(FG_RESET);
        }
        if let Some(color) = self.background {
            set.push(color.bg_code(self.bg_bright.unwrap_or(false)));
            unset.push(BG_RESET);
        }
        (set, unset)
    }

    /// Whether rendering would add no escape codes.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.modifiers().is_empty() && self.color.is_none() && self.background.is_none()
    }

    /// Render `text` in this style.
    ///
    /// Empty text renders as `""` with no codes and no newlines. With
    /// `decorate` off, or nothing to set, the text is returned unchanged.
    /// Trailing newlines are appended either way.
    #[must_use]
    pub fn render(&self, text: &str, decorate: bool) -> String {
        if text.is_empty() {
            return String::new();
        }
        let newlines = self.newlines.unwrap_or(0);
        let mut out = String::with_capacity(text.len() + 16 + newlines);
        let (set, unset) = if decorate { self.escapes() } else { (Vec::new(), Vec::new()) };
        if set.is_empty() {
            out.push_str(text);
        } else {
            out.push_str("\x1b[");
            push_codes(&mut out, &set);
            out.push('m');
            out.push_str(text);
            out.push_str("\x1b[");
            push_codes(&mut out, &unset);
            out.push('m');
        }
        out.extend(std::iter::repeat_n('\n', newlines));
        out
    }
}

fn push_codes(out: &mut String, codes: &[u8]) {
    for (i, code) in codes.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        let _ = write!(out, "{code}");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // ── Encoding ────────────────────────────────────────────────────

    #[test]
    fn bold_red_exact() {
        let style = Style::new().bold().fg(Color8::Red);
        assert_eq!(style.render("X", true), "\x1b[1;31mX\x1b[22;39m");
    }

    #[test]
    fn order_is_modifiers_color_background() {
        let style = Style::new().bg(Color8::Yellow).fg(Color8::White).underline().italic();
        assert_eq!(style.escapes(), (vec![3, 4, 37, 43], vec![23, 24, 39, 49]));
    }

    #[test]
    fn bold_and_dim_both_reset_with_22() {
        let style = Style::new().bold().dim();
        assert_eq!(style.escapes(), (vec![1, 2], vec![22, 22]));
    }

    #[test]
    fn bright_variants() {
        let style = Style::new().fg(Color8::Green).bright(true).bg(Color8::Black).bg_bright(true);
        assert_eq!(style.escapes(), (vec![92, 100], vec![39, 49]));
    }

    #[test]
    fn bright_alone_sets_nothing() {
        assert!(Style::new().bright(true).escapes().0.is_empty());
    }

    #[test]
    fn strikethrough_and_blinking_codes() {
        let style = Style::new().blinking().strikethrough();
        assert_eq!(style.escapes(), (vec![5, 9], vec![25, 29]));
    }

    // ── Render ──────────────────────────────────────────────────────

    #[test]
    fn empty_style_renders_verbatim_plus_newlines() {
        assert_eq!(Style::new().render("abc", true), "abc");
        assert_eq!(Style::new().newlines(2).render("abc", true), "abc\n\n");
    }

    #[test]
    fn empty_text_renders_nothing() {
        let style = Style::new().bold().fg(Color8::Red).newlines(3);
        assert_eq!(style.render("", true), "");
        assert_eq!(style.render("", false), "");
    }

    #[test]
    fn undecorated_keeps_newlines() {
        let style = Style::new().bold().newlines(1);
        assert_eq!(style.render("hi", false), "hi\n");
    }

    // ── Cascade ─────────────────────────────────────────────────────

    #[test]
    fn child_keeps_unrelated_parent_fields() {
        let parent = Style::new().fg(Color8::Red);
        let child = Style::new().bold();
        let merged = child.over(&parent);
        assert_eq!(merged.color, Some(Color8::Red));
        assert!(merged.has(Modifiers::BOLD));
    }

    #[test]
    fn child_overrides_parent() {
        let parent = Style::new().fg(Color8::Red).bg(Color8::White).bold();
        let child = Style::new().bg(Color8::Green).set(Modifiers::BOLD, false);
        let merged = child.over(&parent);
        assert_eq!(merged.color, Some(Color8::Red));
        assert_eq!(merged.background, Some(Color8::Green));
        assert!(!merged.has(Modifiers::BOLD));
        assert_eq!(merged.escapes(), (vec![31, 42], vec![39, 49]));
    }

    #[test]
    fn explicit_off_survives_further_layering() {
        let grandparent = Style::new().bold();
        let parent = Style::new().set(Modifiers::BOLD, false).over(&grandparent);
        let child = Style::new().italic().over(&parent);
        assert!(!child.has(Modifiers::BOLD));
        assert!(child.has(Modifiers::ITALIC));
    }

    #[test]
    fn set_flips_between_on_and_off() {
        let style = Style::new().bold().set(Modifiers::BOLD, false);
        assert_eq!(style.on, Modifiers::empty());
        assert_eq!(style.off, Modifiers::BOLD);
    }

    // ── Names ───────────────────────────────────────────────────────

    #[test]
    fn modifier_names() {
        assert_eq!(Modifiers::from_attr("bold"), Some(Modifiers::BOLD));
        assert_eq!(Modifiers::from_attr("Strikethrough"), Some(Modifiers::STRIKETHROUGH));
        assert_eq!(Modifiers::from_attr("bright"), None);
    }
}
