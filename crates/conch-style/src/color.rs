//! The eight ANSI colors and their SGR codes.
//!
//! Each color has four codes: normal foreground (30-37), normal background
//! (40-47), bright foreground (90-97), and bright background (100-107).
//! Resetting is color-independent: 39 for foreground, 49 for background.

use std::fmt;
use std::str::FromStr;

use crate::StyleError;

/// SGR code that resets the foreground color.
pub const FG_RESET: u8 = 39;

/// SGR code that resets the background color.
pub const BG_RESET: u8 = 49;

/// One of the eight basic terminal colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color8 {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color8 {
    /// All colors, in SGR order.
    pub const ALL: [Self; 8] = [
        Self::Black,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::White,
    ];

    /// Offset from the base code (black = 0 .. white = 7).
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Foreground code: 30-37, or 90-97 when `bright`.
    #[must_use]
    pub const fn fg_code(self, bright: bool) -> u8 {
        if bright { 90 + self.index() } else { 30 + self.index() }
    }

    /// Background code: 40-47, or 100-107 when `bright`.
    #[must_use]
    pub const fn bg_code(self, bright: bool) -> u8 {
        if bright { 100 + self.index() } else { 40 + self.index() }
    }

    /// Lowercase name, as written in markup attributes.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
        }
    }
}

impl fmt::Display for Color8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Color8 {
    type Err = StyleError;

    /// Parse a color name, ignoring ASCII case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| StyleError::UnknownColor(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sgr_code_table() {
        assert_eq!(Color8::Black.fg_code(false), 30);
        assert_eq!(Color8::Red.bg_code(false), 41);
        assert_eq!(Color8::Green.fg_code(true), 92);
        assert_eq!(Color8::White.bg_code(true), 107);
        for (i, c) in Color8::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(c.fg_code(false)), 30 + i);
        }
    }

    #[test]
    fn parse_names() {
        assert_eq!("red".parse::<Color8>().unwrap(), Color8::Red);
        assert_eq!(" Cyan ".parse::<Color8>().unwrap(), Color8::Cyan);
        for c in Color8::ALL {
            assert_eq!(c.to_string().parse::<Color8>().unwrap(), c);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "purple".parse::<Color8>(),
            Err(StyleError::UnknownColor("purple".into()))
        );
    }
}
