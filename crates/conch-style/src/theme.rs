//! Themes: default styles for markup tag names.
//!
//! A [`Theme`] is a plain value. The renderer is given one at construction;
//! changing styles means building a different theme, not mutating shared
//! state. Unknown tag names resolve to the `text` entry.

use std::collections::HashMap;

use crate::color::Color8;
use crate::style::Style;

/// Tag name that unknown tags fall back to.
pub const TEXT: &str = "text";

/// Mapping from tag name to default style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    styles: HashMap<String, Style>,
}

impl Default for Theme {
    /// The built-in theme:
    ///
    /// | tag        | style                          |
    /// |------------|--------------------------------|
    /// | `text`     | none                           |
    /// | `b`        | bold                           |
    /// | `i`        | italic                         |
    /// | `info`     | yellow                         |
    /// | `comment`  | green                          |
    /// | `notice`   | red                            |
    /// | `warn`     | white on yellow                |
    /// | `error`    | white on red                   |
    /// | `question` | cyan                           |
    fn default() -> Self {
        Self::from_iter([
            (TEXT, Style::new()),
            ("b", Style::new().bold()),
            ("i", Style::new().italic()),
            ("info", Style::new().fg(Color8::Yellow)),
            ("comment", Style::new().fg(Color8::Green)),
            ("notice", Style::new().fg(Color8::Red)),
            ("warn", Style::new().fg(Color8::White).bg(Color8::Yellow)),
            ("error", Style::new().fg(Color8::White).bg(Color8::Red)),
            ("question", Style::new().fg(Color8::Cyan)),
        ])
    }
}

impl<S: Into<String>> FromIterator<(S, Style)> for Theme {
    fn from_iter<I: IntoIterator<Item = (S, Style)>>(iter: I) -> Self {
        Self {
            styles: iter.into_iter().map(|(name, style)| (name.into(), style)).collect(),
        }
    }
}

impl Theme {
    /// A theme with no entries; every tag renders plain.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            styles: HashMap::new(),
        }
    }

    /// Add or replace the style for `tag`.
    #[must_use]
    pub fn with(mut self, tag: impl Into<String>, style: Style) -> Self {
        self.set(tag, style);
        self
    }

    /// Add or replace the style for `tag`.
    pub fn set(&mut self, tag: impl Into<String>, style: Style) {
        self.styles.insert(tag.into(), style);
    }

    /// Whether `tag` has its own entry.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.styles.contains_key(tag)
    }

    /// Style for `tag`, falling back to `text`, then to the empty style.
    #[must_use]
    pub fn get(&self, tag: &str) -> Style {
        self.styles
            .get(tag)
            .or_else(|| self.styles.get(TEXT))
            .copied()
            .unwrap_or_default()
    }

    /// Effective style for a markup node: theme default, then `parent`,
    /// then the node's own `explicit` attributes, later layers winning.
    #[must_use]
    pub fn resolve(&self, tag: &str, explicit: &Style, parent: &Style) -> Style {
        explicit.over(&parent.over(&self.get(tag)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
