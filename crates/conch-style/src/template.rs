//! Message templates with `%placeholder%` variables.
//!
//! Two placeholder forms:
//!
//! - `%name%` is replaced by the value of `name`.
//! - `%prefix{name}suffix%` is replaced by `prefix`, the value, and `suffix`,
//!   but only when `name` has a value. With no value the whole placeholder
//!   disappears, surrounding text included. An optional `:detail` after the
//!   name (`{name:detail}`) is accepted and ignored.
//!
//! Names are ASCII letters, `-`, and `_`. A `%...%` segment that is neither
//! form renders as the text between the percent signs. `\r\n` is normalized
//! to `\n` before parsing.
//!
//! ```
//! use conch_style::Template;
//!
//! let tpl = Template::parse("%p{var}n% bar");
//! assert_eq!(tpl.render(|_| None), " bar");
//! assert_eq!(tpl.render(|_| Some("X".into())), "pXn bar");
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%([^%]*)%").expect("valid placeholder pattern"));

static BARE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z\-_]+$").expect("valid name pattern"));

static BRACED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{([a-z\-_]+)(?::([^}]+))?\}").expect("valid braced name pattern")
});

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Var {
        name: String,
        prefix: String,
        suffix: String,
    },
}

/// A parsed message template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `source`. Parsing never fails; see the module docs for how
    /// malformed placeholders render.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let source = source.replace("\r\n", "\n");
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&source) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_owned()));
            }
            segments.push(placeholder(inner.as_str()));
            last = whole.end();
        }
        segments.push(Segment::Literal(source[last..].to_owned()));

        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Variable names in order of appearance.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var { name, .. } => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Make sure rendering always ends in `\n`.
    pub fn ensure_trailing_newline(&mut self) {
        match self.segments.last_mut() {
            Some(Segment::Literal(text)) if text.ends_with('\n') => {}
            Some(Segment::Literal(text)) => text.push('\n'),
            _ => self.segments.push(Segment::Literal("\n".to_owned())),
        }
    }

    /// Render with values from `lookup`. `None` means "no value".
    pub fn render(&self, mut lookup: impl FnMut(&str) -> Option<String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var {
                    name,
                    prefix,
                    suffix,
                } => {
                    if let Some(value) = lookup(name) {
                        out.push_str(prefix);
                        out.push_str(&value);
                        out.push_str(suffix);
                    }
                }
            }
        }
        out
    }

    /// Render with values from a map.
    #[must_use]
    pub fn render_map(&self, values: &HashMap<String, String>) -> String {
        self.render(|name| values.get(name).cloned())
    }
}

/// Classify the text between two `%` signs.
fn placeholder(inner: &str) -> Segment {
    if BARE_NAME.is_match(inner) {
        return Segment::Var {
            name: inner.to_owned(),
            prefix: String::new(),
            suffix: String::new(),
        };
    }
    if let Some(caps) = BRACED_NAME.captures(inner) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
            return Segment::Var {
                name: name.as_str().to_owned(),
                prefix: inner[..whole.start()].to_owned(),
                suffix: inner[whole.end()..].to_owned(),
            };
        }
    }
    Segment::Literal(inner.to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn var(name: &str, prefix: &str, suffix: &str) -> Segment {
        Segment::Var {
            name: name.into(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    fn lit(s: &str) -> Segment {
        Segment::Literal(s.into())
    }

    // ── Parse ───────────────────────────────────────────────────────

    #[test]
    fn bare_and_braced_placeholders() {
        let tpl = Template::parse("a %x% b %[{y}]% c");
        assert_eq!(
            tpl.segments(),
            &[lit("a "), var("x", "", ""), lit(" b "), var("y", "[", "]"), lit(" c")]
        );
    }

    #[test]
    fn detail_after_colon_is_ignored() {
        let tpl = Template::parse("%{size:10}%");
        assert_eq!(tpl.segments(), &[var("size", "", ""), lit("")]);
    }

    #[test]
    fn invalid_placeholder_renders_inner_text() {
        let tpl = Template::parse("100% sure 50%");
        assert_eq!(tpl.render(|_| Some("v".into())), "100 sure 50");
    }

    #[test]
    fn names_accept_dash_underscore_any_case() {
        let tpl = Template::parse("%Foo-bar_baz%");
        assert_eq!(tpl.variables().collect::<Vec<_>>(), vec!["Foo-bar_baz"]);
    }

    #[test]
    fn prefix_may_span_lines() {
        let tpl = Template::parse("%{title}\n%%current%");
        assert_eq!(tpl.render(|_| None), "");
        assert_eq!(tpl.render(|n| Some(n.to_uppercase())), "TITLE\nCURRENT");
    }

    // ── Render ──────────────────────────────────────────────────────

    #[test]
    fn affixes_only_with_value() {
        let tpl = Template::parse("%p{var}n% bar");
        assert_eq!(tpl.render(|_| None), " bar");
        assert_eq!(tpl.render(|_| Some("X".into())), "pXn bar");
    }

    #[test]
    fn render_from_map() {
        let tpl = Template::parse("%a%-%b%");
        let values = HashMap::from([("a".to_string(), "1".to_string())]);
        assert_eq!(tpl.render_map(&values), "1-");
    }

    #[test]
    fn trailing_newline_added_once() {
        let mut tpl = Template::parse("x %v%");
        tpl.ensure_trailing_newline();
        tpl.ensure_trailing_newline();
        assert_eq!(tpl.render(|_| Some("1".into())), "x 1\n");
    }

    #[test]
    fn crlf_normalized() {
        assert_eq!(Template::parse("a\r\n%v%").render(|_| Some("b".into())), "a\nb");
    }
}
