//! Markup: nested pseudo-HTML tags rendered as styled text.
//!
//! ```text
//! plain <info>yellow <b>and bold</b></info> <text color="red" underline>red</text>
//! ```
//!
//! # Grammar
//!
//! - `<name attr="v" attr='v' attr=v flag>` opens an element. `name` is one or
//!   more word characters.
//! - `</anything>` closes the innermost open element.
//! - `<name/>` is an empty element.
//! - A `<` that does not start a tag is literal text.
//! - `&lt; &gt; &amp; &quot; &apos; &#39;` are decoded in text.
//! - Elements left open at the end are closed implicitly.
//!
//! Attributes resolve to a [`Style`] when the markup is parsed: `color` and
//! `background` take a color name (unknown names are an error), `bright`,
//! `bgBright`, and the modifier names are flags that are true unless the value
//! is exactly `"0"`. Other attributes are ignored.
//!
//! # Cascade
//!
//! Each element's effective style is its tag's theme style, overlaid with the
//! parent's effective style, overlaid with the element's own attributes. Text
//! outside any tag is styled as `text`. Markup never appends trailing
//! newlines, whatever the theme says.
//!
//! # Output modes
//!
//! [`Renderer`] walks the tree depth-first and either concatenates styled runs
//! into a `String`, writes them to a sink as it goes, or hands each run's raw
//! text and style to a callback. In callback mode a run that spans several
//! lines is split at each `\n`, and each piece says whether it ended a line.

use std::io::{self, Write};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::StyleError;
use crate::style::{Modifiers, Style};
use crate::theme::{TEXT, Theme};

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A parsed markup node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Element(Element),
}

/// A tag with its explicit attribute style and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    /// Style from this element's own attributes only.
    pub style: Style,
    pub children: Vec<Node>,
}

impl Element {
    fn new(tag: impl Into<String>, style: Style) -> Self {
        Self {
            tag: tag.into(),
            style,
            children: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse markup into a tree rooted at an implicit `text` element.
///
/// # Errors
///
/// Returns [`StyleError::UnknownColor`] for a `color` or `background`
/// attribute that does not name one of the eight colors.
pub fn parse(markup: &str) -> Result<Element, StyleError> {
    let markup = markup.replace("\r\n", "\n");
    let mut stack = vec![Element::new(TEXT, Style::new())];
    let mut text = String::new();
    let mut rest = markup.as_str();

    while let Some(pos) = rest.find('<') {
        text.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(len) = closing_tag(tail) {
            flush_text(&mut stack, &mut text);
            close(&mut stack);
            rest = &tail[len..];
        } else if let Some(tag) = opening_tag(tail) {
            flush_text(&mut stack, &mut text);
            let style = attribute_style(tag.attrs)?;
            stack.push(Element::new(tag.name, style));
            if tag.self_closing {
                close(&mut stack);
            }
            rest = &tail[tag.len..];
        } else {
            text.push('<');
            rest = &tail[1..];
        }
    }
    text.push_str(rest);
    flush_text(&mut stack, &mut text);

    while stack.len() > 1 {
        close(&mut stack);
    }
    Ok(stack.pop().unwrap_or_else(|| Element::new(TEXT, Style::new())))
}

/// Move accumulated text into the innermost element.
fn flush_text(stack: &mut [Element], text: &mut String) {
    if text.is_empty() {
        return;
    }
    let decoded = decode_entities(text);
    text.clear();
    if let Some(top) = stack.last_mut() {
        top.children.push(Node::Text(decoded));
    }
}

/// Pop the innermost element into its parent. The root never closes.
fn close(stack: &mut Vec<Element>) {
    if stack.len() < 2 {
        return;
    }
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(Node::Element(done));
        }
    }
}

/// Length of a `</...>` tag at the start of `s`.
fn closing_tag(s: &str) -> Option<usize> {
    let body = s.strip_prefix("</")?;
    body.find('>').map(|end| end + 3)
}

struct OpeningTag<'a> {
    name: &'a str,
    attrs: &'a str,
    self_closing: bool,
    len: usize,
}

/// A `<name ...>` tag at the start of `s`.
fn opening_tag(s: &str) -> Option<OpeningTag<'_>> {
    let body = s.strip_prefix('<')?;
    let name_len = body
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(body.len());
    if name_len == 0 {
        return None;
    }
    let end = body.find('>')?;
    if end < name_len {
        return None;
    }
    let raw = body[name_len..end].trim_end();
    let (attrs, self_closing) = match raw.strip_suffix('/') {
        Some(attrs) => (attrs, true),
        None => (raw, false),
    };
    Some(OpeningTag {
        name: &body[..name_len],
        attrs,
        self_closing,
        len: end + 2,
    })
}

/// Split an attribute list into `(name, value)` pairs.
fn attributes(mut s: &str) -> Vec<(&str, Option<&str>)> {
    let mut out = Vec::new();
    loop {
        s = s.trim_start();
        if s.is_empty() {
            return out;
        }
        let name_end = s.find(|c: char| c.is_whitespace() || c == '=').unwrap_or(s.len());
        let name = &s[..name_end];
        s = s[name_end..].trim_start();

        let Some(after_eq) = s.strip_prefix('=') else {
            out.push((name, None));
            continue;
        };
        let after_eq = after_eq.trim_start();
        let (value, rest) = match after_eq.chars().next() {
            Some(q @ ('"' | '\'')) => {
                let inner = &after_eq[1..];
                match inner.find(q) {
                    Some(close) => (&inner[..close], &inner[close + 1..]),
                    None => (inner, ""),
                }
            }
            _ => {
                let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                (&after_eq[..end], &after_eq[end..])
            }
        };
        if !name.is_empty() {
            out.push((name, Some(value)));
        }
        s = rest;
    }
}

/// Resolve an attribute list into an explicit style.
fn attribute_style(attrs: &str) -> Result<Style, StyleError> {
    let mut style = Style::new();
    for (name, value) in attributes(attrs) {
        let flag = value != Some("0");
        match name.to_ascii_lowercase().as_str() {
            "color" => style.color = Some(value.unwrap_or_default().parse()?),
            "background" => style.background = Some(value.unwrap_or_default().parse()?),
            "bright" => style.bright = Some(flag),
            "bgbright" => style.bg_bright = Some(flag),
            other => match Modifiers::from_attr(other) {
                Some(modifier) => style = style.set(modifier, flag),
                None => debug!(attribute = name, "ignoring unknown markup attribute"),
            },
        }
    }
    Ok(style)
}

const ENTITIES: [(&str, char); 6] = [
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&amp;", '&'),
    ("&quot;", '"'),
    ("&apos;", '\''),
    ("&#39;", '\''),
];

/// Decode the supported character entities in one pass.
fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ENTITIES.iter().find(|(name, _)| tail.starts_with(name)) {
            Some((name, ch)) => {
                out.push(*ch);
                rest = &tail[name.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Plain-text helpers
// ---------------------------------------------------------------------------

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

/// Remove every `<...>` from `text`. Entities are left as written.
#[must_use]
pub fn strip_tags(text: &str) -> String {
    TAG.replace_all(text, "").into_owned()
}

/// Escape `&`, `<`, and `>` so `text` renders literally inside markup.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// One contiguous piece of text with its resolved style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run<'a> {
    pub text: &'a str,
    pub style: Style,
    /// Whether a line break followed this piece in the source.
    pub ends_line: bool,
}

/// Renders markup against a [`Theme`].
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    theme: Theme,
}

impl Renderer {
    #[must_use]
    pub const fn new(theme: Theme) -> Self {
        Self { theme }
    }

    #[must_use]
    pub const fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Replace the theme.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Materialize: parse and render to one string.
    ///
    /// # Errors
    ///
    /// Propagates parse errors; see [`parse`].
    pub fn render(&self, markup: &str, decorate: bool) -> Result<String, StyleError> {
        let doc = parse(markup)?;
        Ok(self.render_tree(&doc, decorate))
    }

    /// Materialize an already-parsed tree.
    #[must_use]
    pub fn render_tree(&self, doc: &Element, decorate: bool) -> String {
        let mut out = String::new();
        self.walk(doc, &Style::new(), &mut |text, style| {
            out.push_str(&style.render(text, decorate));
        });
        out
    }

    /// Stream: write each styled run to `w` as it is produced.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first write error.
    pub fn write_tree(&self, doc: &Element, decorate: bool, w: &mut impl Write) -> io::Result<()> {
        let mut result = Ok(());
        self.walk(doc, &Style::new(), &mut |text, style| {
            if result.is_ok() {
                result = w.write_all(style.render(text, decorate).as_bytes());
            }
        });
        result
    }

    /// Callback: call `f` with each run's raw text and style, split at line
    /// breaks.
    ///
    /// # Errors
    ///
    /// Propagates parse errors; see [`parse`].
    pub fn visit(&self, markup: &str, f: impl FnMut(Run<'_>)) -> Result<(), StyleError> {
        let doc = parse(markup)?;
        self.visit_tree(&doc, f);
        Ok(())
    }

    /// Callback mode over an already-parsed tree.
    pub fn visit_tree(&self, doc: &Element, mut f: impl FnMut(Run<'_>)) {
        self.walk(doc, &Style::new(), &mut |text, style| {
            for piece in text.split_inclusive('\n') {
                let (text, ends_line) = match piece.strip_suffix('\n') {
                    Some(text) => (text, true),
                    None => (piece, false),
                };
                f(Run {
                    text,
                    style: *style,
                    ends_line,
                });
            }
        });
    }

    /// The text content with tags removed and entities decoded.
    #[must_use]
    pub fn plain_tree(&self, doc: &Element) -> String {
        let mut out = String::new();
        self.walk(doc, &Style::new(), &mut |text, _| out.push_str(text));
        out
    }

    /// Depth-first walk calling `emit` with each text node's effective style.
    fn walk(&self, element: &Element, parent: &Style, emit: &mut dyn FnMut(&str, &Style)) {
        let style = self
            .theme
            .resolve(&element.tag, &element.style, parent)
            .without_newlines();
        for child in &element.children {
            match child {
                Node::Text(text) => emit(text, &style),
                Node::Element(el) => self.walk(el, &style, emit),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color8;
    use pretty_assertions::assert_eq;

    fn renderer() -> Renderer {
        Renderer::new(Theme::default())
    }

    fn runs(markup: &str) -> Vec<(String, Style, bool)> {
        let mut out = Vec::new();
        renderer()
            .visit(markup, |run| out.push((run.text.to_owned(), run.style, run.ends_line)))
            .unwrap();
        out
    }

    // ── Parse ───────────────────────────────────────────────────────

    #[test]
    fn plain_text_is_one_node() {
        let doc = parse("hello").unwrap();
        assert_eq!(doc.tag, "text");
        assert_eq!(doc.children, vec![Node::Text("hello".into())]);
    }

    #[test]
    fn nested_elements() {
        let doc = parse("a<info>b<b>c</b></info>d").unwrap();
        assert_eq!(doc.children.len(), 3);
        let Node::Element(info) = &doc.children[1] else { panic!("expected element") };
        assert_eq!(info.tag, "info");
        let Node::Element(b) = &info.children[1] else { panic!("expected element") };
        assert_eq!(b.children, vec![Node::Text("c".into())]);
    }

    #[test]
    fn any_closing_tag_closes_innermost() {
        let doc = parse("<b>x</whatever>y").unwrap();
        assert_eq!(doc.children[1], Node::Text("y".into()));
    }

    #[test]
    fn stray_closing_tag_at_root_is_ignored() {
        assert_eq!(renderer().render("a</b>c", true).unwrap(), "ac");
    }

    #[test]
    fn unclosed_elements_close_at_end() {
        let doc = parse("<b><i>x").unwrap();
        assert_eq!(doc.children.len(), 1);
    }

    #[test]
    fn literal_angle_brackets() {
        assert_eq!(renderer().render("1 < 2 and 3 > 2", false).unwrap(), "1 < 2 and 3 > 2");
        assert_eq!(renderer().render("a <", false).unwrap(), "a <");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            renderer().render("&lt;b&gt; &amp;lt; &quot;q&quot; &#39; &x", false).unwrap(),
            "<b> &lt; \"q\" ' &x"
        );
    }

    #[test]
    fn attribute_forms() {
        let doc = parse(r#"<text color="red" background='blue' bold underline=0 bright=1>x</text>"#)
            .unwrap();
        let Node::Element(el) = &doc.children[0] else { panic!("expected element") };
        assert_eq!(el.style.color, Some(Color8::Red));
        assert_eq!(el.style.background, Some(Color8::Blue));
        assert!(el.style.on.contains(Modifiers::BOLD));
        assert!(el.style.off.contains(Modifiers::UNDERLINE));
        assert_eq!(el.style.bright, Some(true));
    }

    #[test]
    fn bg_bright_attribute_any_case() {
        let doc = parse("<text bgBright>x</text><text bgbright=0>y</text>").unwrap();
        let Node::Element(a) = &doc.children[0] else { panic!("expected element") };
        let Node::Element(b) = &doc.children[1] else { panic!("expected element") };
        assert_eq!(a.style.bg_bright, Some(true));
        assert_eq!(b.style.bg_bright, Some(false));
    }

    #[test]
    fn unknown_color_is_an_error() {
        assert_eq!(
            parse(r#"<text color="purple">x</text>"#),
            Err(StyleError::UnknownColor("purple".into()))
        );
    }

    #[test]
    fn unknown_attribute_is_ignored() {
        let doc = parse(r#"<text href="x" bold>y</text>"#).unwrap();
        let Node::Element(el) = &doc.children[0] else { panic!("expected element") };
        assert_eq!(el.style, Style::new().bold());
    }

    #[test]
    fn self_closing_element_is_empty() {
        let doc = parse("a<b/>c").unwrap();
        assert_eq!(doc.children.len(), 3);
        assert_eq!(renderer().render("a<b/>c", true).unwrap(), "ac");
    }

    #[test]
    fn crlf_is_normalized() {
        assert_eq!(renderer().render("a\r\nb", false).unwrap(), "a\nb");
    }

    // ── Materialize ─────────────────────────────────────────────────

    #[test]
    fn theme_tags_render_their_style() {
        assert_eq!(renderer().render("<info>hi</info>", true).unwrap(), "\x1b[33mhi\x1b[39m");
        assert_eq!(
            renderer().render("<error>bad</error>", true).unwrap(),
            "\x1b[37;41mbad\x1b[39;49m"
        );
    }

    #[test]
    fn undecorated_render_is_plain() {
        assert_eq!(renderer().render("<info>hi</info> <b>there</b>", false).unwrap(), "hi there");
    }

    #[test]
    fn child_inherits_and_overrides() {
        let out = renderer()
            .render(r#"<text color="red" bold>a<text bold="0" background="green">b</text></text>"#, true)
            .unwrap();
        assert_eq!(out, "\x1b[1;31ma\x1b[22;39m\x1b[31;42mb\x1b[39;49m");
    }

    #[test]
    fn attributes_override_tag_defaults() {
        let out = renderer().render(r#"<info color="blue" bold>x</info>"#, true).unwrap();
        assert_eq!(out, "\x1b[1;34mx\x1b[22;39m");
    }

    #[test]
    fn theme_newlines_are_dropped() {
        let theme = Theme::default().with("para", Style::new().newlines(2));
        let out = Renderer::new(theme).render("<para>x</para>", false).unwrap();
        assert_eq!(out, "x");
    }

    #[test]
    fn custom_theme_tag() {
        let theme = Theme::default().with("title", Style::new().underline().fg(Color8::Cyan));
        let out = Renderer::new(theme).render("<title>T</title>", true).unwrap();
        assert_eq!(out, "\x1b[4;36mT\x1b[24;39m");
    }

    // ── Stream ──────────────────────────────────────────────────────

    #[test]
    fn stream_matches_materialize() {
        let r = renderer();
        let doc = parse("x<comment>y</comment>z").unwrap();
        let mut buf = Vec::new();
        r.write_tree(&doc, true, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), r.render_tree(&doc, true));
    }

    // ── Callback ────────────────────────────────────────────────────

    #[test]
    fn callback_receives_raw_text_and_style() {
        let got = runs("a<info>b</info>");
        assert_eq!(
            got,
            vec![
                ("a".into(), Style::new(), false),
                ("b".into(), Style::new().fg(Color8::Yellow), false),
            ]
        );
    }

    #[test]
    fn callback_splits_multiline_runs() {
        let got = runs("<b>one\ntwo\n</b>three");
        let bold = Style::new().bold();
        assert_eq!(
            got,
            vec![
                ("one".into(), bold, true),
                ("two".into(), bold, true),
                ("three".into(), Style::new(), false),
            ]
        );
    }

    #[test]
    fn callback_keeps_blank_lines() {
        let got: Vec<_> = runs("a\n\nb").into_iter().map(|(t, _, e)| (t, e)).collect();
        assert_eq!(
            got,
            vec![("a".into(), true), (String::new(), true), ("b".into(), false)]
        );
    }

    // ── Helpers ─────────────────────────────────────────────────────

    #[test]
    fn strip_tags_removes_everything_bracketed() {
        assert_eq!(strip_tags("<info>a</info> <x y=\"1\">b</>"), "a b");
        assert_eq!(strip_tags("&lt;kept&gt;"), "&lt;kept&gt;");
    }

    #[test]
    fn escape_then_render_is_literal() {
        let text = "<b> & </b>";
        assert_eq!(renderer().render(&escape(text), true).unwrap(), text);
    }

    #[test]
    fn plain_text_of_tree() {
        let doc = parse("<info>a &amp; b</info>\n<b>c</b>").unwrap();
        assert_eq!(renderer().plain_tree(&doc), "a & b\nc");
    }
}
