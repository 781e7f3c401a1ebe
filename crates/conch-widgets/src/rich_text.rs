//! Markup output bound to a terminal.
//!
//! [`RichText`] pairs a [`Renderer`] with an [`Output`]. Markup is decorated
//! only when stdout is, so piping a program's output yields plain text with
//! the tags removed.
//!
//! A block written as clearable is remembered, and [`RichText::clear`]
//! erases it from the screen again.

use std::io;

use conch_style::{Renderer, Run, Style, Theme, parse};
use conch_term::{Output, Screen, Snapshot, Target, WidthMode};

use crate::error::WidgetError;

/// Styled text writer with a memory of its last clearable block.
#[derive(Debug, Clone)]
pub struct RichText {
    output: Output,
    screen: Screen,
    renderer: Renderer,
    last: Snapshot,
}

impl RichText {
    /// Writer using the built-in theme.
    #[must_use]
    pub fn new(output: Output) -> Self {
        Self::with_theme(output, Theme::default())
    }

    #[must_use]
    pub fn with_theme(output: Output, theme: Theme) -> Self {
        Self {
            screen: Screen::new(output.clone()),
            output,
            renderer: Renderer::new(theme),
            last: Snapshot::new(WidthMode::Fixed),
        }
    }

    #[must_use]
    pub const fn output(&self) -> &Output {
        &self.output
    }

    #[must_use]
    pub const fn screen(&self) -> &Screen {
        &self.screen
    }

    #[must_use]
    pub const fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.renderer.set_theme(theme);
    }

    /// Add or replace one tag in the current theme.
    pub fn add_tag(&mut self, tag: impl Into<String>, style: Style) {
        let theme = self.renderer.theme().clone().with(tag, style);
        self.renderer.set_theme(theme);
    }

    /// How [`clear`](Self::clear) samples the terminal width.
    pub const fn set_width_mode(&mut self, mode: WidthMode) {
        self.last.set_mode(mode);
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// Render `markup` to a string, decorated when stdout is.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Style`] for an unknown color attribute.
    pub fn render(&self, markup: &str) -> Result<String, WidgetError> {
        let decorate = self.output.is_stdout_decorated();
        Ok(self.renderer.render(markup, decorate)?)
    }

    /// The text of `markup` with tags removed and entities decoded.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Style`] for an unknown color attribute.
    pub fn plain(&self, markup: &str) -> Result<String, WidgetError> {
        let doc = parse(markup)?;
        Ok(self.renderer.plain_tree(&doc))
    }

    /// Hand each styled run of `markup` to `f` instead of rendering it.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Style`] for an unknown color attribute.
    pub fn visit(&self, markup: &str, f: impl FnMut(Run<'_>)) -> Result<(), WidgetError> {
        Ok(self.renderer.visit(markup, f)?)
    }

    // ── Writing ─────────────────────────────────────────────────────

    /// Stream `markup` to stdout. With `clearable`, remember it for
    /// [`clear`](Self::clear); otherwise the previous clearable block stays
    /// remembered.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Style`] for an unknown color attribute (nothing is
    /// written), [`WidgetError::Io`] if stdout fails.
    pub fn write(&mut self, markup: &str, clearable: bool) -> Result<(), WidgetError> {
        let doc = parse(markup)?;
        let decorate = self.output.is_stdout_decorated();
        self.renderer
            .write_tree(&doc, decorate, &mut self.output.writer(Target::Stdout))?;
        if clearable {
            self.last.record(&self.renderer.plain_tree(&doc));
        }
        Ok(())
    }

    /// Erase the last clearable block. A no-op when there is none.
    ///
    /// # Errors
    ///
    /// Propagates stdout's I/O error.
    pub fn clear(&mut self) -> io::Result<()> {
        self.last.revert(&self.screen)
    }

    // ── Theme Shortcuts ─────────────────────────────────────────────

    /// Write literal `text` in the theme style for `tag`, then `newlines`
    /// line breaks.
    ///
    /// # Errors
    ///
    /// Propagates stdout's I/O error.
    pub fn styled(&self, tag: &str, text: &str, newlines: usize) -> io::Result<()> {
        let style = self.renderer.theme().get(tag).without_newlines();
        let mut out = style.render(text, self.output.is_stdout_decorated());
        out.extend(std::iter::repeat_n('\n', newlines));
        self.output.stdout(&out)
    }

    /// Plain `text` followed by `newlines` line breaks.
    ///
    /// # Errors
    ///
    /// Propagates stdout's I/O error. Same for the shortcuts below.
    pub fn line(&self, text: &str, newlines: usize) -> io::Result<()> {
        self.styled("text", text, newlines)
    }

    pub fn info(&self, text: &str, newlines: usize) -> io::Result<()> {
        self.styled("info", text, newlines)
    }

    pub fn comment(&self, text: &str, newlines: usize) -> io::Result<()> {
        self.styled("comment", text, newlines)
    }

    pub fn notice(&self, text: &str, newlines: usize) -> io::Result<()> {
        self.styled("notice", text, newlines)
    }

    pub fn warn(&self, text: &str, newlines: usize) -> io::Result<()> {
        self.styled("warn", text, newlines)
    }

    pub fn error(&self, text: &str, newlines: usize) -> io::Result<()> {
        self.styled("error", text, newlines)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use conch_style::Color8;
    use conch_term::{Capture, Size};
    use pretty_assertions::assert_eq;

    fn rich(decorated: bool) -> (RichText, Capture) {
        let (output, capture) = Output::memory(decorated);
        (RichText::new(output), capture)
    }

    // ── Rendering ───────────────────────────────────────────────────

    #[test]
    fn render_follows_stdout_decoration() {
        let (on, _) = rich(true);
        let (off, _) = rich(false);
        assert_eq!(on.render("<info>hi</info>").unwrap(), "\x1b[33mhi\x1b[39m");
        assert_eq!(off.render("<info>hi</info>").unwrap(), "hi");
    }

    #[test]
    fn forced_colorful_overrides_detection() {
        let (r, _) = rich(false);
        r.output().set_colorful(Some(true));
        assert_eq!(r.render("<b>x</b>").unwrap(), "\x1b[1mx\x1b[22m");
    }

    #[test]
    fn added_tag_is_used() {
        let (mut r, _) = rich(true);
        r.add_tag("title", Style::new().fg(Color8::Cyan));
        assert_eq!(r.render("<title>T</title>").unwrap(), "\x1b[36mT\x1b[39m");
        assert!(r.renderer().theme().contains("info"));
    }

    #[test]
    fn plain_decodes_entities() {
        let (r, _) = rich(true);
        assert_eq!(r.plain("<b>a &amp; b</b>").unwrap(), "a & b");
    }

    #[test]
    fn bad_color_is_an_error() {
        let (mut r, cap) = rich(true);
        assert!(matches!(
            r.write(r#"<text color="nope">x</text>"#, true),
            Err(WidgetError::Style(_))
        ));
        assert!(cap.stdout.is_empty());
    }

    // ── Writing ─────────────────────────────────────────────────────

    #[test]
    fn write_streams_to_stdout() {
        let (mut r, cap) = rich(true);
        r.write("a<comment>b</comment>", false).unwrap();
        assert_eq!(cap.stdout.contents(), "a\x1b[32mb\x1b[39m");
        assert!(cap.stderr.is_empty());
    }

    #[test]
    fn clear_reverts_last_clearable_block() {
        let (mut r, cap) = rich(true);
        r.write("one\ntwo\n", true).unwrap();
        let _ = cap.stdout.take();
        r.clear().unwrap();
        assert_eq!(cap.stdout.take(), "\x1b[0G\x1b[2A\x1b[0J");
        r.clear().unwrap();
        assert_eq!(cap.stdout.take(), "");
    }

    #[test]
    fn unclearable_write_keeps_previous_block() {
        let (mut r, cap) = rich(true);
        r.write("first\n", true).unwrap();
        r.write("second\n", false).unwrap();
        let _ = cap.stdout.take();
        r.clear().unwrap();
        assert_eq!(cap.stdout.take(), "\x1b[0G\x1b[1A\x1b[0J");
    }

    #[test]
    fn clear_counts_wrapped_rows() {
        let (mut r, cap) = rich(true);
        r.output().set_size(Size { cols: 4, rows: 10 });
        r.write("abcdefgh\n", true).unwrap();
        let _ = cap.stdout.take();
        r.clear().unwrap();
        // two rows of text plus the row the cursor sits on
        assert_eq!(cap.stdout.take(), "\x1b[0G\x1b[2A\x1b[0J");
    }

    #[test]
    fn undecorated_clear_writes_nothing() {
        let (mut r, cap) = rich(false);
        r.write("x\n", true).unwrap();
        let _ = cap.stdout.take();
        r.clear().unwrap();
        assert_eq!(cap.stdout.contents(), "");
    }

    // ── Shortcuts ───────────────────────────────────────────────────

    #[test]
    fn shortcuts_use_theme_styles() {
        let (r, cap) = rich(true);
        r.info("i", 0).unwrap();
        r.error("e", 1).unwrap();
        r.line("plain", 1).unwrap();
        assert_eq!(
            cap.stdout.contents(),
            "\x1b[33mi\x1b[39m\x1b[37;41me\x1b[39;49m\nplain\n"
        );
    }

    #[test]
    fn empty_line_still_breaks() {
        let (r, cap) = rich(true);
        r.line("", 2).unwrap();
        assert_eq!(cap.stdout.contents(), "\n\n");
    }

    #[test]
    fn quiet_output_drops_shortcuts() {
        let (r, cap) = rich(true);
        r.output().set_quiet(true);
        r.warn("w", 1).unwrap();
        assert!(cap.stdout.is_empty());
        assert!(r.output().is_stdout_empty());
    }
}
