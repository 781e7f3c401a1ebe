//! Progress bars.
//!
//! ```text
//! Copying
//! 42/100 [=========================>-----------------------------------] 42%
//! ```
//!
//! A progress block is an [`Overwrite`](crate::Overwrite)-style template with
//! a fixed set of variables:
//!
//! | variable      | value                                            |
//! |---------------|--------------------------------------------------|
//! | `title`       | the title, absent when unset or empty            |
//! | `current`     | work done                                        |
//! | `total`       | total work                                       |
//! | `left`        | `total - current`                                |
//! | `percent`     | `floor(100 * current / total)` followed by `%`   |
//! | `bar`         | the bar itself (only the first `%bar%` is drawn) |
//! | `estimated`   | time since the first draw                        |
//! | `remaining`   | projected time to completion                     |
//! | `memory`      | resident memory of this process, e.g. `12.4M`    |
//!
//! The bar fills whatever the terminal width leaves on its line, up to 100
//! columns. It is made of three parts, each a [`BarChar`]: done (`=`),
//! progress (`>`), and empty (`-`).

use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Instant;

use conch_style::{Style, Template, escape};
use conch_term::width::line_width;
use conch_term::{Output, Snapshot, WidthMode, resident_memory};
use regex::Regex;

use crate::error::WidgetError;
use crate::format::{format_duration, format_memory};
use crate::rich_text::RichText;

/// Widest bar ever drawn.
const MAX_BAR_WIDTH: usize = 100;

/// Stand-in for the bar while the rest of its line is measured.
const BAR: &str = "%bar%";

/// Tags on one line, including a tag cut off at either end of the line.
static LINE_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>|^[^>]*>|<[^>]*$").expect("valid line tag pattern"));

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// Built-in progress layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// `Progress: 3/10 (30%)`
    Mini,
    /// `3/10 [=====>-----] 30%`
    #[default]
    Normal,
    /// Normal plus elapsed time.
    Verbose,
    /// Verbose plus process memory.
    Debug,
}

impl Format {
    pub const ALL: [Self; 4] = [Self::Mini, Self::Normal, Self::Verbose, Self::Debug];

    /// The template source for this layout.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::Mini => "%{title}\n%Progress: %current%/%total% (%percent%)\n",
            Self::Normal => "%{title}\n%%current%/%total% [%bar%] %percent%\n",
            Self::Verbose => "%{title}\n%%current%/%total% [%bar%] %percent% %estimated%\n",
            Self::Debug => {
                "%{title}\n%%current%/%total% [%bar%] %percent% %estimated% %memory%\n"
            }
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mini => "mini",
            Self::Normal => "normal",
            Self::Verbose => "verbose",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WidgetError::UnknownFormat(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Bar characters
// ---------------------------------------------------------------------------

/// One repeated part of the bar: its text, how wide that text is, and an
/// optional style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarChar {
    text: String,
    width: usize,
    style: Option<Style>,
}

impl BarChar {
    /// Unstyled part. Text with no width counts as one column.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let width = line_width(&text).max(1);
        Self {
            text,
            width,
            style: None,
        }
    }

    #[must_use]
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            style: Some(style),
            ..Self::new(text)
        }
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// As many copies as fit in `columns`, as markup.
    fn fill(&self, columns: usize) -> String {
        if columns < self.width {
            return String::new();
        }
        self.markup(&self.text.repeat(columns / self.width))
    }

    fn markup(&self, text: &str) -> String {
        let text = escape(text);
        match &self.style {
            Some(style) => format!("<text{}>{text}</text>", style_attrs(style)),
            None => text,
        }
    }
}

/// Markup attributes reproducing `style`, each with a leading space.
fn style_attrs(style: &Style) -> String {
    let mut attrs = String::new();
    if let Some(color) = style.color {
        let _ = write!(attrs, r#" color="{color}""#);
    }
    if let Some(color) = style.background {
        let _ = write!(attrs, r#" background="{color}""#);
    }
    if let Some(bright) = style.bright {
        let _ = write!(attrs, " bright={}", u8::from(bright));
    }
    if let Some(bright) = style.bg_bright {
        let _ = write!(attrs, " bgBright={}", u8::from(bright));
    }
    for (name, _) in style.on.iter_names() {
        let _ = write!(attrs, " {}", name.to_ascii_lowercase());
    }
    for (name, _) in style.off.iter_names() {
        let _ = write!(attrs, " {}=0", name.to_ascii_lowercase());
    }
    attrs
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// A redrawing progress block.
#[derive(Debug, Clone)]
pub struct Progress {
    rich: RichText,
    done: BarChar,
    empty: BarChar,
    progress: BarChar,
    title: Option<String>,
    total: u64,
    current: u64,
    started: Option<Instant>,
    format: Option<(String, Template)>,
    last: Snapshot,
}

impl Progress {
    #[must_use]
    pub fn new(output: Output) -> Self {
        Self::with_rich_text(RichText::new(output))
    }

    #[must_use]
    pub fn with_rich_text(rich: RichText) -> Self {
        Self {
            rich,
            done: BarChar::new("="),
            empty: BarChar::new("-"),
            progress: BarChar::new(">"),
            title: None,
            total: 100,
            current: 0,
            started: None,
            format: None,
            last: Snapshot::new(WidthMode::Fixed),
        }
    }

    // ── Settings ────────────────────────────────────────────────────

    pub fn set_done_char(&mut self, part: BarChar) -> &mut Self {
        self.done = part;
        self
    }

    pub fn set_empty_char(&mut self, part: BarChar) -> &mut Self {
        self.empty = part;
        self
    }

    pub fn set_progress_char(&mut self, part: BarChar) -> &mut Self {
        self.progress = part;
        self
    }

    /// `Adaptive` re-reads the terminal width on every draw.
    pub const fn set_width_mode(&mut self, mode: WidthMode) -> &mut Self {
        self.last.set_mode(mode);
        self
    }

    /// Total work. Must be at least 1.
    ///
    /// # Errors
    ///
    /// [`WidgetError::InvalidTotal`] for zero.
    pub fn set_total(&mut self, total: u64) -> Result<&mut Self, WidgetError> {
        if total == 0 {
            return Err(WidgetError::InvalidTotal);
        }
        self.total = total;
        Ok(self)
    }

    /// Change the title. A running bar is redrawn right away.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn set_title(&mut self, title: Option<&str>) -> Result<(), WidgetError> {
        if self.title.as_deref() == title {
            return Ok(());
        }
        self.title = title.map(str::to_owned);
        if self.started.is_some() {
            self.draw(self.current)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub const fn current(&self) -> u64 {
        self.current
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Start with a built-in layout and draw at zero.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn start(&mut self, format: Format) -> Result<String, WidgetError> {
        self.start_with(format.template())
    }

    /// Start with a custom template (markup allowed) and draw at zero. The
    /// template always ends with a line break.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn start_with(&mut self, format: &str) -> Result<String, WidgetError> {
        let cached = matches!(&self.format, Some((source, _)) if source == format);
        if !cached {
            let mut template = Template::parse(format);
            template.ensure_trailing_newline();
            self.format = Some((format.to_owned(), template));
        }
        self.started = None;
        self.last.clear();
        self.draw(0)
    }

    /// Redraw at `current`. Starts with [`Format::Normal`] first if needed.
    /// Returns the markup that was written.
    ///
    /// # Errors
    ///
    /// [`WidgetError::Style`] if the rendered markup is invalid,
    /// [`WidgetError::Io`] if stdout fails.
    pub fn update(&mut self, current: u64) -> Result<String, WidgetError> {
        if self.format.is_none() {
            self.start(Format::default())?;
        }
        self.draw(current)
    }

    /// Draw at 100% and end the run. `reset` also restores the default
    /// total, title, and bar parts; `clear` erases the final block.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn finish(&mut self, reset: bool, clear: bool) -> Result<String, WidgetError> {
        let message = self.update(self.total)?;
        self.current = 0;
        self.started = None;
        self.format = None;
        if reset {
            self.total = 100;
            self.title = None;
            self.done = BarChar::new("=");
            self.empty = BarChar::new("-");
            self.progress = BarChar::new(">");
        }
        if clear {
            self.last.revert(self.rich.screen())?;
        } else {
            self.last.clear();
        }
        Ok(message)
    }

    // ── Drawing ─────────────────────────────────────────────────────

    fn draw(&mut self, current: u64) -> Result<String, WidgetError> {
        self.current = current;
        let (_, template) = self.format.as_ref().ok_or(WidgetError::NotStarted("progress"))?;

        let mut has_bar = false;
        let mut message = template.render(|name| {
            if name == "bar" {
                if has_bar {
                    return None;
                }
                has_bar = true;
                return Some(BAR.to_owned());
            }
            self.value(name)
        });

        if has_bar {
            let adaptive = self.last.mode() == WidthMode::Adaptive;
            let columns = usize::from(self.rich.output().terminal_size(adaptive).cols);
            let line = message.split('\n').find(|l| l.contains(BAR)).unwrap_or_default();
            let used = line_width(&LINE_TAGS.replace_all(line, ""));
            let bar = self.bar((columns + 3).saturating_sub(used));
            message = message.replacen(BAR, &bar, 1);
        }

        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        let plain = self.rich.plain(&message)?;
        self.last.revert(self.rich.screen())?;
        self.rich.write(&message, false)?;
        self.last.record(&plain);
        Ok(message)
    }

    fn value(&self, name: &str) -> Option<String> {
        let left = self.total.saturating_sub(self.current);
        match name {
            "title" => self.title.clone().filter(|t| !t.is_empty()),
            "total" => Some(self.total.to_string()),
            "current" => Some(self.current.to_string()),
            "left" => Some(left.to_string()),
            "percent" => Some(format!(
                "{}%",
                u128::from(self.current) * 100 / u128::from(self.total)
            )),
            "estimated" => self
                .started
                .map(|t| format_duration(t.elapsed().as_secs())),
            "remaining" => {
                let elapsed = self.started?.elapsed().as_secs();
                if self.current == 0 {
                    return None;
                }
                let secs = if left == 0 {
                    0
                } else {
                    let current = u128::from(self.current);
                    let secs = (u128::from(elapsed) * u128::from(left) + current / 2) / current;
                    u64::try_from(secs).unwrap_or(u64::MAX)
                };
                Some(format_duration(secs))
            }
            "memory" => resident_memory().map(format_memory),
            _ => None,
        }
    }

    /// The bar, `width` columns wide at most.
    fn bar(&self, width: usize) -> String {
        let width = width.min(MAX_BAR_WIDTH);
        if self.current >= self.total {
            return self.done.fill(width);
        }
        if width < self.progress.width {
            return String::new();
        }
        let head = self.progress.markup(&self.progress.text);
        if width < self.progress.width + self.empty.width {
            return head;
        }
        let columns = u128::from(u64::try_from(width).unwrap_or(u64::MAX));
        let empty = columns * u128::from(self.total - self.current) / u128::from(self.total);
        let empty = usize::try_from(empty).unwrap_or(width);
        let done = width.saturating_sub(empty + self.progress.width);
        format!("{}{head}{}", self.done.fill(done), self.empty.fill(empty))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
