//! A status block that rewrites itself in place.
//!
//! ```text
//! start("<info>%file%</info>%: {status}%")
//! set("file", "a.txt")   → a.txt
//! set("status", "done")  → a.txt: done        (previous block reverted)
//! ```
//!
//! The format is a [`Template`] that may contain markup. It always ends with
//! a line break, so the cursor sits at the start of the row after the block
//! and the next redraw can revert exactly the rows the block used.

use std::collections::HashMap;
use std::io;

use conch_style::Template;
use conch_term::{Output, Snapshot, WidthMode};

use crate::error::WidgetError;
use crate::rich_text::RichText;

/// Template-driven block redrawn on every data update.
#[derive(Debug, Clone)]
pub struct Overwrite {
    rich: RichText,
    source: Option<String>,
    template: Option<Template>,
    data: HashMap<String, String>,
    last: Snapshot,
}

impl Overwrite {
    #[must_use]
    pub fn new(output: Output) -> Self {
        Self::with_rich_text(RichText::new(output))
    }

    /// Write through an existing [`RichText`], sharing its theme.
    #[must_use]
    pub fn with_rich_text(rich: RichText) -> Self {
        Self {
            rich,
            source: None,
            template: None,
            data: HashMap::new(),
            last: Snapshot::new(WidthMode::Fixed),
        }
    }

    #[must_use]
    pub const fn rich_text(&self) -> &RichText {
        &self.rich
    }

    /// How the previous block's rows are counted when redrawing.
    pub const fn set_width_mode(&mut self, mode: WidthMode) {
        self.last.set_mode(mode);
    }

    /// Current data values.
    #[must_use]
    pub const fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    /// Use `format` from now on, with empty data. Nothing is drawn until the
    /// first update, and the block drawn before this call is left on screen.
    pub fn start(&mut self, format: &str) -> &mut Self {
        if self.source.as_deref() != Some(format) {
            let mut template = Template::parse(format);
            template.ensure_trailing_newline();
            self.template = Some(template);
            self.source = Some(format.to_owned());
        }
        self.data.clear();
        self.last.clear();
        self
    }

    /// [`start`](Self::start), then draw with `data`.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn start_with<K, V>(
        &mut self,
        format: &str,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<String, WidgetError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.start(format).update(data)
    }

    /// Merge `data` into the current values and redraw. Returns the markup
    /// that was written.
    ///
    /// # Errors
    ///
    /// [`WidgetError::NotStarted`] before [`start`](Self::start),
    /// [`WidgetError::Style`] if the rendered markup is invalid (the screen is
    /// left untouched), [`WidgetError::Io`] if stdout fails.
    pub fn update<K, V>(&mut self, data: impl IntoIterator<Item = (K, V)>) -> Result<String, WidgetError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.ensure_started()?;
        self.data
            .extend(data.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.redraw()
    }

    /// Set one value and redraw.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<String, WidgetError> {
        self.update([(key.into(), value.into())])
    }

    /// Drop one value and redraw. Its placeholder disappears with its prefix
    /// and suffix.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn remove(&mut self, key: &str) -> Result<String, WidgetError> {
        self.ensure_started()?;
        self.data.remove(key);
        self.redraw()
    }

    /// Redraw with values from `lookup`, asked once per placeholder. Values
    /// it returns are stored for later updates; `None` leaves that
    /// placeholder empty this time, whatever was stored before.
    ///
    /// # Errors
    ///
    /// See [`update`](Self::update).
    pub fn update_with(&mut self, mut lookup: impl FnMut(&str) -> Option<String>) -> Result<String, WidgetError> {
        let template = self.template.as_ref().ok_or(WidgetError::NotStarted("overwrite"))?;
        let data = &mut self.data;
        let message = template.render(|name| {
            let value = lookup(name)?;
            data.insert(name.to_owned(), value.clone());
            Some(value)
        });
        self.draw(message)
    }

    /// Erase the last drawn block. A no-op when there is none.
    ///
    /// # Errors
    ///
    /// Propagates stdout's I/O error.
    pub fn clear(&mut self) -> io::Result<()> {
        self.last.revert(self.rich.screen())
    }

    fn ensure_started(&self) -> Result<(), WidgetError> {
        if self.template.is_none() {
            return Err(WidgetError::NotStarted("overwrite"));
        }
        Ok(())
    }

    fn redraw(&mut self) -> Result<String, WidgetError> {
        let message = self
            .template
            .as_ref()
            .ok_or(WidgetError::NotStarted("overwrite"))?
            .render_map(&self.data);
        self.draw(message)
    }

    fn draw(&mut self, message: String) -> Result<String, WidgetError> {
        let plain = self.rich.plain(&message)?;
        self.clear()?;
        self.rich.write(&message, false)?;
        self.last.record(&plain);
        Ok(message)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
