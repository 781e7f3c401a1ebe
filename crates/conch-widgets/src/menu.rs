//! Radio and checkbox menus.
//!
//! ```text
//! Pick a color
//! switch: ↑ ↓   submit: Enter
//! --------------------------------------------------------------------------
//!  ○ red
//!  ● green          ← highlighted row
//!  ○ blue
//! ```
//!
//! The menu runs a [`Keyboard`] session on the terminal it is given:
//! Up / `8` and Down / `2` move the highlight (wrapping around), Space
//! toggles a checkbox, Enter submits. A radio menu's selection follows the
//! highlight. The list is redrawn in place after every key.
//!
//! When input is not interactive, or stdout is not decorated so nothing
//! could be redrawn, the list is printed once and the defaults are returned.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use conch_style::{Color8, Style};
use conch_term::width::{self, Align};
use conch_term::{Key, Keyboard, KeyboardConfig, Listener, Output, Screen, TerminalControl};
use tracing::debug;

use crate::error::WidgetError;
use crate::rich_text::RichText;

/// Unchecked and checked marker for one menu kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub unchecked: String,
    pub checked: String,
}

impl Markers {
    pub fn new(unchecked: impl Into<String>, checked: impl Into<String>) -> Self {
        Self {
            unchecked: unchecked.into(),
            checked: checked.into(),
        }
    }
}

/// Interactive option picker.
#[derive(Debug, Clone)]
pub struct Menu {
    rich: RichText,
    radio: Markers,
    checkbox: Markers,
    style: Style,
    highlight: Style,
    fullwidth: bool,
    help: bool,
    keyboard: KeyboardConfig,
    title: Option<String>,
    list: Option<String>,
}

impl Menu {
    #[must_use]
    pub fn new(output: Output) -> Self {
        Self::with_rich_text(RichText::new(output))
    }

    #[must_use]
    pub fn with_rich_text(rich: RichText) -> Self {
        Self {
            rich,
            radio: Markers::new(" ○ ", " ● "),
            checkbox: Markers::new("[ ] ", "[✔] "),
            style: Style::new(),
            highlight: Style::new().fg(Color8::White).bg(Color8::Black),
            fullwidth: false,
            help: true,
            keyboard: KeyboardConfig::default(),
            title: None,
            list: None,
        }
    }

    // ── Settings ────────────────────────────────────────────────────

    pub fn set_radio_markers(&mut self, markers: Markers) -> &mut Self {
        self.radio = markers;
        self
    }

    pub fn set_checkbox_markers(&mut self, markers: Markers) -> &mut Self {
        self.checkbox = markers;
        self
    }

    /// Style for ordinary rows and for the highlighted row.
    pub const fn set_styles(&mut self, style: Style, highlight: Style) -> &mut Self {
        self.style = style;
        self.highlight = highlight;
        self
    }

    /// Wrap long options and pad every row to the terminal width. The width
    /// is sampled once per menu.
    pub const fn set_fullwidth(&mut self, fullwidth: bool) -> &mut Self {
        self.fullwidth = fullwidth;
        self
    }

    /// Show the key help line and divider above the options.
    pub const fn set_help(&mut self, help: bool) -> &mut Self {
        self.help = help;
        self
    }

    pub const fn keyboard_config_mut(&mut self) -> &mut KeyboardConfig {
        &mut self.keyboard
    }

    // ── Menus ───────────────────────────────────────────────────────

    /// Single choice. Returns the index of the selected option. An invalid
    /// `default` falls back to the first option.
    ///
    /// # Errors
    ///
    /// [`WidgetError::EmptyOptions`] for no options, [`WidgetError::Keyboard`]
    /// if the keyboard session fails, [`WidgetError::Io`] if stdout fails.
    pub fn radio<T, S>(
        &mut self,
        terminal: T,
        question: Option<&str>,
        options: &[S],
        default: Option<usize>,
    ) -> Result<usize, WidgetError>
    where
        T: TerminalControl,
        S: AsRef<str>,
    {
        let default = default.filter(|&d| d < options.len()).unwrap_or(0);
        let picked = self.run(terminal, question, options, &[default], true)?;
        Ok(picked.first().copied().unwrap_or(default))
    }

    /// Multiple choice. Returns the selected indices in option order.
    /// Invalid defaults are ignored; the highlight starts on the first valid
    /// one.
    ///
    /// # Errors
    ///
    /// See [`radio`](Self::radio).
    pub fn choice<T, S>(
        &mut self,
        terminal: T,
        question: Option<&str>,
        options: &[S],
        defaults: &[usize],
    ) -> Result<Vec<usize>, WidgetError>
    where
        T: TerminalControl,
        S: AsRef<str>,
    {
        self.run(terminal, question, options, defaults, false)
    }

    /// Erase the last menu list, and its question and help with
    /// `include_title`. `adaptive` re-reads the terminal width first.
    ///
    /// # Errors
    ///
    /// Propagates stdout's I/O error.
    pub fn clear(&mut self, include_title: bool, adaptive: bool) -> io::Result<()> {
        let mut plain = String::new();
        if include_title {
            plain.extend(self.title.take());
        }
        plain.extend(self.list.take());
        if plain.is_empty() {
            return Ok(());
        }
        let columns = usize::from(self.rich.output().terminal_size(adaptive).cols);
        self.rich.screen().revert(width::section_lines(&plain, columns))
    }

    fn run<T, S>(
        &mut self,
        terminal: T,
        question: Option<&str>,
        options: &[S],
        selected: &[usize],
        radio: bool,
    ) -> Result<Vec<usize>, WidgetError>
    where
        T: TerminalControl,
        S: AsRef<str>,
    {
        if options.is_empty() {
            return Err(WidgetError::EmptyOptions);
        }
        self.write_title(question, radio)?;

        let list = Rc::new(RefCell::new(self.list_view(options, selected, radio)));
        let output = self.rich.output().clone();

        if terminal.is_interactive() && output.is_stdout_decorated() {
            let mut keyboard = Keyboard::with_config(terminal, self.keyboard.clone());
            keyboard.attach_output(output);
            bind(&mut keyboard, &list);
            keyboard.listen()?;
        } else {
            debug!("menu input is not interactive, using defaults");
            list.borrow_mut().draw()?;
        }

        let list = list.borrow();
        self.list = Some(list.plain.clone());
        Ok(list.selection())
    }

    /// Question, help line, and divider. Remembered for [`clear`](Self::clear).
    fn write_title(&mut self, question: Option<&str>, radio: bool) -> Result<(), WidgetError> {
        let mut plain = String::new();
        if let Some(question) = question {
            let mut question = question.to_owned();
            if !question.ends_with('\n') {
                question.push('\n');
            }
            plain.push_str(&self.rich.plain(&question)?);
            self.rich.write(&question, false)?;
        }

        if self.help {
            let output = self.rich.output();
            let decorate = output.is_stdout_decorated();
            let label = Style::new().fg(Color8::Black).bright(true);
            let key = Style::new().fg(Color8::Green);

            let mut entries = vec![("switch", "↑ ↓")];
            if !radio {
                entries.push(("  check/uncheck", "Space"));
            }
            entries.push(("  submit", "Enter"));

            let mut out = String::new();
            for (info, name) in entries {
                out.push_str(&label.render(&format!("{info}:"), decorate));
                out.push_str(&key.render(&format!(" {name} "), decorate));
                plain.push_str(&format!("{info}: {name} "));
            }
            let columns = usize::from(output.terminal_size(false).cols);
            let divider = format!("\n{}\n", "-".repeat(columns));
            out.push_str(&label.render(&divider, decorate));
            plain.push_str(&divider);
            output.stdout(&out)?;
        }

        self.title = Some(plain);
        Ok(())
    }

    fn list_view<S: AsRef<str>>(&self, options: &[S], selected: &[usize], radio: bool) -> ListView {
        let markers = if radio { &self.radio } else { &self.checkbox };
        let output = self.rich.output().clone();

        let mut checked = vec![false; options.len()];
        let mut cursor = None;
        for &index in selected.iter().filter(|&&i| i < options.len()) {
            checked[index] = true;
            cursor.get_or_insert(index);
        }

        let fullwidth = self.fullwidth.then(|| Fullwidth {
            marker: width::line_width(&markers.unchecked),
            checked: width::line_width(&markers.checked),
            max: usize::from(output.terminal_size(false).cols).saturating_sub(1),
        });

        ListView {
            screen: self.rich.screen().clone(),
            output,
            options: options.iter().map(|o| o.as_ref().to_owned()).collect(),
            radio,
            markers: markers.clone(),
            style: self.style,
            highlight: self.highlight,
            fullwidth,
            cursor: cursor.unwrap_or(0),
            checked,
            drawn_rows: None,
            plain: String::new(),
        }
    }
}

/// Wire the menu keys to `list`.
fn bind<T: TerminalControl>(keyboard: &mut Keyboard<T>, list: &Rc<RefCell<ListView>>) {
    let view = Rc::clone(list);
    keyboard.on_start(move |_| {
        view.borrow_mut().draw()?;
        Ok(())
    });

    let view = Rc::clone(list);
    let up = Listener::new(move |_, _| {
        let mut view = view.borrow_mut();
        view.step(false);
        view.draw()?;
        Ok(())
    });
    keyboard.on_hotkey([Key::Up, Key::from('8')], &up);

    let view = Rc::clone(list);
    let down = Listener::new(move |_, _| {
        let mut view = view.borrow_mut();
        view.step(true);
        view.draw()?;
        Ok(())
    });
    keyboard.on_hotkey([Key::Down, Key::from('2')], &down);

    let view = Rc::clone(list);
    let toggle = Listener::new(move |_, _| {
        let mut view = view.borrow_mut();
        if !view.radio {
            view.toggle();
            view.draw()?;
        }
        Ok(())
    });
    keyboard.on_hotkey([Key::Space], &toggle);

    let submit = Listener::new(|_, control| {
        control.stop();
        Ok(())
    });
    keyboard.on_hotkey([Key::Enter], &submit);
}

// ---------------------------------------------------------------------------
// List view
// ---------------------------------------------------------------------------

/// Cached widths for fullwidth mode.
#[derive(Debug, Clone, Copy)]
struct Fullwidth {
    marker: usize,
    checked: usize,
    max: usize,
}

/// The option rows of one running menu.
#[derive(Debug)]
struct ListView {
    screen: Screen,
    output: Output,
    options: Vec<String>,
    radio: bool,
    markers: Markers,
    style: Style,
    highlight: Style,
    fullwidth: Option<Fullwidth>,
    cursor: usize,
    checked: Vec<bool>,
    drawn_rows: Option<usize>,
    plain: String,
}

impl ListView {
    /// Move the highlight one row, wrapping at both ends.
    fn step(&mut self, down: bool) {
        let len = self.options.len();
        self.cursor = if down {
            (self.cursor + 1) % len
        } else {
            (self.cursor + len - 1) % len
        };
        if self.radio {
            self.checked.fill(false);
            self.checked[self.cursor] = true;
        }
    }

    fn toggle(&mut self) {
        if let Some(checked) = self.checked.get_mut(self.cursor) {
            *checked = !*checked;
        }
    }

    fn selection(&self) -> Vec<usize> {
        self.checked
            .iter()
            .enumerate()
            .filter_map(|(i, &c)| c.then_some(i))
            .collect()
    }

    /// Revert the previous rows, then print every option.
    fn draw(&mut self) -> Result<(), WidgetError> {
        if let Some(rows) = self.drawn_rows {
            self.screen.revert(rows)?;
        }
        let decorate = self.output.is_stdout_decorated();
        let mut out = String::new();
        let mut plain = String::new();
        let mut rows = 0;

        for (i, value) in self.options.iter().enumerate() {
            let checked = self.checked[i];
            let marker = if checked { &self.markers.checked } else { &self.markers.unchecked };
            let item = match self.fullwidth {
                Some(fw) => {
                    let marker_width = if checked { fw.checked } else { fw.marker };
                    let lines =
                        width::wrap(value, fw.max.saturating_sub(marker_width), Some(' '), Align::Left)?;
                    rows += lines.len();
                    let indent = " ".repeat(marker_width);
                    lines
                        .iter()
                        .enumerate()
                        .map(|(n, line)| {
                            let prefix = if n == 0 { marker } else { &indent };
                            format!("{prefix}{line} ")
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                }
                None => format!("{marker}{value} "),
            };
            let style = if i == self.cursor { self.highlight } else { self.style };
            out.push_str(&style.render(&item, decorate));
            out.push('\n');
            plain.push_str(&item);
            plain.push('\n');
        }
        self.output.stdout(&out)?;

        let columns = usize::from(self.output.terminal_size(false).cols);
        self.drawn_rows = Some(if self.fullwidth.is_some() {
            rows + 1
        } else {
            width::section_lines(&plain, columns)
        });
        self.plain = plain;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
