// SPDX-License-Identifier: MIT
//
// Output streams: where rendered bytes go, and whether they may carry ANSI.
//
// An `Output` owns the stdout and stderr sinks for one program. It answers
// "is this stream decorated?" (so styles and cursor moves can be skipped on
// pipes), remembers whether anything has been written to each stream, honours
// a quiet switch that drops every write, and caches the terminal size.
//
// `Output` is a cheap cloneable handle. Widgets, the screen layer, and the
// keyboard loop all hold clones of the same handle and share one set of
// sinks. Everything here is single-threaded, matching the cooperative input
// loop that drives it.
//
// `Output::memory()` swaps both sinks for in-memory buffers so tests (and
// anything else that wants to capture a render) can inspect the exact bytes.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::terminal::{self, Size, Stream};

/// Which output stream a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Stdout,
    Stderr,
}

// ─── MemorySink ─────────────────────────────────────────────────────────────

/// A shared in-memory byte buffer that implements [`Write`].
///
/// Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Rc<RefCell<Vec<u8>>>);

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, decoded lossily as UTF-8.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    /// Return the contents and empty the buffer.
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.0.borrow_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The two sinks behind an [`Output::memory`] handle.
#[derive(Debug, Clone, Default)]
pub struct Capture {
    pub stdout: MemorySink,
    pub stderr: MemorySink,
}

// ─── Output ─────────────────────────────────────────────────────────────────

struct Sink {
    writer: Box<dyn Write>,
    color: bool,
    written: bool,
}

impl Sink {
    fn new(writer: impl Write + 'static, color: bool) -> Self {
        Self {
            writer: Box::new(writer),
            color,
            written: false,
        }
    }
}

type SizeProbe = Box<dyn Fn() -> Option<Size>>;

struct Inner {
    stdout: Sink,
    stderr: Sink,
    colorful: Option<bool>,
    quiet: bool,
    size: Option<Size>,
    probe: SizeProbe,
}

/// Shared handle to a program's stdout/stderr.
#[derive(Clone)]
pub struct Output {
    inner: Rc<RefCell<Inner>>,
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Output")
            .field("stdout_color", &inner.stdout.color)
            .field("stderr_color", &inner.stderr.color)
            .field("colorful", &inner.colorful)
            .field("quiet", &inner.quiet)
            .field("size", &inner.size)
            .finish_non_exhaustive()
    }
}

impl Output {
    /// Build from explicit sinks. `*_color` is the auto-detected decoration
    /// for that stream, used when no [`colorful`](Self::set_colorful)
    /// override is set.
    pub fn with_sinks(
        stdout: impl Write + 'static,
        stdout_color: bool,
        stderr: impl Write + 'static,
        stderr_color: bool,
    ) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                stdout: Sink::new(stdout, stdout_color),
                stderr: Sink::new(stderr, stderr_color),
                colorful: None,
                quiet: false,
                size: None,
                probe: Box::new(terminal::query_size),
            })),
        }
    }

    /// The process's real stdout and stderr, with decoration detected per
    /// stream.
    #[must_use]
    pub fn stdio() -> Self {
        Self::with_sinks(
            io::stdout(),
            terminal::supports_color(Stream::Stdout),
            io::stderr(),
            terminal::supports_color(Stream::Stderr),
        )
    }

    /// In-memory sinks. Both streams report `decorated`, and the terminal
    /// size is pinned to the 80×50 fallback until changed with
    /// [`set_size`](Self::set_size).
    #[must_use]
    pub fn memory(decorated: bool) -> (Self, Capture) {
        let capture = Capture::default();
        let output = Self::with_sinks(
            capture.stdout.clone(),
            decorated,
            capture.stderr.clone(),
            decorated,
        );
        output.set_size(Size::FALLBACK);
        (output, capture)
    }

    // ── Decoration ──────────────────────────────────────────────────

    /// Force decoration on or off for both streams. `None` restores auto
    /// detection.
    pub fn set_colorful(&self, colorful: Option<bool>) {
        self.inner.borrow_mut().colorful = colorful;
    }

    /// The forced decoration setting, if any.
    #[must_use]
    pub fn colorful(&self) -> Option<bool> {
        self.inner.borrow().colorful
    }

    /// Whether stdout output carries ANSI sequences.
    #[must_use]
    pub fn is_stdout_decorated(&self) -> bool {
        let inner = self.inner.borrow();
        inner.colorful.unwrap_or(inner.stdout.color)
    }

    /// Whether stderr output carries ANSI sequences.
    #[must_use]
    pub fn is_stderr_decorated(&self) -> bool {
        let inner = self.inner.borrow();
        inner.colorful.unwrap_or(inner.stderr.color)
    }

    /// Whether `target` carries ANSI sequences.
    #[must_use]
    pub fn is_decorated(&self, target: Target) -> bool {
        match target {
            Target::Stdout => self.is_stdout_decorated(),
            Target::Stderr => self.is_stderr_decorated(),
        }
    }

    // ── Quiet ───────────────────────────────────────────────────────

    /// Drop every write while `quiet` is set.
    pub fn set_quiet(&self, quiet: bool) {
        self.inner.borrow_mut().quiet = quiet;
    }

    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.inner.borrow().quiet
    }

    // ── Writing ─────────────────────────────────────────────────────

    /// Write `bytes` to `target` and flush. Empty writes and quiet mode are
    /// no-ops.
    ///
    /// # Errors
    ///
    /// Propagates the sink's I/O error.
    pub fn write(&self, target: Target, bytes: &[u8]) -> io::Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.quiet || bytes.is_empty() {
            return Ok(());
        }
        let sink = match target {
            Target::Stdout => &mut inner.stdout,
            Target::Stderr => &mut inner.stderr,
        };
        sink.writer.write_all(bytes)?;
        sink.writer.flush()?;
        sink.written = true;
        Ok(())
    }

    /// Write `text` to stdout.
    ///
    /// # Errors
    ///
    /// Propagates the sink's I/O error.
    pub fn stdout(&self, text: &str) -> io::Result<()> {
        self.write(Target::Stdout, text.as_bytes())
    }

    /// Write `text` to stderr.
    ///
    /// # Errors
    ///
    /// Propagates the sink's I/O error.
    pub fn stderr(&self, text: &str) -> io::Result<()> {
        self.write(Target::Stderr, text.as_bytes())
    }

    /// A [`Write`] adapter that forwards to `target`.
    #[must_use]
    pub fn writer(&self, target: Target) -> OutputWriter {
        OutputWriter {
            output: self.clone(),
            target,
        }
    }

    /// Whether nothing has been written to stdout yet.
    #[must_use]
    pub fn is_stdout_empty(&self) -> bool {
        !self.inner.borrow().stdout.written
    }

    /// Whether nothing has been written to stderr yet.
    #[must_use]
    pub fn is_stderr_empty(&self) -> bool {
        !self.inner.borrow().stderr.written
    }

    // ── Terminal Size ───────────────────────────────────────────────

    /// Terminal size, cached after the first query.
    ///
    /// `fresh` forces a new query. Falls back to 80×50 when the terminal
    /// cannot be queried.
    pub fn terminal_size(&self, fresh: bool) -> Size {
        let mut inner = self.inner.borrow_mut();
        if fresh || inner.size.is_none() {
            let size = (inner.probe)().unwrap_or(Size::FALLBACK);
            inner.size = Some(size);
        }
        inner.size.unwrap_or(Size::FALLBACK)
    }

    /// Pin the terminal size. Later fresh queries keep returning it.
    pub fn set_size(&self, size: Size) {
        self.set_size_probe(move || Some(size));
    }

    /// Replace how the terminal size is queried. Clears the cache.
    pub fn set_size_probe(&self, probe: impl Fn() -> Option<Size> + 'static) {
        let mut inner = self.inner.borrow_mut();
        inner.probe = Box::new(probe);
        inner.size = None;
    }
}

/// [`Write`] adapter returned by [`Output::writer`].
#[derive(Debug, Clone)]
pub struct OutputWriter {
    output: Output,
    target: Target,
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(self.target, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    // ── Writing ─────────────────────────────────────────────────────

    #[test]
    fn writes_reach_the_right_sink() {
        let (out, cap) = Output::memory(true);
        out.stdout("hello").unwrap();
        out.stderr("oops").unwrap();
        assert_eq!(cap.stdout.contents(), "hello");
        assert_eq!(cap.stderr.contents(), "oops");
    }

    #[test]
    fn empty_flags_track_writes() {
        let (out, _cap) = Output::memory(true);
        assert!(out.is_stdout_empty());
        out.stdout("").unwrap();
        assert!(out.is_stdout_empty());
        out.stdout("x").unwrap();
        assert!(!out.is_stdout_empty());
        assert!(out.is_stderr_empty());
    }

    #[test]
    fn quiet_drops_writes() {
        let (out, cap) = Output::memory(true);
        out.set_quiet(true);
        out.stdout("hidden").unwrap();
        assert!(cap.stdout.is_empty());
        assert!(out.is_stdout_empty());
        out.set_quiet(false);
        out.stdout("shown").unwrap();
        assert_eq!(cap.stdout.take(), "shown");
        assert!(cap.stdout.is_empty());
    }

    #[test]
    fn writer_adapter_forwards() {
        let (out, cap) = Output::memory(false);
        let mut w = out.writer(Target::Stderr);
        write!(w, "{}-{}", 1, 2).unwrap();
        assert_eq!(cap.stderr.contents(), "1-2");
    }

    // ── Decoration ──────────────────────────────────────────────────

    #[test]
    fn streams_decorate_independently() {
        let out = Output::with_sinks(io::sink(), true, io::sink(), false);
        assert!(out.is_stdout_decorated());
        assert!(!out.is_stderr_decorated());
    }

    #[test]
    fn colorful_overrides_detection() {
        let (out, _cap) = Output::memory(false);
        assert!(!out.is_decorated(Target::Stdout));
        out.set_colorful(Some(true));
        assert!(out.is_decorated(Target::Stdout));
        assert!(out.is_decorated(Target::Stderr));
        out.set_colorful(None);
        assert!(!out.is_stdout_decorated());
    }

    // ── Terminal Size ───────────────────────────────────────────────

    #[test]
    fn size_is_cached_until_fresh() {
        let (out, _cap) = Output::memory(true);
        let calls = Rc::new(Cell::new(0u16));
        let counter = Rc::clone(&calls);
        out.set_size_probe(move || {
            counter.set(counter.get() + 1);
            Some(Size { cols: 10 * counter.get(), rows: 5 })
        });
        assert_eq!(out.terminal_size(false).cols, 10);
        assert_eq!(out.terminal_size(false).cols, 10);
        assert_eq!(out.terminal_size(true).cols, 20);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn unknown_size_falls_back() {
        let (out, _cap) = Output::memory(true);
        out.set_size_probe(|| None);
        assert_eq!(out.terminal_size(true), Size { cols: 80, rows: 50 });
    }

    #[test]
    fn clones_share_state() {
        let (out, cap) = Output::memory(true);
        let other = out.clone();
        other.set_quiet(true);
        out.stdout("x").unwrap();
        assert!(cap.stdout.is_empty());
    }
}
