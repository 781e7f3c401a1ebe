// SPDX-License-Identifier: MIT
//
// Terminal control: size queries, TTY detection, and raw input mode.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), fcntl, ioctl (TIOCGWINSZ), isatty, and raw fd reads/writes.
// These are the standard POSIX interfaces for terminal control. Each unsafe
// block is minimal.
#![allow(unsafe_code)]
//
// The keyboard loop never talks to the OS directly. It drives a
// `TerminalControl` implementation, which knows how to switch the controlling
// terminal into raw, non-echoing, byte-at-a-time mode, read whatever bytes are
// available without blocking, and put everything back afterwards.
//
// Two implementations ship here:
//
//   - `StdinTerminal`: the real thing, termios + O_NONBLOCK on fd 0.
//   - `ScriptedTerminal`: replays a fixed list of byte chunks and idle polls.
//     Tests drive the keyboard loop with it, and so can anything that wants
//     to feed recorded input through the loop.
//
// Raw mode here is deliberately narrower than cfmakeraw: only ICANON, ECHO,
// and ISIG are cleared. Output post-processing stays on so `\n` still returns
// the carriage, which the widgets rely on, and ISIG is off so Ctrl-C arrives
// as byte 0x03 for the decoder to turn into an `Exit` key.

use std::collections::VecDeque;
use std::io;
use std::sync::{Mutex, Once};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns.
    pub cols: u16,
    /// Number of rows.
    pub rows: u16,
}

impl Size {
    /// Fallback used when the terminal cannot be queried.
    pub const FALLBACK: Self = Self { cols: 80, rows: 50 };
}

impl Default for Size {
    fn default() -> Self {
        Self::FALLBACK
    }
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Query the current terminal size via `ioctl(TIOCGWINSZ)` on stdout.
///
/// Returns `None` if stdout is not a terminal or the query fails.
#[cfg(unix)]
#[must_use]
pub fn query_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size {
            cols: ws.ws_col,
            rows: ws.ws_row,
        })
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn query_size() -> Option<Size> {
    None
}

/// A standard stream, for TTY and color checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdin,
    Stdout,
    Stderr,
}

/// Check whether `stream` is connected to a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty(stream: Stream) -> bool {
    let fd = match stream {
        Stream::Stdin => libc::STDIN_FILENO,
        Stream::Stdout => libc::STDOUT_FILENO,
        Stream::Stderr => libc::STDERR_FILENO,
    };
    unsafe { libc::isatty(fd) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty(stream: Stream) -> bool {
    use std::io::IsTerminal;
    match stream {
        Stream::Stdin => io::stdin().is_terminal(),
        Stream::Stdout => io::stdout().is_terminal(),
        Stream::Stderr => io::stderr().is_terminal(),
    }
}

/// Resident memory of this process in bytes.
///
/// Linux reads the current resident set from `/proc/self/statm`; other Unix
/// systems report the peak resident set from `getrusage`. `None` if neither
/// is available.
#[cfg(unix)]
#[must_use]
pub fn resident_memory() -> Option<u64> {
    let pages = std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|statm| statm.split_whitespace().nth(1)?.parse::<u64>().ok());
    if let Some(pages) = pages {
        let page_size = u64::try_from(unsafe { libc::sysconf(libc::_SC_PAGESIZE) }).ok()?;
        return Some(pages.saturating_mul(page_size));
    }

    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    if unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) } != 0 {
        return None;
    }
    let peak = u64::try_from(usage.ru_maxrss).ok()?;
    // ru_maxrss is in bytes on macOS, kilobytes elsewhere.
    Some(if cfg!(target_os = "macos") { peak } else { peak.saturating_mul(1024) })
}

#[cfg(not(unix))]
#[must_use]
pub fn resident_memory() -> Option<u64> {
    None
}

/// Whether output to `stream` should carry ANSI decoration.
///
/// `NO_COLOR` (any value) turns decoration off. `TERM_PROGRAM=Hyper` and
/// `BABUN_HOME` turn it on even when the stream is not a TTY. Otherwise the
/// stream must be a terminal.
#[must_use]
pub fn supports_color(stream: Stream) -> bool {
    detect_color(|key| std::env::var_os(key).map(|v| v.to_string_lossy().into_owned()), || {
        is_tty(stream)
    })
}

/// Decoration detection with the environment and TTY check injected.
fn detect_color(env: impl Fn(&str) -> Option<String>, tty: impl FnOnce() -> bool) -> bool {
    if env("NO_COLOR").is_some() {
        return false;
    }
    if env("BABUN_HOME").is_some() || env("TERM_PROGRAM").as_deref() == Some("Hyper") {
        return true;
    }
    tty()
}

// ─── TerminalControl ────────────────────────────────────────────────────────

/// Outcome of a non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were written into the buffer.
    Bytes(usize),
    /// Nothing available right now.
    Empty,
    /// The input stream is closed.
    Eof,
}

/// The capability the keyboard loop needs from the hosting terminal.
pub trait TerminalControl {
    /// Current size, or `None` if it cannot be determined.
    fn size(&self) -> Option<Size>;

    /// Whether raw interactive input is possible at all.
    fn is_interactive(&self) -> bool;

    /// Switch to raw, non-echoing, non-blocking input, recording the prior
    /// mode. Entering twice without leaving is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode cannot be changed.
    fn enter_raw(&mut self) -> io::Result<()>;

    /// Restore the mode recorded by [`enter_raw`](Self::enter_raw). A no-op
    /// when not in raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the prior mode cannot be restored.
    fn leave_raw(&mut self) -> io::Result<()>;

    /// Read whatever bytes are available without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error for read failures other than "would block".
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus>;
}

impl<T: TerminalControl + ?Sized> TerminalControl for &mut T {
    fn size(&self) -> Option<Size> {
        (**self).size()
    }

    fn is_interactive(&self) -> bool {
        (**self).is_interactive()
    }

    fn enter_raw(&mut self) -> io::Result<()> {
        (**self).enter_raw()
    }

    fn leave_raw(&mut self) -> io::Result<()> {
        (**self).leave_raw()
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus> {
        (**self).read_available(buf)
    }
}

// ─── Panic-Safe Restore ─────────────────────────────────────────────────────

/// Saved stdin state: termios plus the fcntl status flags.
#[cfg(unix)]
#[derive(Clone, Copy)]
struct SavedMode {
    termios: libc::termios,
    flags: libc::c_int,
}

/// Global backup of the pre-raw stdin state for the panic hook.
#[cfg(unix)]
static MODE_BACKUP: Mutex<Option<SavedMode>> = Mutex::new(None);

/// Ensures the hook is installed at most once per process.
static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Restore stdin from the global backup. Best-effort.
#[cfg(unix)]
fn restore_from_backup() {
    if let Ok(guard) = MODE_BACKUP.lock() {
        if let Some(saved) = *guard {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw const saved.termios);
                let _ = libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, saved.flags);
            }
        }
    }
}

/// Install a panic hook that puts the terminal back before the message prints.
///
/// Writes "show cursor" straight to fd 1, bypassing the stdout lock in case
/// the panic happened while it was held.
fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            #[cfg(unix)]
            {
                const SHOW_CURSOR: &[u8] = b"\x1b[?25h";
                unsafe {
                    let _ = libc::write(
                        libc::STDOUT_FILENO,
                        SHOW_CURSOR.as_ptr().cast::<libc::c_void>(),
                        SHOW_CURSOR.len(),
                    );
                }
                restore_from_backup();
            }
            original(info);
        }));
    });
}

// ─── StdinTerminal ──────────────────────────────────────────────────────────

/// The process's controlling terminal, read through fd 0.
///
/// Raw mode is left automatically when the handle is dropped, and by the
/// panic hook if the process panics while raw.
#[derive(Default)]
pub struct StdinTerminal {
    #[cfg(unix)]
    saved: Option<SavedMode>,
}

impl StdinTerminal {
    /// Create a handle. Does not touch the terminal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether raw mode is currently active through this handle.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        #[cfg(unix)]
        {
            self.saved.is_some()
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

impl std::fmt::Debug for StdinTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdinTerminal").field("raw", &self.is_raw()).finish()
    }
}

#[cfg(unix)]
impl TerminalControl for StdinTerminal {
    fn size(&self) -> Option<Size> {
        query_size()
    }

    fn is_interactive(&self) -> bool {
        is_tty(Stream::Stdin)
    }

    fn enter_raw(&mut self) -> io::Result<()> {
        if self.saved.is_some() {
            return Ok(());
        }
        if !self.is_interactive() {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "stdin is not a terminal"));
        }

        install_panic_hook();

        let fd = libc::STDIN_FILENO;
        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &raw mut termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            let flags = libc::fcntl(fd, libc::F_GETFL);
            if flags < 0 {
                return Err(io::Error::last_os_error());
            }

            let saved = SavedMode { termios, flags };
            if let Ok(mut guard) = MODE_BACKUP.lock() {
                *guard = Some(saved);
            }

            termios.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ISIG);
            termios.c_cc[libc::VMIN] = 0;
            termios.c_cc[libc::VTIME] = 0;
            if libc::tcsetattr(fd, libc::TCSANOW, &raw const termios) != 0 {
                return Err(io::Error::last_os_error());
            }
            if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
                let err = io::Error::last_os_error();
                let _ = libc::tcsetattr(fd, libc::TCSANOW, &raw const saved.termios);
                return Err(err);
            }
            self.saved = Some(saved);
        }
        Ok(())
    }

    fn leave_raw(&mut self) -> io::Result<()> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        let fd = libc::STDIN_FILENO;
        let status = unsafe {
            let flags = libc::fcntl(fd, libc::F_SETFL, saved.flags);
            let attrs = libc::tcsetattr(fd, libc::TCSANOW, &raw const saved.termios);
            if flags < 0 || attrs != 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(())
            }
        };
        if let Ok(mut guard) = MODE_BACKUP.lock() {
            *guard = None;
        }
        status
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus> {
        let n = unsafe {
            libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len())
        };
        match n {
            0 => Ok(ReadStatus::Eof),
            // `n` is positive and bounded by `buf.len()`.
            #[allow(clippy::cast_sign_loss)]
            n if n > 0 => Ok(ReadStatus::Bytes(n as usize)),
            _ => {
                let err = io::Error::last_os_error();
                match err.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(ReadStatus::Empty),
                    _ => Err(err),
                }
            }
        }
    }
}

#[cfg(not(unix))]
impl TerminalControl for StdinTerminal {
    fn size(&self) -> Option<Size> {
        query_size()
    }

    fn is_interactive(&self) -> bool {
        false
    }

    fn enter_raw(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "raw input is not supported on this platform",
        ))
    }

    fn leave_raw(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_available(&mut self, _buf: &mut [u8]) -> io::Result<ReadStatus> {
        Ok(ReadStatus::Eof)
    }
}

impl Drop for StdinTerminal {
    fn drop(&mut self) {
        let _ = self.leave_raw();
    }
}

// ─── ScriptedTerminal ───────────────────────────────────────────────────────

/// One step of a scripted input session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A chunk of bytes delivered by a single read.
    Bytes(Vec<u8>),
    /// A read that finds nothing available.
    Idle,
}

/// A [`TerminalControl`] that replays a fixed script of reads.
///
/// Once the script runs out every read reports [`ReadStatus::Eof`].
///
/// ```
/// use conch_term::terminal::{ReadStatus, ScriptedTerminal, TerminalControl};
///
/// let mut term = ScriptedTerminal::new().bytes(b"hi").idle();
/// let mut buf = [0; 16];
/// assert_eq!(term.read_available(&mut buf).unwrap(), ReadStatus::Bytes(2));
/// assert_eq!(term.read_available(&mut buf).unwrap(), ReadStatus::Empty);
/// assert_eq!(term.read_available(&mut buf).unwrap(), ReadStatus::Eof);
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedTerminal {
    steps: VecDeque<Step>,
    interactive: bool,
    size: Option<Size>,
    raw: bool,
    enters: usize,
    leaves: usize,
}

impl Default for ScriptedTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTerminal {
    /// An interactive terminal with an empty script.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            interactive: true,
            size: None,
            raw: false,
            enters: 0,
            leaves: 0,
        }
    }

    /// Append a chunk of bytes.
    #[must_use]
    pub fn bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.steps.push_back(Step::Bytes(bytes.as_ref().to_vec()));
        self
    }

    /// Append one empty read.
    #[must_use]
    pub fn idle(self) -> Self {
        self.idles(1)
    }

    /// Append `n` empty reads.
    #[must_use]
    pub fn idles(mut self, n: usize) -> Self {
        self.steps.extend(std::iter::repeat_n(Step::Idle, n));
        self
    }

    /// Report a fixed size.
    #[must_use]
    pub const fn with_size(mut self, cols: u16, rows: u16) -> Self {
        self.size = Some(Size { cols, rows });
        self
    }

    /// Refuse raw mode, like a pipe or redirected file.
    #[must_use]
    pub const fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    /// How many times raw mode was entered.
    #[must_use]
    pub const fn enter_count(&self) -> usize {
        self.enters
    }

    /// How many times raw mode was left.
    #[must_use]
    pub const fn leave_count(&self) -> usize {
        self.leaves
    }

    /// Whether raw mode is currently active.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        self.raw
    }

    /// Steps not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl TerminalControl for ScriptedTerminal {
    fn size(&self) -> Option<Size> {
        self.size
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn enter_raw(&mut self) -> io::Result<()> {
        if !self.interactive {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "scripted terminal is not interactive"));
        }
        if !self.raw {
            self.raw = true;
            self.enters += 1;
        }
        Ok(())
    }

    fn leave_raw(&mut self) -> io::Result<()> {
        if self.raw {
            self.raw = false;
            self.leaves += 1;
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus> {
        match self.steps.pop_front() {
            None => Ok(ReadStatus::Eof),
            Some(Step::Idle) => Ok(ReadStatus::Empty),
            Some(Step::Bytes(mut bytes)) => {
                if bytes.len() > buf.len() {
                    let rest = bytes.split_off(buf.len());
                    self.steps.push_front(Step::Bytes(rest));
                }
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(ReadStatus::Bytes(bytes.len()))
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
