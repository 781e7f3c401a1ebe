// SPDX-License-Identifier: MIT
//
// The keyboard loop: raw-mode session, polling, and key dispatch.
//
// Single-threaded and cooperative. Each iteration does one non-blocking read
// through the `TerminalControl` capability:
//
//   - bytes → decode into key events → dispatch each in order
//   - nothing, but a sequence is half-decoded → flush it (the grace period
//     for a split escape sequence is exactly one idle poll)
//   - nothing at all → fire the start (or resume) callback once per raw-mode
//     stretch, else the heartbeat if it is due, else sleep for `poll_interval`
//   - end of input → stop
//
// Callbacks steer the loop through the `Control` they are handed: `stop()`
// ends the session after the current event, `pause()` hands the terminal back
// in cooked mode to a blocking callback, then re-enters raw mode and resumes.
//
// Cleanup is unconditional. Whatever ends a session (stop, Ctrl-C, a failing
// callback, an I/O error) raw mode is left first, then the cursor is shown
// again, then the stop listener runs. Ctrl-C then ends the process with exit
// code 2 unless `exit_on_interrupt` is off; a callback error is returned from
// `listen()`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::input::{Decoder, Key, KeyEvent};
use crate::output::Output;
use crate::screen::Screen;
use crate::terminal::{ReadStatus, TerminalControl};

/// Error type callbacks may fail with.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// What every callback returns.
pub type CallbackResult = Result<(), BoxError>;

/// Process exit code used after Ctrl-C.
pub const INTERRUPT_EXIT_CODE: i32 = 2;

/// Bytes read per poll.
const READ_BUF_SIZE: usize = 1024;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Why [`Keyboard::listen`] returned an error.
#[derive(Debug, Error)]
pub enum KeyboardError {
    /// Raw interactive input is not available. The loop never started.
    #[error("raw keyboard input unavailable: {0}")]
    Setup(#[source] io::Error),

    /// A keyboard loop is already listening on this thread.
    #[error("a keyboard loop is already listening")]
    AlreadyListening,

    /// Ctrl-C ended the session and `exit_on_interrupt` is off.
    #[error("interrupted")]
    Interrupted,

    /// A callback failed. Cleanup and the stop listener have already run.
    #[error("keyboard callback failed: {0}")]
    Callback(#[source] BoxError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

// ─── Configuration ──────────────────────────────────────────────────────────

/// Timing and dispatch switches for a [`Keyboard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardConfig {
    /// Sleep between idle polls. Default: 100µs.
    pub poll_interval: Duration,
    /// Time between heartbeats while idle. Zero disables heartbeats.
    /// Default: 3s.
    pub heartbeat_interval: Duration,
    /// Call the input listener even when a hotkey matched.
    pub input_with_hotkeys: bool,
    /// Call the input listener for control keys (arrows, Esc, ...), not
    /// just printable input.
    pub input_with_invisible: bool,
    /// End the process with [`INTERRUPT_EXIT_CODE`] after Ctrl-C. When off,
    /// `listen()` returns [`KeyboardError::Interrupted`] instead.
    pub exit_on_interrupt: bool,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_micros(100),
            heartbeat_interval: Duration::from_secs(3),
            input_with_hotkeys: false,
            input_with_invisible: false,
            exit_on_interrupt: true,
        }
    }
}

impl KeyboardConfig {
    /// Set the heartbeat interval from fractional seconds, rounded to the
    /// millisecond. Zero or negative disables heartbeats.
    #[must_use]
    pub fn with_heartbeat_secs(mut self, secs: f64) -> Self {
        self.heartbeat_interval = if secs > 0.0 {
            // Rounded and bounded above; the cast cannot truncate meaningfully.
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_precision_loss
            )]
            let millis = (secs * 1000.0).round().min(u64::MAX as f64) as u64;
            Duration::from_millis(millis)
        } else {
            Duration::ZERO
        };
        self
    }
}

// ─── Listener ───────────────────────────────────────────────────────────────

type KeyFn = dyn FnMut(&KeyEvent, &mut Control) -> CallbackResult;

/// A key callback with identity.
///
/// Clones are the same listener: binding a clone where the original is
/// already bound is a no-op, and either one unbinds both.
#[derive(Clone)]
pub struct Listener(Rc<RefCell<KeyFn>>);

impl Listener {
    pub fn new(f: impl FnMut(&KeyEvent, &mut Control) -> CallbackResult + 'static) -> Self {
        Self(Rc::new(RefCell::new(f)))
    }

    /// Whether `self` and `other` are the same listener.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    fn call(&self, event: &KeyEvent, control: &mut Control) -> CallbackResult {
        (*self.0.borrow_mut())(event, control)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Listener").field(&Rc::as_ptr(&self.0).cast::<()>()).finish()
    }
}

// ─── HotkeyTable ────────────────────────────────────────────────────────────

/// Keys bound to ordered lists of listeners.
#[derive(Debug, Default, Clone)]
pub struct HotkeyTable {
    map: HashMap<Key, Vec<Listener>>,
}

impl HotkeyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `listener` to `key`. Returns false if it was already bound there.
    pub fn bind(&mut self, key: Key, listener: &Listener) -> bool {
        let bound = self.map.entry(key).or_default();
        if bound.iter().any(|l| l.ptr_eq(listener)) {
            return false;
        }
        bound.push(listener.clone());
        true
    }

    /// Remove `listener` from `key`. Returns false if it was not bound there.
    pub fn unbind(&mut self, key: &Key, listener: &Listener) -> bool {
        let Some(bound) = self.map.get_mut(key) else {
            return false;
        };
        let before = bound.len();
        bound.retain(|l| !l.ptr_eq(listener));
        let removed = bound.len() != before;
        if bound.is_empty() {
            self.map.remove(key);
        }
        removed
    }

    /// Listeners bound to `key`, in registration order.
    #[must_use]
    pub fn get(&self, key: &Key) -> &[Listener] {
        self.map.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// ─── Control ────────────────────────────────────────────────────────────────

/// Deferred resume callback produced by running a pause's `on_stop`.
type Resume = Box<dyn FnOnce(&mut Control) -> CallbackResult>;

/// A pause request: run `on_stop` in cooked mode, keep what it produces.
type PauseFn = Box<dyn FnOnce() -> Option<Resume>>;

/// Handed to every callback to steer the loop.
#[derive(Default)]
pub struct Control {
    stop: bool,
    pause: Option<PauseFn>,
}

impl Control {
    /// End the session once the current event has been dispatched.
    pub const fn stop(&mut self) {
        self.stop = true;
    }

    /// Whether [`stop`](Self::stop) has been requested.
    #[must_use]
    pub const fn is_stopping(&self) -> bool {
        self.stop
    }

    /// Leave raw mode, run `on_stop`, then resume listening.
    ///
    /// The stop listener is not called for a pause. The cursor is shown while
    /// `on_stop` runs, and the start listener fires again on the first idle
    /// poll after resuming.
    pub fn pause<R: 'static>(&mut self, on_stop: impl FnOnce() -> R + 'static) {
        self.pause = Some(Box::new(move || {
            on_stop();
            None
        }));
    }

    /// Like [`pause`](Self::pause), but the first idle poll after resuming
    /// calls `on_start` with `on_stop`'s return value instead of the start
    /// listener.
    pub fn pause_with<R: 'static>(
        &mut self,
        on_stop: impl FnOnce() -> R + 'static,
        on_start: impl FnOnce(R, &mut Self) -> CallbackResult + 'static,
    ) {
        self.pause = Some(Box::new(move || {
            let value = on_stop();
            let resume: Resume = Box::new(move |control| on_start(value, control));
            Some(resume)
        }));
    }

    fn take_request(&mut self) -> Option<Request> {
        if let Some(pause) = self.pause.take() {
            return Some(Request::Pause(pause));
        }
        self.stop.then_some(Request::Stop)
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Control")
            .field("stop", &self.stop)
            .field("pause", &self.pause.is_some())
            .finish()
    }
}

enum Request {
    Stop,
    Pause(PauseFn),
}

// ─── Loop State ─────────────────────────────────────────────────────────────

/// Where a [`Keyboard`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Listening,
    Paused,
    Stopped,
}

/// Why a session ended, as told to the stop listener.
#[derive(Debug, Clone, Copy)]
pub enum StopReason<'a> {
    /// Ctrl-C.
    Interrupted,
    /// A callback called [`Control::stop`], or input ended.
    Stopped,
    /// A callback or the terminal failed.
    Failed(&'a (dyn StdError + 'static)),
}

/// How one raw-mode stretch of the poll loop ended.
enum Session {
    Stopped,
    Interrupted,
    Paused(PauseFn),
    Failed(Failure),
}

enum Failure {
    Callback(BoxError),
    Io(io::Error),
}

impl Failure {
    fn as_error(&self) -> &(dyn StdError + 'static) {
        match self {
            Self::Callback(e) => e.as_ref(),
            Self::Io(e) => e,
        }
    }
}

thread_local! {
    static LISTENING: Cell<bool> = const { Cell::new(false) };
}

/// Marks this thread as listening for the guard's lifetime.
struct ListenGuard;

impl ListenGuard {
    fn acquire() -> Option<Self> {
        LISTENING.with(|flag| (!flag.replace(true)).then_some(Self))
    }
}

impl Drop for ListenGuard {
    fn drop(&mut self) {
        LISTENING.with(|flag| flag.set(false));
    }
}

fn set_cursor_visible(screen: Option<&Screen>, visible: bool) {
    let Some(screen) = screen else {
        return;
    };
    let result = if visible { screen.show_cursor() } else { screen.hide_cursor() };
    if let Err(e) = result {
        warn!(error = %e, visible, "failed to toggle cursor");
    }
}

// ─── Keyboard ───────────────────────────────────────────────────────────────

type StateFn = Box<dyn FnMut(&mut Control) -> CallbackResult>;
type StopFn = Box<dyn FnMut(StopReason<'_>)>;

/// Raw keyboard input loop over a [`TerminalControl`].
///
/// # Example
///
/// ```
/// use conch_term::input::Key;
/// use conch_term::keyboard::{Keyboard, Listener};
/// use conch_term::terminal::ScriptedTerminal;
///
/// let mut keyboard = Keyboard::new(ScriptedTerminal::new().bytes(b"\x1b[A"));
/// let up = Listener::new(|_, control| {
///     control.stop();
///     Ok(())
/// });
/// keyboard.on_hotkey([Key::Up], &up);
/// keyboard.listen().unwrap();
/// ```
pub struct Keyboard<T: TerminalControl> {
    terminal: T,
    config: KeyboardConfig,
    output: Option<Output>,
    hotkeys: HotkeyTable,
    input: Option<Listener>,
    on_start: Option<StateFn>,
    on_heartbeat: Option<StateFn>,
    on_stop: Option<StopFn>,
    state: LoopState,
    started: bool,
    last_heartbeat: Option<Instant>,
    resume: Option<Resume>,
}

impl<T: TerminalControl> Keyboard<T> {
    pub fn new(terminal: T) -> Self {
        Self::with_config(terminal, KeyboardConfig::default())
    }

    pub fn with_config(terminal: T, config: KeyboardConfig) -> Self {
        Self {
            terminal,
            config,
            output: None,
            hotkeys: HotkeyTable::new(),
            input: None,
            on_start: None,
            on_heartbeat: None,
            on_stop: None,
            state: LoopState::Idle,
            started: false,
            last_heartbeat: None,
            resume: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub const fn config(&self) -> &KeyboardConfig {
        &self.config
    }

    pub const fn config_mut(&mut self) -> &mut KeyboardConfig {
        &mut self.config
    }

    pub const fn terminal(&self) -> &T {
        &self.terminal
    }

    pub const fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    pub fn into_terminal(self) -> T {
        self.terminal
    }

    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Hide the cursor on `output` while listening, if its stdout is
    /// decorated.
    pub fn attach_output(&mut self, output: Output) {
        self.output = Some(output);
    }

    // ── Listeners ───────────────────────────────────────────────────

    /// Bind `listener` to every key in `keys`. Already-bound pairs are
    /// skipped.
    pub fn on_hotkey<K: Into<Key>>(&mut self, keys: impl IntoIterator<Item = K>, listener: &Listener) {
        for key in keys {
            self.hotkeys.bind(key.into(), listener);
        }
    }

    /// Unbind `listener` from every key in `keys`.
    pub fn off_hotkey<K: Into<Key>>(&mut self, keys: impl IntoIterator<Item = K>, listener: &Listener) {
        for key in keys {
            self.hotkeys.unbind(&key.into(), listener);
        }
    }

    /// Listeners bound to `key`.
    pub fn hotkeys(&self, key: &Key) -> &[Listener] {
        self.hotkeys.get(key)
    }

    pub fn clear_hotkeys(&mut self) {
        self.hotkeys.clear();
    }

    /// Listener for keys no hotkey claimed.
    pub fn on_input(&mut self, listener: Listener) {
        self.input = Some(listener);
    }

    /// Fires once per `listen()`, on the first idle poll.
    pub fn on_start(&mut self, f: impl FnMut(&mut Control) -> CallbackResult + 'static) {
        self.on_start = Some(Box::new(f));
    }

    /// Fires every `heartbeat_interval` while idle.
    pub fn on_heartbeat(&mut self, f: impl FnMut(&mut Control) -> CallbackResult + 'static) {
        self.on_heartbeat = Some(Box::new(f));
    }

    /// Fires when a session ends, after cleanup. Not called for pauses.
    pub fn on_stop(&mut self, f: impl FnMut(StopReason<'_>) + 'static) {
        self.on_stop = Some(Box::new(f));
    }

    // ── Listen ──────────────────────────────────────────────────────

    /// Run the loop until a callback stops it, Ctrl-C, input ends, or a
    /// callback fails.
    ///
    /// # Errors
    ///
    /// - [`KeyboardError::AlreadyListening`] if another loop is listening on
    ///   this thread.
    /// - [`KeyboardError::Setup`] if raw mode is unavailable.
    /// - [`KeyboardError::Interrupted`] after Ctrl-C when `exit_on_interrupt`
    ///   is off.
    /// - [`KeyboardError::Callback`] / [`KeyboardError::Io`] if a callback or
    ///   a read failed.
    pub fn listen(&mut self) -> Result<(), KeyboardError> {
        let _guard = ListenGuard::acquire().ok_or(KeyboardError::AlreadyListening)?;

        if !self.terminal.is_interactive() {
            return Err(KeyboardError::Setup(io::Error::new(
                io::ErrorKind::Unsupported,
                "input is not an interactive terminal",
            )));
        }
        self.terminal.enter_raw().map_err(KeyboardError::Setup)?;

        debug!("keyboard listening");
        self.state = LoopState::Listening;
        self.started = false;
        self.last_heartbeat = None;
        self.resume = None;
        let screen = self.cursor_screen();
        set_cursor_visible(screen.as_ref(), false);
        let mut hidden = true;

        let mut decoder = Decoder::new();
        let session = loop {
            let session = self.poll(&mut decoder);
            self.leave_raw();

            let pause = match session {
                Session::Paused(pause) => pause,
                other => break other,
            };
            debug!("keyboard paused");
            self.state = LoopState::Paused;
            set_cursor_visible(screen.as_ref(), true);
            hidden = false;
            self.resume = pause();
            if let Err(e) = self.terminal.enter_raw() {
                break Session::Failed(Failure::Io(e));
            }
            debug!("keyboard resumed");
            set_cursor_visible(screen.as_ref(), false);
            hidden = true;
            self.state = LoopState::Listening;
            self.started = false;
        };

        if hidden {
            set_cursor_visible(screen.as_ref(), true);
        }
        self.state = LoopState::Stopped;
        self.resume = None;

        match session {
            Session::Stopped | Session::Paused(_) => {
                debug!("keyboard stopped");
                self.notify_stop(StopReason::Stopped);
                Ok(())
            }
            Session::Interrupted => {
                debug!("keyboard interrupted");
                self.notify_stop(StopReason::Interrupted);
                if self.config.exit_on_interrupt {
                    std::process::exit(INTERRUPT_EXIT_CODE);
                }
                Err(KeyboardError::Interrupted)
            }
            Session::Failed(failure) => {
                debug!(error = %failure.as_error(), "keyboard failed");
                self.notify_stop(StopReason::Failed(failure.as_error()));
                Err(match failure {
                    Failure::Callback(e) => KeyboardError::Callback(e),
                    Failure::Io(e) => KeyboardError::Io(e),
                })
            }
        }
    }

    /// A screen to hide the cursor on, if an output is attached and decorated.
    fn cursor_screen(&self) -> Option<Screen> {
        self.output
            .as_ref()
            .filter(|output| output.is_stdout_decorated())
            .map(|output| Screen::new(output.clone()))
    }

    fn leave_raw(&mut self) {
        if let Err(e) = self.terminal.leave_raw() {
            warn!(error = %e, "failed to restore terminal mode");
        }
    }

    fn notify_stop(&mut self, reason: StopReason<'_>) {
        if let Some(f) = self.on_stop.as_mut() {
            f(reason);
        }
    }

    // ── Poll Loop ───────────────────────────────────────────────────

    fn poll(&mut self, decoder: &mut Decoder) -> Session {
        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            let status = match self.terminal.read_available(&mut buf) {
                Ok(status) => status,
                Err(e) => return Session::Failed(Failure::Io(e)),
            };
            let outcome = match status {
                ReadStatus::Bytes(n) => self.dispatch_all(decoder.feed(&buf[..n])),
                ReadStatus::Empty if decoder.has_pending() => self.dispatch_all(decoder.flush()),
                ReadStatus::Empty => self.idle(),
                ReadStatus::Eof => {
                    let outcome = self.dispatch_all(decoder.flush());
                    if outcome.is_none() {
                        return Session::Stopped;
                    }
                    outcome
                }
            };
            if let Some(session) = outcome {
                return session;
            }
        }
    }

    /// One idle poll: resume or start, else heartbeat, else sleep.
    fn idle(&mut self) -> Option<Session> {
        if !self.started {
            self.started = true;
            let mut control = Control::default();
            let result = match (self.resume.take(), self.on_start.as_mut()) {
                (Some(resume), _) => resume(&mut control),
                (None, Some(f)) => f(&mut control),
                (None, None) => Ok(()),
            };
            return Self::after_callback(result, &mut control);
        }

        let interval = self.config.heartbeat_interval;
        if !interval.is_zero() {
            if let Some(f) = self.on_heartbeat.as_mut() {
                let due = self.last_heartbeat.is_none_or(|last| last.elapsed() >= interval);
                if due {
                    self.last_heartbeat = Some(Instant::now());
                    let mut control = Control::default();
                    let result = f(&mut control);
                    return Self::after_callback(result, &mut control);
                }
            }
        }

        std::thread::sleep(self.config.poll_interval);
        None
    }

    fn after_callback(result: CallbackResult, control: &mut Control) -> Option<Session> {
        if let Err(e) = result {
            return Some(Session::Failed(Failure::Callback(e)));
        }
        control.take_request().map(|request| match request {
            Request::Stop => Session::Stopped,
            Request::Pause(pause) => Session::Paused(pause),
        })
    }

    fn dispatch_all(&mut self, events: Vec<KeyEvent>) -> Option<Session> {
        for event in events {
            trace!(key = %event.key, "key event");
            if event.key == Key::Exit {
                return Some(Session::Interrupted);
            }
            let mut control = Control::default();
            let result = self.dispatch(&event, &mut control);
            if let Some(session) = Self::after_callback(result, &mut control) {
                return Some(session);
            }
        }
        None
    }

    /// Hotkeys in registration order, then the input listener if allowed.
    fn dispatch(&self, event: &KeyEvent, control: &mut Control) -> CallbackResult {
        let bound = self.hotkeys.get(&event.key).to_vec();
        for listener in &bound {
            listener.call(event, control)?;
        }

        let Some(input) = &self.input else {
            return Ok(());
        };
        let claimed = !bound.is_empty() && !self.config.input_with_hotkeys;
        let shown = event.is_visible() || self.config.input_with_invisible;
        if !claimed && shown {
            input.call(event, control)?;
        }
        Ok(())
    }
}

impl<T: TerminalControl + std::fmt::Debug> std::fmt::Debug for Keyboard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyboard")
            .field("terminal", &self.terminal)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::ScriptedTerminal;
    use pretty_assertions::assert_eq;

    type Log = Rc<RefCell<Vec<String>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn recorder(log: &Log, tag: &'static str) -> Listener {
        let log = Rc::clone(log);
        Listener::new(move |event, _| {
            log.borrow_mut().push(format!("{tag}:{}", event.key));
            Ok(())
        })
    }

    fn keyboard(term: ScriptedTerminal) -> Keyboard<ScriptedTerminal> {
        let config = KeyboardConfig {
            poll_interval: Duration::ZERO,
            exit_on_interrupt: false,
            ..KeyboardConfig::default()
        };
        Keyboard::with_config(term, config)
    }

    // ── Setup ───────────────────────────────────────────────────────

    #[test]
    fn non_interactive_fails_fast() {
        let mut kb = keyboard(ScriptedTerminal::new().non_interactive().bytes("a"));
        let stops = Rc::new(Cell::new(0));
        let counter = Rc::clone(&stops);
        kb.on_stop(move |_| counter.set(counter.get() + 1));
        assert!(matches!(kb.listen(), Err(KeyboardError::Setup(_))));
        assert_eq!(stops.get(), 0);
        assert_eq!(kb.terminal().enter_count(), 0);
        assert_eq!(kb.state(), LoopState::Idle);
    }

    #[test]
    fn end_of_input_stops_and_restores() {
        let mut kb = keyboard(ScriptedTerminal::new().bytes("abc"));
        let reasons = log();
        let r = Rc::clone(&reasons);
        kb.on_stop(move |reason| r.borrow_mut().push(format!("{reason:?}")));
        kb.listen().unwrap();
        assert_eq!(*reasons.borrow(), vec!["Stopped"]);
        assert_eq!(kb.state(), LoopState::Stopped);
        assert!(!kb.terminal().is_raw());
        assert_eq!(kb.terminal().leave_count(), 1);
    }

    #[test]
    fn nested_listen_is_rejected() {
        let mut kb = keyboard(ScriptedTerminal::new().bytes("x"));
        let nested = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&nested);
        kb.on_input(Listener::new(move |_, _| {
            let mut inner = keyboard(ScriptedTerminal::new());
            *slot.borrow_mut() = Some(matches!(inner.listen(), Err(KeyboardError::AlreadyListening)));
            Ok(())
        }));
        kb.listen().unwrap();
        assert_eq!(*nested.borrow(), Some(true));
    }

    #[test]
    fn sequential_listens_are_allowed() {
        let mut kb = keyboard(ScriptedTerminal::new());
        kb.listen().unwrap();
        kb.listen().unwrap();
        assert_eq!(kb.terminal().enter_count(), 2);
    }

    // ── Dispatch ────────────────────────────────────────────────────

    #[test]
    fn hotkeys_fire_in_registration_order() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("\x1b[A"));
        kb.on_hotkey([Key::Up], &recorder(&calls, "first"));
        kb.on_hotkey([Key::Up], &recorder(&calls, "second"));
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["first:Up", "second:Up"]);
    }

    #[test]
    fn duplicate_hotkey_fires_once() {
        let calls = log();
        let listener = recorder(&calls, "hk");
        let mut kb = keyboard(ScriptedTerminal::new().bytes("8"));
        kb.on_hotkey(['8'], &listener);
        kb.on_hotkey(['8'], &listener.clone());
        assert_eq!(kb.hotkeys(&Key::from('8')).len(), 1);
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["hk:8"]);
    }

    #[test]
    fn one_listener_many_keys_and_removal() {
        let calls = log();
        let listener = recorder(&calls, "nav");
        let mut kb = keyboard(ScriptedTerminal::new().bytes("\x1b[A").bytes("8").bytes("2"));
        kb.on_hotkey([Key::Up, Key::from('8'), Key::from('2')], &listener);
        kb.off_hotkey(['2'], &listener);
        assert!(kb.hotkeys(&Key::from('2')).is_empty());
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["nav:Up", "nav:8"]);
    }

    #[test]
    fn input_listener_skipped_when_hotkey_matches() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("a").bytes("b"));
        kb.on_hotkey(['a'], &recorder(&calls, "hk"));
        kb.on_input(recorder(&calls, "in"));
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["hk:a", "in:b"]);
    }

    #[test]
    fn input_listener_with_hotkeys_when_configured() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("a"));
        kb.config_mut().input_with_hotkeys = true;
        kb.on_hotkey(['a'], &recorder(&calls, "hk"));
        kb.on_input(recorder(&calls, "in"));
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["hk:a", "in:a"]);
    }

    #[test]
    fn invisible_keys_skip_input_listener_by_default() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("\x1b[Bx\r"));
        kb.on_input(recorder(&calls, "in"));
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["in:x", "in:Enter"]);

        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("\x1b[Bx"));
        kb.config_mut().input_with_invisible = true;
        kb.on_input(recorder(&calls, "in"));
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["in:Down", "in:x"]);
    }

    #[test]
    fn split_sequence_across_reads() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("\x1b").bytes("[C"));
        kb.on_hotkey([Key::Right], &recorder(&calls, "hk"));
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["hk:Right"]);
    }

    #[test]
    fn lone_escape_resolves_on_idle() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("\x1b").idle().bytes("[C"));
        kb.config_mut().input_with_invisible = true;
        kb.on_input(recorder(&calls, "in"));
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["in:Esc", "in:[C"]);
    }

    // ── Stop & Interrupt ────────────────────────────────────────────

    #[test]
    fn control_stop_ends_after_event() {
        let mut kb = keyboard(ScriptedTerminal::new().bytes("q").bytes("never"));
        let stopper = Listener::new(|_, control| {
            control.stop();
            Ok(())
        });
        kb.on_hotkey(['q'], &stopper);
        kb.listen().unwrap();
        assert_eq!(kb.terminal().remaining(), 1);
    }

    #[test]
    fn interrupt_runs_cleanup_then_stop_listener() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes([b'a', 0x03, b'b']));
        kb.on_input(recorder(&calls, "in"));
        let c = Rc::clone(&calls);
        kb.on_stop(move |reason| c.borrow_mut().push(format!("stop:{reason:?}")));
        assert!(matches!(kb.listen(), Err(KeyboardError::Interrupted)));
        assert_eq!(*calls.borrow(), vec!["in:a", "stop:Interrupted"]);
        assert!(!kb.terminal().is_raw());
    }

    #[test]
    fn exit_key_is_never_dispatched() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes([0x03]));
        kb.on_hotkey([Key::Exit], &recorder(&calls, "hk"));
        let _ = kb.listen();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn callback_error_is_rethrown_after_cleanup() {
        let seen = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("x"));
        kb.on_input(Listener::new(|_, _| Err("boom".into())));
        let s = Rc::clone(&seen);
        kb.on_stop(move |reason| {
            if let StopReason::Failed(e) = reason {
                s.borrow_mut().push(e.to_string());
            }
        });
        match kb.listen() {
            Err(KeyboardError::Callback(e)) => assert_eq!(e.to_string(), "boom"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(*seen.borrow(), vec!["boom"]);
        assert_eq!(kb.terminal().enter_count(), kb.terminal().leave_count());
    }

    // ── Start & Heartbeat ───────────────────────────────────────────

    #[test]
    fn start_fires_once_before_heartbeat() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().idles(4));
        kb.config_mut().heartbeat_interval = Duration::from_secs(3600);
        let c = Rc::clone(&calls);
        kb.on_start(move |_| {
            c.borrow_mut().push("start".into());
            Ok(())
        });
        let c = Rc::clone(&calls);
        kb.on_heartbeat(move |_| {
            c.borrow_mut().push("beat".into());
            Ok(())
        });
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["start", "beat"]);
    }

    #[test]
    fn zero_interval_disables_heartbeat() {
        let beats = Rc::new(Cell::new(0));
        let mut kb = keyboard(ScriptedTerminal::new().idles(3));
        kb.config_mut().heartbeat_interval = Duration::ZERO;
        let b = Rc::clone(&beats);
        kb.on_heartbeat(move |_| {
            b.set(b.get() + 1);
            Ok(())
        });
        kb.listen().unwrap();
        assert_eq!(beats.get(), 0);
    }

    #[test]
    fn start_waits_for_idle() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().bytes("a").idle());
        kb.on_input(recorder(&calls, "in"));
        let c = Rc::clone(&calls);
        kb.on_start(move |_| {
            c.borrow_mut().push("start".into());
            Ok(())
        });
        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["in:a", "start"]);
    }

    #[test]
    fn start_can_stop_the_loop() {
        let mut kb = keyboard(ScriptedTerminal::new().idle().bytes("left over"));
        kb.on_start(|control| {
            control.stop();
            Ok(())
        });
        kb.listen().unwrap();
        assert_eq!(kb.terminal().remaining(), 1);
    }

    #[test]
    fn heartbeat_secs_round_to_millis() {
        let config = KeyboardConfig::default().with_heartbeat_secs(0.12345);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(123));
        let config = KeyboardConfig::default().with_heartbeat_secs(-1.0);
        assert!(config.heartbeat_interval.is_zero());
    }

    // ── Pause ───────────────────────────────────────────────────────

    #[test]
    fn pause_runs_on_stop_then_resume_without_stop_listener() {
        let calls = log();
        let mut kb = keyboard(ScriptedTerminal::new().idle().bytes("p").idle().idle());

        let c = Rc::clone(&calls);
        kb.on_start(move |_| {
            c.borrow_mut().push("start".into());
            Ok(())
        });
        let c = Rc::clone(&calls);
        kb.on_stop(move |reason| c.borrow_mut().push(format!("stop:{reason:?}")));

        let c = Rc::clone(&calls);
        let pauser = Listener::new(move |_, control| {
            let on_stop = Rc::clone(&c);
            let on_start = Rc::clone(&c);
            control.pause_with(
                move || {
                    on_stop.borrow_mut().push("paused".into());
                    42
                },
                move |value, _| {
                    on_start.borrow_mut().push(format!("resumed:{value}"));
                    Ok(())
                },
            );
            Ok(())
        });
        kb.on_hotkey(['p'], &pauser);

        kb.listen().unwrap();
        assert_eq!(*calls.borrow(), vec!["start", "paused", "resumed:42", "stop:Stopped"]);
        assert_eq!(kb.terminal().enter_count(), 2);
        assert_eq!(kb.terminal().leave_count(), 2);
    }

    #[test]
    fn pause_without_resume_callback() {
        let mut kb = keyboard(ScriptedTerminal::new().bytes("p"));
        let pauses = Rc::new(Cell::new(0));
        let p = Rc::clone(&pauses);
        kb.on_hotkey(
            ['p'],
            &Listener::new(move |_, control| {
                let p = Rc::clone(&p);
                control.pause(move || p.set(p.get() + 1));
                Ok(())
            }),
        );
        kb.listen().unwrap();
        assert_eq!(pauses.get(), 1);
        assert_eq!(kb.terminal().leave_count(), 2);
    }

    #[test]
    fn start_fires_again_after_plain_pause() {
        let mut kb = keyboard(ScriptedTerminal::new().idle().bytes("p").idle().idle());
        let starts = Rc::new(Cell::new(0));
        let counter = Rc::clone(&starts);
        kb.on_start(move |_| {
            counter.set(counter.get() + 1);
            Ok(())
        });
        kb.on_hotkey(
            ['p'],
            &Listener::new(|_, control| {
                control.pause(|| ());
                Ok(())
            }),
        );
        kb.listen().unwrap();
        assert_eq!(starts.get(), 2);
    }

    // ── Cursor ──────────────────────────────────────────────────────

    #[test]
    fn cursor_hidden_while_listening() {
        let (output, capture) = Output::memory(true);
        let mut kb = keyboard(ScriptedTerminal::new().bytes("x"));
        kb.attach_output(output);
        kb.listen().unwrap();
        assert_eq!(capture.stdout.contents(), "\x1b[?25l\x1b[?25h");
    }

    #[test]
    fn cursor_shown_while_paused() {
        let (output, capture) = Output::memory(true);
        let mut kb = keyboard(ScriptedTerminal::new().bytes("p"));
        kb.attach_output(output);

        let during = Rc::new(RefCell::new(String::new()));
        let slot = Rc::clone(&during);
        let sink = capture.stdout.clone();
        kb.on_hotkey(
            ['p'],
            &Listener::new(move |_, control| {
                let slot = Rc::clone(&slot);
                let sink = sink.clone();
                control.pause(move || *slot.borrow_mut() = sink.contents());
                Ok(())
            }),
        );
        kb.listen().unwrap();

        assert_eq!(*during.borrow(), "\x1b[?25l\x1b[?25h");
        assert_eq!(capture.stdout.contents(), "\x1b[?25l\x1b[?25h\x1b[?25l\x1b[?25h");
    }

    #[test]
    fn cursor_untouched_on_plain_output() {
        let (output, capture) = Output::memory(false);
        let mut kb = keyboard(ScriptedTerminal::new());
        kb.attach_output(output);
        kb.listen().unwrap();
        assert!(capture.stdout.is_empty());
    }
}
