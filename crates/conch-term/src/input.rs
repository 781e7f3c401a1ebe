// SPDX-License-Identifier: MIT
//
// Raw input decoder: terminal bytes to named key events.
//
// Handles what a terminal sends in raw mode without any extended protocols
// enabled:
//
// - CSI sequences (`ESC [`) for arrows, F5-F12, and the editing keys
// - SS3 sequences (`ESC O`) for F1-F4 and application-mode arrows
// - Single control bytes: Ctrl-C, Tab, Enter, Backspace, lone Escape
// - Everything else as runs of literal UTF-8 text
//
// # Design
//
// Reads in raw mode arrive in arbitrary chunks, so a sequence like `ESC [ 1 5 ~`
// can be split across two `read()` calls. The decoder keeps a pending byte
// buffer: an escape sequence that has started but not finished waits there
// for the next `feed`. If no more bytes arrive (the next poll is idle), the
// caller calls `flush`, which turns a lone ESC into the Escape key and any
// other leftover into literal text.
//
// Printable bytes accumulate into a single text event until a control byte or
// the end of the chunk. A multi-byte UTF-8 character cut in half by the chunk
// boundary is held back until its remaining bytes arrive.

use std::fmt;

// ─── Key ────────────────────────────────────────────────────────────────────

/// A decoded key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// Literal text, one or more characters typed (or pasted) together.
    Text(String),
    Up,
    Down,
    Left,
    Right,
    /// Function key F1..=F12.
    F(u8),
    Enter,
    Esc,
    Tab,
    Space,
    Backspace,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    /// Ctrl-C. Ends the keyboard loop instead of being dispatched.
    Exit,
    /// An escape sequence or control byte with no name, in caret notation.
    Unknown(String),
}

impl Key {
    /// Literal-text key, for binding hotkeys to characters.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

impl From<char> for Key {
    fn from(ch: char) -> Self {
        Self::Text(ch.to_string())
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Unknown(s) => f.write_str(s),
            Self::F(n) => write!(f, "F{n}"),
            Self::Up => f.write_str("Up"),
            Self::Down => f.write_str("Down"),
            Self::Left => f.write_str("Left"),
            Self::Right => f.write_str("Right"),
            Self::Enter => f.write_str("Enter"),
            Self::Esc => f.write_str("Esc"),
            Self::Tab => f.write_str("Tab"),
            Self::Space => f.write_str("Space"),
            Self::Backspace => f.write_str("Backspace"),
            Self::Insert => f.write_str("Insert"),
            Self::Delete => f.write_str("Delete"),
            Self::Home => f.write_str("Home"),
            Self::End => f.write_str("End"),
            Self::PageUp => f.write_str("PageUp"),
            Self::PageDown => f.write_str("PageDown"),
            Self::Exit => f.write_str("Exit"),
        }
    }
}

/// A key plus the characters it would show if echoed.
///
/// Escape sequences show in caret notation (`^[[A` for Up), Backspace shows
/// nothing, and text shows itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub visible: String,
}

impl KeyEvent {
    /// Build an event with `key`'s default visible characters.
    #[must_use]
    pub fn new(key: Key) -> Self {
        let visible = match &key {
            Key::Text(s) => s.clone(),
            Key::Space => " ".to_owned(),
            Key::Tab => "\t".to_owned(),
            Key::Enter => "\n".to_owned(),
            Key::Esc => CARET_ESC.to_owned(),
            _ => String::new(),
        };
        Self { key, visible }
    }

    /// Event for a recognised escape sequence `code` (bytes after ESC).
    fn sequence(key: Key, code: &[u8]) -> Self {
        Self {
            key,
            visible: caret(code),
        }
    }

    /// Whether the event is printable input rather than a control key.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        matches!(self.key, Key::Text(_) | Key::Space | Key::Tab | Key::Enter)
    }
}

const ESC: u8 = 0x1b;
const CARET_ESC: &str = "^[";

/// `^[` followed by the sequence body.
fn caret(code: &[u8]) -> String {
    let mut s = String::from(CARET_ESC);
    s.push_str(&String::from_utf8_lossy(code));
    s
}

// ─── Sequence Table ─────────────────────────────────────────────────────────

/// Escape sequences by the bytes that follow ESC.
#[rustfmt::skip]
static SEQUENCES: &[(&[u8], Key)] = &[
    (b"OP", Key::F(1)),    (b"OQ", Key::F(2)),    (b"OR", Key::F(3)),    (b"OS", Key::F(4)),
    (b"[15~", Key::F(5)),  (b"[17~", Key::F(6)),  (b"[18~", Key::F(7)),  (b"[19~", Key::F(8)),
    (b"[20~", Key::F(9)),  (b"[21~", Key::F(10)), (b"[23~", Key::F(11)), (b"[24~", Key::F(12)),
    (b"[A", Key::Up),      (b"[B", Key::Down),    (b"[C", Key::Right),   (b"[D", Key::Left),
    (b"OA", Key::Up),      (b"OB", Key::Down),    (b"OC", Key::Right),   (b"OD", Key::Left),
    (b"[2~", Key::Insert), (b"[3~", Key::Delete),
    (b"[H", Key::Home),    (b"[F", Key::End),     (b"OH", Key::Home),    (b"OF", Key::End),
    (b"[1~", Key::Home),   (b"[4~", Key::End),
    (b"[5~", Key::PageUp), (b"[6~", Key::PageDown),
];

fn lookup(code: &[u8]) -> Option<Key> {
    SEQUENCES
        .iter()
        .find(|(seq, _)| *seq == code)
        .map(|(_, key)| key.clone())
}

/// Length of the sequence body at the start of `rest` (bytes after ESC).
///
/// `Some(0)` means ESC is not starting a sequence. `None` means the body has
/// started but is not complete yet.
fn sequence_len(rest: &[u8]) -> Option<usize> {
    match rest.first()? {
        b'[' => {
            // CSI: parameter and intermediate bytes, then one final byte.
            for (i, &b) in rest.iter().enumerate().skip(1) {
                match b {
                    0x20..=0x3f => {}
                    0x40..=0x7e => return Some(i + 1),
                    _ => return Some(i),
                }
            }
            None
        }
        b'O' => (rest.len() >= 2).then_some(2),
        _ => Some(0),
    }
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Incremental byte-to-key decoder.
///
/// # Example
///
/// ```
/// use conch_term::input::{Decoder, Key};
///
/// let mut decoder = Decoder::new();
/// assert!(decoder.feed(b"\x1b[").is_empty()); // waits for the rest
/// let events = decoder.feed(b"A");
/// assert_eq!(events[0].key, Key::Up);
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    pending: Vec<u8>,
}

impl Decoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Whether bytes are waiting for a sequence or character to complete.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Decode one complete chunk: feed then flush.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Vec<KeyEvent> {
        let mut decoder = Self::new();
        let mut events = decoder.feed(bytes);
        events.extend(decoder.flush());
        events
    }

    /// Feed a chunk of bytes; returns every event completed by it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<KeyEvent> {
        self.pending.extend_from_slice(bytes);
        let buf = std::mem::take(&mut self.pending);
        let mut events = Vec::new();
        let mut i = 0;

        while i < buf.len() {
            let b = buf[i];
            match b {
                ESC => {
                    let rest = &buf[i + 1..];
                    if rest.is_empty() {
                        break;
                    }
                    match sequence_len(rest) {
                        None => break,
                        Some(0) => {
                            events.push(KeyEvent::new(Key::Esc));
                            i += 1;
                        }
                        Some(n) => {
                            let code = &rest[..n];
                            let key = lookup(code).unwrap_or_else(|| Key::Unknown(caret(code)));
                            events.push(KeyEvent::sequence(key, code));
                            i += 1 + n;
                        }
                    }
                }
                0x03 => {
                    events.push(KeyEvent::new(Key::Exit));
                    i += 1;
                }
                b' ' => {
                    events.push(KeyEvent::new(Key::Space));
                    i += 1;
                }
                0x7f | 0x08 => {
                    events.push(KeyEvent::new(Key::Backspace));
                    i += 1;
                }
                b'\t' => {
                    events.push(KeyEvent::new(Key::Tab));
                    i += 1;
                }
                b'\n' | b'\r' => {
                    events.push(KeyEvent::new(Key::Enter));
                    i += 1;
                }
                0x00..=0x1f => {
                    let name = format!("^{}", char::from(b + 0x40));
                    events.push(KeyEvent {
                        key: Key::Unknown(name),
                        visible: String::new(),
                    });
                    i += 1;
                }
                _ => {
                    let end = buf[i..]
                        .iter()
                        .position(|&b| b <= 0x20 || b == 0x7f)
                        .map_or(buf.len(), |p| i + p);
                    let run = &buf[i..end];
                    let complete = if end == buf.len() { complete_utf8(run) } else { run.len() };
                    if complete > 0 {
                        let text = String::from_utf8_lossy(&run[..complete]).into_owned();
                        events.push(KeyEvent::new(Key::Text(text)));
                    }
                    i += complete;
                    if complete < run.len() {
                        break;
                    }
                }
            }
        }

        self.pending = buf[i..].to_vec();
        events
    }

    /// Resolve whatever is pending, as if no more bytes will follow.
    ///
    /// A lone ESC becomes [`Key::Esc`]. An unfinished sequence or character
    /// is emitted as literal text.
    pub fn flush(&mut self) -> Vec<KeyEvent> {
        let pending = std::mem::take(&mut self.pending);
        match pending.as_slice() {
            [] => Vec::new(),
            [ESC] => vec![KeyEvent::new(Key::Esc)],
            bytes => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                let visible = text.replace('\x1b', CARET_ESC);
                vec![KeyEvent {
                    key: Key::Text(text),
                    visible,
                }]
            }
        }
    }
}

/// Length of the prefix of `run` that does not end in a cut-off character.
///
/// Invalid bytes inside the run are left for lossy decoding; only a
/// truncated tail is held back.
fn complete_utf8(run: &[u8]) -> usize {
    let mut start = 0;
    loop {
        match std::str::from_utf8(&run[start..]) {
            Ok(_) => return run.len(),
            Err(e) => match e.error_len() {
                None => return start + e.valid_up_to(),
                Some(n) => start += e.valid_up_to() + n,
            },
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
