// SPDX-License-Identifier: MIT
//
// conch-term: the terminal half of the conch toolkit.
//
// Everything a line-oriented terminal program needs below the level of
// styles and widgets: measuring how wide text is on screen, writing to
// stdout/stderr with per-stream ANSI detection, erasing and redrawing blocks
// in place, and reading raw keys without line buffering.
//
// There is no cell grid and no alternate screen. Output scrolls like any
// other CLI; live widgets redraw by reverting the rows they printed last.

pub mod ansi;
pub mod input;
pub mod keyboard;
pub mod output;
pub mod screen;
pub mod terminal;
pub mod width;

pub use input::{Decoder, Key, KeyEvent};
pub use keyboard::{
    BoxError, CallbackResult, Control, HotkeyTable, Keyboard, KeyboardConfig, KeyboardError,
    Listener, LoopState, StopReason,
};
pub use output::{Capture, MemorySink, Output, Target};
pub use screen::{Screen, Snapshot, WidthMode};
pub use terminal::{
    ReadStatus, ScriptedTerminal, Size, StdinTerminal, TerminalControl, resident_memory,
};
pub use width::{Align, WidthError};
