//! # conch-widgets: stateful console widgets
//!
//! Line-oriented widgets built from the terminal core and the style engine.
//! None of them owns the screen: each remembers the plain text of the block
//! it printed last and redraws by reverting exactly those rows.
//!
//! # Architecture
//!
//! ```text
//! RichText   markup → stdout (streamed), remembers the last clearable block
//!     │
//!     ├── Overwrite  %placeholder% template + data map, redrawn on update
//!     │
//!     ├── Progress   fixed or custom format, bar sized to the terminal
//!     │
//!     └── Menu       radio / checkbox list driven by the keyboard loop
//! ```
//!
//! Every widget writes through a shared [`conch_term::Output`] handle, so
//! tests run them against in-memory sinks and a scripted terminal.

pub mod error;
pub mod format;
pub mod menu;
pub mod overwrite;
pub mod progress;
pub mod rich_text;

pub use error::WidgetError;
pub use format::{format_duration, format_memory};
pub use menu::Menu;
pub use overwrite::Overwrite;
pub use progress::{BarChar, Format, Progress};
pub use rich_text::RichText;
