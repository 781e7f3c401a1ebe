//! # conch-style: styled console text
//!
//! Everything between "a string with tags" and "bytes with SGR escapes",
//! without touching the terminal.
//!
//! # Architecture
//!
//! ```text
//! "<info>hi <b>there</b></info>"
//!     │
//!     ▼
//! markup.rs:  parse into an Element tree (attributes → explicit Style)
//!     │
//!     ▼
//! theme.rs:   tag name → default Style, cascaded with parent and explicit
//!     │
//!     ▼
//! style.rs:   Style → opening/closing SGR sequences (color.rs codes)
//!     │
//!     ▼
//! Renderer:   String, io::Write sink, or per-run callback
//! ```
//!
//! `template.rs` is separate: `%placeholder%` message templates used by the
//! live-updating widgets.

pub mod color;
pub mod markup;
pub mod style;
pub mod template;
pub mod theme;

pub use color::Color8;
pub use markup::{Element, Node, Renderer, Run, escape, parse, strip_tags};
pub use style::{Modifiers, Style};
pub use template::{Segment, Template};
pub use theme::Theme;

/// Errors from parsing colors and markup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StyleError {
    #[error("unknown color {0:?}")]
    UnknownColor(String),
}
