//! Widget errors.

use std::io;

use conch_style::StyleError;
use conch_term::{KeyboardError, WidthError};
use thiserror::Error;

/// Everything a widget operation can fail with.
#[derive(Debug, Error)]
pub enum WidgetError {
    #[error(transparent)]
    Style(#[from] StyleError),

    #[error(transparent)]
    Width(#[from] WidthError),

    #[error(transparent)]
    Keyboard(#[from] KeyboardError),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// An update arrived before `start()` gave the widget a format.
    #[error("{0} updated before start()")]
    NotStarted(&'static str),

    /// A menu needs at least one option.
    #[error("menu has no options")]
    EmptyOptions,

    /// Progress totals start at 1.
    #[error("progress total must be at least 1")]
    InvalidTotal,

    /// Not one of `mini`, `normal`, `verbose`, `debug`.
    #[error("unknown progress format {0:?}")]
    UnknownFormat(String),
}
