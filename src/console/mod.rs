//! Console lifecycle and color state.
//!
//! - **session**: `ConsoleSession`, one console surface per instance
//!   (open/close, window chrome, raw read/write)
//! - **streams**: `StreamBinding`, scoped rebind of the process standard
//!   streams to the console
//! - **tracker**: `ColorConsole`, color/cursor state tracking on top of a
//!   session (original/previous pairs, palette snapshot)

use thiserror::Error;

use crate::backend::{BackendError, StdStream};

pub mod session;
pub mod streams;
pub mod tracker;

pub use session::ConsoleSession;
pub use streams::StreamBinding;
pub use tracker::ColorConsole;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("No console is open")]
    NotOpen,

    #[error("Console has no window")]
    NoWindow,

    #[error("Invalid standard {0} handle")]
    InvalidHandle(StdStream),

    #[error("End of input")]
    EndOfInput,

    #[error("Palette index {0} is out of range (0-15)")]
    PaletteIndex(u8),

    #[error("Formatting failed")]
    Format,

    #[error("Input did not match the requested fields")]
    NoMatch,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
