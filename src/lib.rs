//! clrconsole - colored console I/O for Windows
//!
//! Opens and closes a console window, reads and writes text, tracks color
//! and cursor state, and provides colorized `printf`/`scanf`-style helpers
//! that leave the console colors the way they found them.
//!
//! # Modules
//!
//! - **backend**: the console surface ([`backend::ConsoleBackend`]) with a
//!   Win32 implementation and an in-memory one
//! - **color**: colors, color pairs and the attribute word
//! - **console**: session lifecycle and the color/cursor state tracker
//! - **clrio**: colorized formatted print/scan
//! - **config**: `~/.clrconsole/config.toml` and palette schemes
//!
//! # Example
//!
//! ```no_run
//! use clrconsole::backend::MemoryBackend;
//! use clrconsole::color::{Color, ColorPair};
//! use clrconsole::console::ColorConsole;
//! use clrconsole::clrprintf;
//!
//! # fn main() -> clrconsole::console::Result<()> {
//! let backend = MemoryBackend::new(80, 25);
//! let mut console = ColorConsole::new(backend.clone(), true, true);
//! console.open(false)?;
//!
//! clrprintf!(&backend, Color::Cyan, "Hello, ")?;
//! clrprintf!(&backend, ColorPair::new(Color::Green, Color::Red), "World!\n")?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clrio;
pub mod color;
pub mod config;
pub mod console;

pub use color::{Color, ColorPair, Rgb};
pub use console::{ColorConsole, ConsoleError, ConsoleSession};
