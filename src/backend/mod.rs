//! Console backends.
//!
//! A backend is the thin layer that actually talks to the console surface.
//! Everything above it (session, color tracker, colorized I/O) is written
//! against the [`ConsoleBackend`] trait:
//!
//! - **win32**: forwards to the Windows console and window APIs (Windows only)
//! - **memory**: an in-process console buffer used for tests and for the
//!   headless demo on other platforms
//!
//! # Architecture
//!
//! ```text
//! ColorConsole
//! └── ConsoleSession
//!     ├── StreamBinding (optional std stream rebind)
//!     └── ConsoleBackend
//!         ├── Win32Backend
//!         └── MemoryBackend
//! ```

use std::fmt;
use std::io;

use bitflags::bitflags;
use thiserror::Error;

use crate::color::Palette;

pub mod memory;
#[cfg(windows)]
pub mod win32;

pub use memory::{Faults, MemoryBackend};
#[cfg(windows)]
pub use win32::Win32Backend;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{op} failed: {source}")]
    Os {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{0} failed (injected fault)")]
    Injected(&'static str),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Opaque console window handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Opaque console input/output handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawHandle(pub isize);

/// Standard stream selector
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdStream {
    Input,
    Output,
}

impl fmt::Display for StdStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StdStream::Input => f.write_str("input"),
            StdStream::Output => f.write_str("output"),
        }
    }
}

bitflags! {
    /// Window style bits the session touches (`GWL_STYLE`)
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WindowStyle: u32 {
        const MAXIMIZEBOX = 0x0001_0000;
        const MINIMIZEBOX = 0x0002_0000;
        const THICKFRAME  = 0x0004_0000;
        const SYSMENU     = 0x0008_0000;
        const CAPTION     = 0x00C0_0000;
        const VISIBLE     = 0x1000_0000;
    }
}

bitflags! {
    /// Extended window style bits (`GWL_EXSTYLE`)
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WindowExStyle: u32 {
        const WINDOWEDGE = 0x0000_0100;
        const CLIENTEDGE = 0x0000_0200;
        const APPWINDOW  = 0x0004_0000;
        const LAYERED    = 0x0008_0000;
    }
}

bitflags! {
    /// Console input mode
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct InputMode: u32 {
        const PROCESSED_INPUT = 0x0001;
        const LINE_INPUT      = 0x0002;
        const ECHO_INPUT      = 0x0004;
        const WINDOW_INPUT    = 0x0008;
        const MOUSE_INPUT     = 0x0010;
        const INSERT_MODE     = 0x0020;
        const QUICK_EDIT_MODE = 0x0040;
        const EXTENDED_FLAGS  = 0x0080;
    }
}

/// Character cell coordinate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Coord {
    pub x: i16,
    pub y: i16,
}

impl Coord {
    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }
}

/// Rectangle in cell coordinates, all edges inclusive
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

/// A character with its attribute word
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: u16,
    pub attributes: u16,
}

impl Cell {
    pub const fn blank(attributes: u16) -> Self {
        Self {
            ch: b' ' as u16,
            attributes,
        }
    }
}

/// Screen buffer metadata
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenBufferInfo {
    /// Buffer dimensions in cells
    pub size: Coord,
    pub cursor_position: Coord,
    /// Current attribute word
    pub attributes: u16,
    /// Visible window, inclusive edges
    pub window: Rect,
    pub maximum_window_size: Coord,
    pub popup_attributes: u16,
    pub fullscreen_supported: bool,
    pub palette: Palette,
}

impl ScreenBufferInfo {
    /// Number of cells in the whole buffer
    pub fn area(&self) -> u32 {
        (self.size.x.max(0) as u32) * (self.size.y.max(0) as u32)
    }
}

/// Cursor shape and visibility
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorInfo {
    /// Percentage of the cell filled by the cursor (1-100)
    pub size: u32,
    pub visible: bool,
}

impl Default for CursorInfo {
    fn default() -> Self {
        Self {
            size: 25,
            visible: true,
        }
    }
}

/// The platform console surface.
///
/// Every method is a single call with no retry; failures are reported as
/// [`BackendError`]. Handles are passed explicitly the way the platform API
/// takes them.
pub trait ConsoleBackend {
    /// Allocate a new console for the process
    fn alloc_console(&self) -> Result<()>;
    /// Detach the process from its console
    fn free_console(&self) -> Result<()>;
    /// Window of the attached console, if any
    fn console_window(&self) -> Option<WindowHandle>;
    fn destroy_window(&self, window: WindowHandle) -> Result<()>;
    /// Standard handle, `None` when missing or invalid
    fn std_handle(&self, stream: StdStream) -> Option<RawHandle>;

    /// Current style; `None` when the query fails
    fn window_style(&self, window: WindowHandle) -> Option<WindowStyle>;
    fn set_window_style(&self, window: WindowHandle, style: WindowStyle) -> Result<()>;
    fn window_ex_style(&self, window: WindowHandle) -> Option<WindowExStyle>;
    fn set_window_ex_style(&self, window: WindowHandle, style: WindowExStyle) -> Result<()>;
    /// Force a frame-changed redraw without moving or resizing
    fn refresh_frame(&self, window: WindowHandle) -> Result<()>;
    fn set_visible(&self, window: WindowHandle, visible: bool) -> Result<()>;

    fn input_mode(&self, input: RawHandle) -> Result<InputMode>;
    fn set_input_mode(&self, input: RawHandle, mode: InputMode) -> Result<()>;

    /// Point the process standard input/output at the console.
    ///
    /// Reference counted: nested binds share one binding.
    fn rebind_std_streams(&self) -> Result<()>;
    /// Undo one [`rebind_std_streams`](Self::rebind_std_streams); the last
    /// release restores the previous streams.
    fn restore_std_streams(&self) -> Result<()>;

    /// Read one line (at most `buffer.len()` units); 0 means end of input
    fn read_narrow(&self, input: RawHandle, buffer: &mut [u8]) -> Result<usize>;
    fn read_wide(&self, input: RawHandle, buffer: &mut [u16]) -> Result<usize>;
    fn write_narrow(&self, output: RawHandle, text: &[u8]) -> Result<usize>;
    fn write_wide(&self, output: RawHandle, text: &[u16]) -> Result<usize>;

    fn screen_buffer_info(&self, output: RawHandle) -> Result<ScreenBufferInfo>;
    /// Apply buffer metadata. The window rectangle is taken with exclusive
    /// right/bottom edges, unlike the inclusive one returned by
    /// [`screen_buffer_info`](Self::screen_buffer_info).
    fn set_screen_buffer_info(&self, output: RawHandle, info: &ScreenBufferInfo) -> Result<()>;
    fn set_text_attribute(&self, output: RawHandle, attributes: u16) -> Result<()>;

    fn cursor_info(&self, output: RawHandle) -> Result<CursorInfo>;
    fn set_cursor_info(&self, output: RawHandle, info: CursorInfo) -> Result<()>;
    fn set_cursor_position(&self, output: RawHandle, position: Coord) -> Result<()>;

    /// Move the cells in `scroll` so its top-left lands on `destination`,
    /// filling uncovered cells with `fill`
    fn scroll(&self, output: RawHandle, scroll: Rect, destination: Coord, fill: Cell) -> Result<()>;
    /// Returns the number of cells written
    fn fill_attribute(&self, output: RawHandle, attributes: u16, length: u32, start: Coord) -> Result<u32>;
    fn fill_character(&self, output: RawHandle, ch: u16, length: u32, start: Coord) -> Result<u32>;
}
