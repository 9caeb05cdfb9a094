//! Headless console backend
//!
//! Keeps a full screen buffer (cells + attributes), palette, cursor and
//! window state in memory. Clones share the same console, the way every
//! handle in a process refers to the one attached console.
//!
//! Used by the test suite and by the demo on platforms without a Win32
//! console. Individual operations can be made to fail with [`Faults`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use bitflags::bitflags;

use super::{
    BackendError, Cell, ConsoleBackend, Coord, CursorInfo, InputMode, RawHandle, Rect, Result,
    ScreenBufferInfo, StdStream, WindowExStyle, WindowHandle, WindowStyle,
};
use crate::color::{Palette, Rgb};

/// Gray on black
pub const DEFAULT_ATTRIBUTES: u16 = 0x07;

const WINDOW: WindowHandle = WindowHandle(0x0002_04A6);
const INPUT: RawHandle = RawHandle(0x50);
const OUTPUT: RawHandle = RawHandle(0x54);

/// Legacy console palette in console color order
const DEFAULT_PALETTE: Palette = [
    Rgb::new(0x00, 0x00, 0x00),
    Rgb::new(0x00, 0x00, 0x80),
    Rgb::new(0x00, 0x80, 0x00),
    Rgb::new(0x00, 0x80, 0x80),
    Rgb::new(0x80, 0x00, 0x00),
    Rgb::new(0x80, 0x00, 0x80),
    Rgb::new(0x80, 0x80, 0x00),
    Rgb::new(0xC0, 0xC0, 0xC0),
    Rgb::new(0x80, 0x80, 0x80),
    Rgb::new(0x00, 0x00, 0xFF),
    Rgb::new(0x00, 0xFF, 0x00),
    Rgb::new(0x00, 0xFF, 0xFF),
    Rgb::new(0xFF, 0x00, 0x00),
    Rgb::new(0xFF, 0x00, 0xFF),
    Rgb::new(0xFF, 0xFF, 0x00),
    Rgb::new(0xFF, 0xFF, 0xFF),
];

bitflags! {
    /// Operations forced to fail
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Faults: u32 {
        const ALLOC           = 1 << 0;
        const FREE            = 1 << 1;
        const DESTROY         = 1 << 2;
        const WINDOW_STYLE    = 1 << 3;
        const SHOW            = 1 << 4;
        const INPUT_MODE      = 1 << 5;
        const STREAMS         = 1 << 6;
        const READ            = 1 << 7;
        const WRITE           = 1 << 8;
        const BUFFER_INFO     = 1 << 9;
        const SET_BUFFER_INFO = 1 << 10;
        const TEXT_ATTRIBUTE  = 1 << 11;
        const CURSOR          = 1 << 12;
        const SCROLL          = 1 << 13;
        const FILL            = 1 << 14;
        /// Writes accept only the first half of their text
        const SHORT_WRITE     = 1 << 15;
    }
}

struct MemoryConsole {
    attached: bool,
    cols: i16,
    rows: i16,
    cells: Vec<Cell>,
    attributes: u16,
    cursor: Coord,
    cursor_info: CursorInfo,
    palette: Palette,
    window_rect: Rect,
    style: WindowStyle,
    ex_style: WindowExStyle,
    visible: bool,
    frame_refreshes: usize,
    input_mode: InputMode,
    stream_refs: usize,
    input: VecDeque<char>,
    output: String,
    writes: Vec<(u16, String)>,
    faults: Faults,
}

impl MemoryConsole {
    fn new(cols: i16, rows: i16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            attached: false,
            cols,
            rows,
            cells: vec![Cell::blank(DEFAULT_ATTRIBUTES); cols as usize * rows as usize],
            attributes: DEFAULT_ATTRIBUTES,
            cursor: Coord::default(),
            cursor_info: CursorInfo::default(),
            palette: DEFAULT_PALETTE,
            window_rect: Rect {
                left: 0,
                top: 0,
                right: cols - 1,
                bottom: rows - 1,
            },
            style: WindowStyle::CAPTION
                | WindowStyle::SYSMENU
                | WindowStyle::THICKFRAME
                | WindowStyle::MINIMIZEBOX
                | WindowStyle::MAXIMIZEBOX
                | WindowStyle::VISIBLE,
            ex_style: WindowExStyle::WINDOWEDGE | WindowExStyle::APPWINDOW,
            visible: true,
            frame_refreshes: 0,
            input_mode: InputMode::PROCESSED_INPUT
                | InputMode::LINE_INPUT
                | InputMode::ECHO_INPUT
                | InputMode::MOUSE_INPUT
                | InputMode::EXTENDED_FLAGS,
            stream_refs: 0,
            input: VecDeque::new(),
            output: String::new(),
            writes: Vec::new(),
            faults: Faults::empty(),
        }
    }

    fn check(&self, fault: Faults, op: &'static str) -> Result<()> {
        if self.faults.intersects(fault) {
            return Err(BackendError::Injected(op));
        }
        Ok(())
    }

    /// How much of a write of `len` units goes through
    fn accepted(&self, len: usize) -> usize {
        if self.faults.contains(Faults::SHORT_WRITE) {
            len / 2
        } else {
            len
        }
    }

    fn check_window(&self, window: WindowHandle, op: &'static str) -> Result<()> {
        if !self.attached || window != WINDOW {
            return Err(invalid(op, "invalid window handle"));
        }
        Ok(())
    }

    fn check_handle(&self, handle: RawHandle, expected: RawHandle, op: &'static str) -> Result<()> {
        if !self.attached || handle != expected {
            return Err(invalid(op, "invalid handle"));
        }
        Ok(())
    }

    fn index(&self, at: Coord) -> Option<usize> {
        if at.x < 0 || at.y < 0 || at.x >= self.cols || at.y >= self.rows {
            return None;
        }
        Some(at.y as usize * self.cols as usize + at.x as usize)
    }

    fn info(&self) -> ScreenBufferInfo {
        ScreenBufferInfo {
            size: Coord::new(self.cols, self.rows),
            cursor_position: self.cursor,
            attributes: self.attributes,
            window: self.window_rect,
            maximum_window_size: Coord::new(self.cols, self.rows),
            popup_attributes: 0xF5,
            fullscreen_supported: false,
            palette: self.palette,
        }
    }

    fn resize(&mut self, cols: i16, rows: i16) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        let mut cells = vec![Cell::blank(self.attributes); cols as usize * rows as usize];
        for y in 0..rows.min(self.rows) {
            for x in 0..cols.min(self.cols) {
                let from = y as usize * self.cols as usize + x as usize;
                cells[y as usize * cols as usize + x as usize] = self.cells[from];
            }
        }
        self.cells = cells;
        self.cols = cols;
        self.rows = rows;
        self.cursor.x = self.cursor.x.min(cols - 1);
        self.cursor.y = self.cursor.y.min(rows - 1);
    }

    fn linefeed(&mut self) {
        if self.cursor.y + 1 < self.rows {
            self.cursor.y += 1;
            return;
        }
        // Bottom row: scroll the buffer up by one line
        let cols = self.cols as usize;
        self.cells.drain(..cols);
        let blank = Cell::blank(self.attributes);
        self.cells.extend(std::iter::repeat(blank).take(cols));
    }

    fn put_str(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => {
                    self.cursor.x = 0;
                    self.linefeed();
                }
                '\r' => self.cursor.x = 0,
                _ => {
                    let mut units = [0u16; 2];
                    for unit in ch.encode_utf16(&mut units).iter() {
                        if self.cursor.x >= self.cols {
                            self.cursor.x = 0;
                            self.linefeed();
                        }
                        if let Some(i) = self.index(self.cursor) {
                            self.cells[i] = Cell {
                                ch: *unit,
                                attributes: self.attributes,
                            };
                        }
                        self.cursor.x += 1;
                    }
                }
            }
        }
        self.output.push_str(text);
        self.writes.push((self.attributes, text.to_string()));
    }

    /// Pop chars of one line while `fits` accepts them
    fn take_line(&mut self, mut fits: impl FnMut(char) -> bool) -> String {
        let mut line = String::new();
        while let Some(&ch) = self.input.front() {
            if !fits(ch) {
                break;
            }
            self.input.pop_front();
            line.push(ch);
            if ch == '\n' {
                break;
            }
        }
        line
    }
}

fn invalid(op: &'static str, message: &'static str) -> BackendError {
    BackendError::Os {
        op,
        source: io::Error::new(io::ErrorKind::InvalidInput, message),
    }
}

/// In-memory console shared between clones
#[derive(Clone)]
pub struct MemoryBackend {
    console: Rc<RefCell<MemoryConsole>>,
}

impl MemoryBackend {
    /// Process without a console; `alloc_console` creates one
    pub fn new(cols: i16, rows: i16) -> Self {
        Self {
            console: Rc::new(RefCell::new(MemoryConsole::new(cols, rows))),
        }
    }

    /// Process that already has a console attached
    pub fn attached(cols: i16, rows: i16) -> Self {
        let backend = Self::new(cols, rows);
        backend.console.borrow_mut().attached = true;
        backend
    }

    /// Make the given operations fail until [`heal`](Self::heal)
    pub fn inject(&self, faults: Faults) {
        self.console.borrow_mut().faults |= faults;
    }

    pub fn heal(&self) {
        self.console.borrow_mut().faults = Faults::empty();
    }

    /// Queue text for subsequent reads
    pub fn push_input(&self, text: &str) {
        self.console.borrow_mut().input.extend(text.chars());
    }

    /// Everything written so far
    pub fn output(&self) -> String {
        self.console.borrow().output.clone()
    }

    /// Every write with the attribute word it was written in
    pub fn writes(&self) -> Vec<(u16, String)> {
        self.console.borrow().writes.clone()
    }

    pub fn cell(&self, at: Coord) -> Option<Cell> {
        let console = self.console.borrow();
        console.index(at).map(|i| console.cells[i])
    }

    /// Characters of row `y`, trailing blanks trimmed
    pub fn row_text(&self, y: i16) -> String {
        let console = self.console.borrow();
        let cols = console.cols as usize;
        if y < 0 || y >= console.rows {
            return String::new();
        }
        let start = y as usize * cols;
        let units: Vec<u16> = console.cells[start..start + cols].iter().map(|c| c.ch).collect();
        String::from_utf16_lossy(&units).trim_end().to_string()
    }

    pub fn is_attached(&self) -> bool {
        self.console.borrow().attached
    }

    pub fn attributes(&self) -> u16 {
        self.console.borrow().attributes
    }

    pub fn palette(&self) -> Palette {
        self.console.borrow().palette
    }

    pub fn cursor_position(&self) -> Coord {
        self.console.borrow().cursor
    }

    pub fn style(&self) -> WindowStyle {
        self.console.borrow().style
    }

    pub fn ex_style(&self) -> WindowExStyle {
        self.console.borrow().ex_style
    }

    pub fn mode(&self) -> InputMode {
        self.console.borrow().input_mode
    }

    pub fn is_visible(&self) -> bool {
        self.console.borrow().visible
    }

    pub fn frame_refreshes(&self) -> usize {
        self.console.borrow().frame_refreshes
    }

    /// Outstanding standard stream bindings
    pub fn stream_refs(&self) -> usize {
        self.console.borrow().stream_refs
    }
}

impl ConsoleBackend for MemoryBackend {
    fn alloc_console(&self) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::ALLOC, "AllocConsole")?;
        if console.attached {
            return Err(BackendError::Os {
                op: "AllocConsole",
                source: io::Error::new(io::ErrorKind::AlreadyExists, "process already has a console"),
            });
        }
        console.attached = true;
        console.visible = true;
        Ok(())
    }

    fn free_console(&self) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::FREE, "FreeConsole")?;
        if !console.attached {
            return Err(invalid("FreeConsole", "no console attached"));
        }
        console.attached = false;
        Ok(())
    }

    fn console_window(&self) -> Option<WindowHandle> {
        self.console.borrow().attached.then_some(WINDOW)
    }

    fn destroy_window(&self, window: WindowHandle) -> Result<()> {
        let console = self.console.borrow();
        console.check(Faults::DESTROY, "DestroyWindow")?;
        if window != WINDOW {
            return Err(invalid("DestroyWindow", "invalid window handle"));
        }
        Ok(())
    }

    fn std_handle(&self, stream: StdStream) -> Option<RawHandle> {
        let console = self.console.borrow();
        if !console.attached {
            return None;
        }
        match stream {
            StdStream::Input => Some(INPUT),
            StdStream::Output => Some(OUTPUT),
        }
    }

    fn window_style(&self, window: WindowHandle) -> Option<WindowStyle> {
        let console = self.console.borrow();
        console.check(Faults::WINDOW_STYLE, "GetWindowLong").ok()?;
        console.check_window(window, "GetWindowLong").ok()?;
        Some(console.style)
    }

    fn set_window_style(&self, window: WindowHandle, style: WindowStyle) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::WINDOW_STYLE, "SetWindowLong")?;
        console.check_window(window, "SetWindowLong")?;
        console.style = style;
        Ok(())
    }

    fn window_ex_style(&self, window: WindowHandle) -> Option<WindowExStyle> {
        let console = self.console.borrow();
        console.check(Faults::WINDOW_STYLE, "GetWindowLong").ok()?;
        console.check_window(window, "GetWindowLong").ok()?;
        Some(console.ex_style)
    }

    fn set_window_ex_style(&self, window: WindowHandle, style: WindowExStyle) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::WINDOW_STYLE, "SetWindowLong")?;
        console.check_window(window, "SetWindowLong")?;
        console.ex_style = style;
        Ok(())
    }

    fn refresh_frame(&self, window: WindowHandle) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check_window(window, "SetWindowPos")?;
        console.frame_refreshes += 1;
        Ok(())
    }

    fn set_visible(&self, window: WindowHandle, visible: bool) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::SHOW, "ShowWindow")?;
        console.check_window(window, "ShowWindow")?;
        console.visible = visible;
        Ok(())
    }

    fn input_mode(&self, input: RawHandle) -> Result<InputMode> {
        let console = self.console.borrow();
        console.check(Faults::INPUT_MODE, "GetConsoleMode")?;
        console.check_handle(input, INPUT, "GetConsoleMode")?;
        Ok(console.input_mode)
    }

    fn set_input_mode(&self, input: RawHandle, mode: InputMode) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::INPUT_MODE, "SetConsoleMode")?;
        console.check_handle(input, INPUT, "SetConsoleMode")?;
        console.input_mode = mode;
        Ok(())
    }

    fn rebind_std_streams(&self) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::STREAMS, "SetStdHandle")?;
        if !console.attached {
            return Err(invalid("SetStdHandle", "no console attached"));
        }
        console.stream_refs += 1;
        Ok(())
    }

    fn restore_std_streams(&self) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::STREAMS, "SetStdHandle")?;
        if console.stream_refs == 0 {
            return Err(invalid("SetStdHandle", "standard streams are not bound"));
        }
        console.stream_refs -= 1;
        Ok(())
    }

    fn read_narrow(&self, input: RawHandle, buffer: &mut [u8]) -> Result<usize> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::READ, "ReadConsoleA")?;
        console.check_handle(input, INPUT, "ReadConsoleA")?;
        let mut room = buffer.len();
        let line = console.take_line(|ch| {
            let fits = ch.len_utf8() <= room;
            if fits {
                room -= ch.len_utf8();
            }
            fits
        });
        buffer[..line.len()].copy_from_slice(line.as_bytes());
        Ok(line.len())
    }

    fn read_wide(&self, input: RawHandle, buffer: &mut [u16]) -> Result<usize> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::READ, "ReadConsoleW")?;
        console.check_handle(input, INPUT, "ReadConsoleW")?;
        let mut room = buffer.len();
        let line = console.take_line(|ch| {
            let fits = ch.len_utf16() <= room;
            if fits {
                room -= ch.len_utf16();
            }
            fits
        });
        let mut count = 0;
        for unit in line.encode_utf16() {
            buffer[count] = unit;
            count += 1;
        }
        Ok(count)
    }

    fn write_narrow(&self, output: RawHandle, text: &[u8]) -> Result<usize> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::WRITE, "WriteConsoleA")?;
        console.check_handle(output, OUTPUT, "WriteConsoleA")?;
        let accepted = console.accepted(text.len());
        console.put_str(&String::from_utf8_lossy(&text[..accepted]));
        Ok(accepted)
    }

    fn write_wide(&self, output: RawHandle, text: &[u16]) -> Result<usize> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::WRITE, "WriteConsoleW")?;
        console.check_handle(output, OUTPUT, "WriteConsoleW")?;
        let accepted = console.accepted(text.len());
        console.put_str(&String::from_utf16_lossy(&text[..accepted]));
        Ok(accepted)
    }

    fn screen_buffer_info(&self, output: RawHandle) -> Result<ScreenBufferInfo> {
        let console = self.console.borrow();
        console.check(Faults::BUFFER_INFO, "GetConsoleScreenBufferInfoEx")?;
        console.check_handle(output, OUTPUT, "GetConsoleScreenBufferInfoEx")?;
        Ok(console.info())
    }

    fn set_screen_buffer_info(&self, output: RawHandle, info: &ScreenBufferInfo) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::SET_BUFFER_INFO, "SetConsoleScreenBufferInfoEx")?;
        console.check_handle(output, OUTPUT, "SetConsoleScreenBufferInfoEx")?;
        if info.size.x <= 0 || info.size.y <= 0 {
            return Err(invalid("SetConsoleScreenBufferInfoEx", "invalid buffer size"));
        }
        if info.size != Coord::new(console.cols, console.rows) {
            console.resize(info.size.x, info.size.y);
        }
        console.attributes = info.attributes;
        console.palette = info.palette;
        console.cursor = Coord::new(
            info.cursor_position.x.clamp(0, console.cols - 1),
            info.cursor_position.y.clamp(0, console.rows - 1),
        );
        // Incoming rectangle is exclusive on the right/bottom edges
        console.window_rect = Rect {
            left: info.window.left,
            top: info.window.top,
            right: info.window.right - 1,
            bottom: info.window.bottom - 1,
        };
        Ok(())
    }

    fn set_text_attribute(&self, output: RawHandle, attributes: u16) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::TEXT_ATTRIBUTE, "SetConsoleTextAttribute")?;
        console.check_handle(output, OUTPUT, "SetConsoleTextAttribute")?;
        console.attributes = attributes;
        Ok(())
    }

    fn cursor_info(&self, output: RawHandle) -> Result<CursorInfo> {
        let console = self.console.borrow();
        console.check(Faults::CURSOR, "GetConsoleCursorInfo")?;
        console.check_handle(output, OUTPUT, "GetConsoleCursorInfo")?;
        Ok(console.cursor_info)
    }

    fn set_cursor_info(&self, output: RawHandle, info: CursorInfo) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::CURSOR, "SetConsoleCursorInfo")?;
        console.check_handle(output, OUTPUT, "SetConsoleCursorInfo")?;
        if info.size == 0 || info.size > 100 {
            return Err(invalid("SetConsoleCursorInfo", "cursor size out of range"));
        }
        console.cursor_info = info;
        Ok(())
    }

    fn set_cursor_position(&self, output: RawHandle, position: Coord) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::CURSOR, "SetConsoleCursorPosition")?;
        console.check_handle(output, OUTPUT, "SetConsoleCursorPosition")?;
        if console.index(position).is_none() {
            return Err(invalid("SetConsoleCursorPosition", "position outside the buffer"));
        }
        console.cursor = position;
        Ok(())
    }

    fn scroll(&self, output: RawHandle, scroll: Rect, destination: Coord, fill: Cell) -> Result<()> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::SCROLL, "ScrollConsoleScreenBuffer")?;
        console.check_handle(output, OUTPUT, "ScrollConsoleScreenBuffer")?;

        let left = scroll.left.max(0);
        let top = scroll.top.max(0);
        let right = scroll.right.min(console.cols - 1);
        let bottom = scroll.bottom.min(console.rows - 1);
        if left > right || top > bottom {
            return Ok(());
        }

        let mut moved = Vec::new();
        for y in top..=bottom {
            for x in left..=right {
                if let Some(i) = console.index(Coord::new(x, y)) {
                    moved.push((x, y, console.cells[i]));
                    console.cells[i] = fill;
                }
            }
        }
        for (x, y, cell) in moved {
            let target = Coord::new(x - left + destination.x, y - top + destination.y);
            if let Some(i) = console.index(target) {
                console.cells[i] = cell;
            }
        }
        Ok(())
    }

    fn fill_attribute(&self, output: RawHandle, attributes: u16, length: u32, start: Coord) -> Result<u32> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::FILL, "FillConsoleOutputAttribute")?;
        console.check_handle(output, OUTPUT, "FillConsoleOutputAttribute")?;
        let first = console
            .index(start)
            .ok_or_else(|| invalid("FillConsoleOutputAttribute", "start outside the buffer"))?;
        let end = (first + length as usize).min(console.cells.len());
        for cell in &mut console.cells[first..end] {
            cell.attributes = attributes;
        }
        Ok((end - first) as u32)
    }

    fn fill_character(&self, output: RawHandle, ch: u16, length: u32, start: Coord) -> Result<u32> {
        let mut console = self.console.borrow_mut();
        console.check(Faults::FILL, "FillConsoleOutputCharacter")?;
        console.check_handle(output, OUTPUT, "FillConsoleOutputCharacter")?;
        let first = console
            .index(start)
            .ok_or_else(|| invalid("FillConsoleOutputCharacter", "start outside the buffer"))?;
        let end = (first + length as usize).min(console.cells.len());
        for cell in &mut console.cells[first..end] {
            cell.ch = ch;
        }
        Ok((end - first) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_free() {
        let backend = MemoryBackend::new(80, 25);
        assert!(backend.console_window().is_none());
        assert!(backend.std_handle(StdStream::Output).is_none());

        backend.alloc_console().unwrap();
        assert!(backend.console_window().is_some());
        assert!(backend.alloc_console().is_err(), "second console must be refused");

        backend.free_console().unwrap();
        assert!(backend.console_window().is_none());
    }

    #[test]
    fn test_write_wraps_and_scrolls() {
        let backend = MemoryBackend::attached(4, 2);
        let out = backend.std_handle(StdStream::Output).unwrap();

        backend.write_narrow(out, b"abcdef").unwrap();
        assert_eq!(backend.row_text(0), "abcd");
        assert_eq!(backend.row_text(1), "ef");

        backend.write_narrow(out, b"\nxy").unwrap();
        assert_eq!(backend.row_text(0), "ef");
        assert_eq!(backend.row_text(1), "xy");
    }

    #[test]
    fn test_read_stops_at_newline_and_capacity() {
        let backend = MemoryBackend::attached(80, 25);
        let input = backend.std_handle(StdStream::Input).unwrap();
        backend.push_input("hello\nworld\n");

        let mut buffer = [0u8; 3];
        assert_eq!(backend.read_narrow(input, &mut buffer).unwrap(), 3);
        assert_eq!(&buffer, b"hel");

        let mut buffer = [0u16; 16];
        let n = backend.read_wide(input, &mut buffer).unwrap();
        assert_eq!(String::from_utf16_lossy(&buffer[..n]), "lo\n");

        let mut buffer = [0u8; 16];
        let n = backend.read_narrow(input, &mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"world\n");
        assert_eq!(backend.read_narrow(input, &mut buffer).unwrap(), 0);
    }

    #[test]
    fn test_scroll_off_screen_fills() {
        let backend = MemoryBackend::attached(4, 2);
        let out = backend.std_handle(StdStream::Output).unwrap();
        backend.write_narrow(out, b"abcdefgh").unwrap();

        let whole = Rect { left: 0, top: 0, right: 4, bottom: 2 };
        backend.scroll(out, whole, Coord::new(0, -2), Cell::blank(0x1F)).unwrap();

        assert_eq!(backend.row_text(0), "");
        assert_eq!(backend.cell(Coord::new(3, 1)), Some(Cell::blank(0x1F)));
    }

    #[test]
    fn test_set_buffer_info_takes_exclusive_window() {
        let backend = MemoryBackend::attached(80, 25);
        let out = backend.std_handle(StdStream::Output).unwrap();
        let mut info = backend.screen_buffer_info(out).unwrap();
        info.window.right += 1;
        info.window.bottom += 1;
        backend.set_screen_buffer_info(out, &info).unwrap();

        let info = backend.screen_buffer_info(out).unwrap();
        assert_eq!(info.window, Rect { left: 0, top: 0, right: 79, bottom: 24 });
    }

    #[test]
    fn test_injected_fault() {
        let backend = MemoryBackend::attached(80, 25);
        let out = backend.std_handle(StdStream::Output).unwrap();
        backend.inject(Faults::WRITE);
        assert!(matches!(
            backend.write_narrow(out, b"x"),
            Err(BackendError::Injected("WriteConsoleA"))
        ));
        backend.heal();
        assert!(backend.write_narrow(out, b"x").is_ok());
    }

    #[test]
    fn test_short_write() {
        let backend = MemoryBackend::attached(80, 25);
        let out = backend.std_handle(StdStream::Output).unwrap();
        backend.inject(Faults::SHORT_WRITE);
        assert_eq!(backend.write_narrow(out, b"abcd").unwrap(), 2);
        let wide: Vec<u16> = "wxyz".encode_utf16().collect();
        assert_eq!(backend.write_wide(out, &wide).unwrap(), 2);
        assert_eq!(backend.output(), "abwx");
    }
}
