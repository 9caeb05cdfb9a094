//! Win32 console backend
//!
//! Direct, one-to-one forwarding to the console and window APIs of the
//! `windows` crate. Handles are converted at the boundary; no state is kept
//! here except the process-wide standard stream binding.

use std::ffi::c_void;
use std::io;
use std::sync::Mutex;

use windows::core::w;
use windows::Win32::Foundation::{
    CloseHandle, BOOL, COLORREF, GENERIC_READ, GENERIC_WRITE, HANDLE, HWND,
};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FILE_FLAGS_AND_ATTRIBUTES, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::Console::{
    AllocConsole, FillConsoleOutputAttribute, FillConsoleOutputCharacterW, FreeConsole,
    GetConsoleCursorInfo, GetConsoleMode, GetConsoleScreenBufferInfoEx, GetConsoleWindow,
    GetStdHandle, ReadConsoleA, ReadConsoleW, ScrollConsoleScreenBufferW, SetConsoleCursorInfo,
    SetConsoleCursorPosition, SetConsoleMode, SetConsoleScreenBufferInfoEx,
    SetConsoleTextAttribute, SetStdHandle, WriteConsoleA, WriteConsoleW, CHAR_INFO, CHAR_INFO_0,
    CONSOLE_CHARACTER_ATTRIBUTES, CONSOLE_CURSOR_INFO, CONSOLE_MODE, CONSOLE_SCREEN_BUFFER_INFOEX,
    COORD, SMALL_RECT, STD_HANDLE, STD_INPUT_HANDLE, STD_OUTPUT_HANDLE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DestroyWindow, GetWindowLongW, SetWindowLongW, SetWindowPos, ShowWindow, GWL_EXSTYLE,
    GWL_STYLE, SWP_FRAMECHANGED, SWP_NOMOVE, SWP_NOOWNERZORDER, SWP_NOSIZE, SWP_NOZORDER,
    SW_HIDE, SW_SHOW,
};

use super::{
    BackendError, Cell, ConsoleBackend, Coord, CursorInfo, InputMode, RawHandle, Rect, Result,
    ScreenBufferInfo, StdStream, WindowExStyle, WindowHandle, WindowStyle,
};
use crate::color::{Palette, Rgb, PALETTE_LEN};

/// Standard handles saved while the process streams point at the console
struct SavedStreams {
    refs: usize,
    saved_input: isize,
    saved_output: isize,
    console_input: isize,
    console_output: isize,
}

static STREAMS: Mutex<SavedStreams> = Mutex::new(SavedStreams {
    refs: 0,
    saved_input: 0,
    saved_output: 0,
    console_input: 0,
    console_output: 0,
});

fn os(op: &'static str) -> impl FnOnce(windows::core::Error) -> BackendError {
    move |e| BackendError::Os {
        op,
        source: io::Error::new(io::ErrorKind::Other, e),
    }
}

fn handle(raw: RawHandle) -> HANDLE {
    HANDLE(raw.0 as *mut c_void)
}

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.0 as *mut c_void)
}

fn raw(handle: HANDLE) -> Option<RawHandle> {
    if handle.is_invalid() {
        None
    } else {
        Some(RawHandle(handle.0 as isize))
    }
}

fn coord(c: Coord) -> COORD {
    COORD { X: c.x, Y: c.y }
}

fn small_rect(r: Rect) -> SMALL_RECT {
    SMALL_RECT {
        Left: r.left,
        Top: r.top,
        Right: r.right,
        Bottom: r.bottom,
    }
}

fn std_handle_id(stream: StdStream) -> STD_HANDLE {
    match stream {
        StdStream::Input => STD_INPUT_HANDLE,
        StdStream::Output => STD_OUTPUT_HANDLE,
    }
}

/// Point stdin then stdout at `input`/`output`. When stdout cannot be
/// moved, stdin goes back to `fallback_input` so neither stream is left
/// half-switched.
fn swap_std_handles(
    mut set: impl FnMut(StdStream, isize) -> Result<()>,
    input: isize,
    output: isize,
    fallback_input: isize,
) -> Result<()> {
    set(StdStream::Input, input)?;
    if let Err(e) = set(StdStream::Output, output) {
        let _ = set(StdStream::Input, fallback_input);
        return Err(e);
    }
    Ok(())
}

fn set_std_handle(stream: StdStream, value: isize) -> Result<()> {
    unsafe {
        SetStdHandle(std_handle_id(stream), HANDLE(value as *mut c_void))
            .map_err(os("SetStdHandle"))
    }
}

/// Open `CONIN$` / `CONOUT$` of the attached console
unsafe fn open_console_device(output: bool) -> Result<HANDLE> {
    let name = if output { w!("CONOUT$") } else { w!("CONIN$") };
    CreateFileW(
        name,
        (GENERIC_READ | GENERIC_WRITE).0,
        FILE_SHARE_READ | FILE_SHARE_WRITE,
        None,
        OPEN_EXISTING,
        FILE_FLAGS_AND_ATTRIBUTES(0),
        HANDLE::default(),
    )
    .map_err(os("CreateFileW"))
}

/// Backend for the process console
#[derive(Clone, Copy, Debug, Default)]
pub struct Win32Backend;

impl Win32Backend {
    pub fn new() -> Self {
        Self
    }
}

impl ConsoleBackend for Win32Backend {
    fn alloc_console(&self) -> Result<()> {
        unsafe { AllocConsole().map_err(os("AllocConsole")) }
    }

    fn free_console(&self) -> Result<()> {
        unsafe { FreeConsole().map_err(os("FreeConsole")) }
    }

    fn console_window(&self) -> Option<WindowHandle> {
        let window = unsafe { GetConsoleWindow() };
        if window.is_invalid() {
            None
        } else {
            Some(WindowHandle(window.0 as isize))
        }
    }

    fn destroy_window(&self, window: WindowHandle) -> Result<()> {
        unsafe { DestroyWindow(hwnd(window)).map_err(os("DestroyWindow")) }
    }

    fn std_handle(&self, stream: StdStream) -> Option<RawHandle> {
        let handle = unsafe { GetStdHandle(std_handle_id(stream)) }.ok()?;
        raw(handle)
    }

    fn window_style(&self, window: WindowHandle) -> Option<WindowStyle> {
        let style = unsafe { GetWindowLongW(hwnd(window), GWL_STYLE) };
        // Zero doubles as the failure value
        (style != 0).then(|| WindowStyle::from_bits_retain(style as u32))
    }

    fn set_window_style(&self, window: WindowHandle, style: WindowStyle) -> Result<()> {
        unsafe {
            SetWindowLongW(hwnd(window), GWL_STYLE, style.bits() as i32);
        }
        Ok(())
    }

    fn window_ex_style(&self, window: WindowHandle) -> Option<WindowExStyle> {
        let style = unsafe { GetWindowLongW(hwnd(window), GWL_EXSTYLE) };
        (style != 0).then(|| WindowExStyle::from_bits_retain(style as u32))
    }

    fn set_window_ex_style(&self, window: WindowHandle, style: WindowExStyle) -> Result<()> {
        unsafe {
            SetWindowLongW(hwnd(window), GWL_EXSTYLE, style.bits() as i32);
        }
        Ok(())
    }

    fn refresh_frame(&self, window: WindowHandle) -> Result<()> {
        unsafe {
            SetWindowPos(
                hwnd(window),
                HWND::default(),
                0,
                0,
                0,
                0,
                SWP_NOSIZE | SWP_NOMOVE | SWP_NOZORDER | SWP_FRAMECHANGED | SWP_NOOWNERZORDER,
            )
            .map_err(os("SetWindowPos"))
        }
    }

    fn set_visible(&self, window: WindowHandle, visible: bool) -> Result<()> {
        // The return value is the previous visibility, not a status
        unsafe {
            let _ = ShowWindow(hwnd(window), if visible { SW_SHOW } else { SW_HIDE });
        }
        Ok(())
    }

    fn input_mode(&self, input: RawHandle) -> Result<InputMode> {
        let mut mode = CONSOLE_MODE::default();
        unsafe {
            GetConsoleMode(handle(input), &mut mode).map_err(os("GetConsoleMode"))?;
        }
        Ok(InputMode::from_bits_retain(mode.0))
    }

    fn set_input_mode(&self, input: RawHandle, mode: InputMode) -> Result<()> {
        unsafe {
            SetConsoleMode(handle(input), CONSOLE_MODE(mode.bits())).map_err(os("SetConsoleMode"))
        }
    }

    fn rebind_std_streams(&self) -> Result<()> {
        let mut streams = STREAMS.lock().unwrap_or_else(|e| e.into_inner());
        if streams.refs > 0 {
            streams.refs += 1;
            return Ok(());
        }

        unsafe {
            let saved_input = GetStdHandle(STD_INPUT_HANDLE).unwrap_or_default();
            let saved_output = GetStdHandle(STD_OUTPUT_HANDLE).unwrap_or_default();

            let console_input = open_console_device(false)?;
            let console_output = match open_console_device(true) {
                Ok(h) => h,
                Err(e) => {
                    let _ = CloseHandle(console_input);
                    return Err(e);
                }
            };

            if let Err(e) = swap_std_handles(
                set_std_handle,
                console_input.0 as isize,
                console_output.0 as isize,
                saved_input.0 as isize,
            ) {
                let _ = CloseHandle(console_input);
                let _ = CloseHandle(console_output);
                return Err(e);
            }

            *streams = SavedStreams {
                refs: 1,
                saved_input: saved_input.0 as isize,
                saved_output: saved_output.0 as isize,
                console_input: console_input.0 as isize,
                console_output: console_output.0 as isize,
            };
        }
        Ok(())
    }

    fn restore_std_streams(&self) -> Result<()> {
        let mut streams = STREAMS.lock().unwrap_or_else(|e| e.into_inner());
        match streams.refs {
            0 => return Ok(()),
            1 => {}
            _ => {
                streams.refs -= 1;
                return Ok(());
            }
        }

        // On failure the console handles stay open and bound for a retry
        swap_std_handles(
            set_std_handle,
            streams.saved_input,
            streams.saved_output,
            streams.console_input,
        )?;
        unsafe {
            let _ = CloseHandle(HANDLE(streams.console_input as *mut c_void));
            let _ = CloseHandle(HANDLE(streams.console_output as *mut c_void));
        }
        streams.refs = 0;
        Ok(())
    }

    fn read_narrow(&self, input: RawHandle, buffer: &mut [u8]) -> Result<usize> {
        let mut read: u32 = 0;
        unsafe {
            ReadConsoleA(
                handle(input),
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len() as u32,
                &mut read,
                None,
            )
            .map_err(os("ReadConsoleA"))?;
        }
        Ok(read as usize)
    }

    fn read_wide(&self, input: RawHandle, buffer: &mut [u16]) -> Result<usize> {
        let mut read: u32 = 0;
        unsafe {
            ReadConsoleW(
                handle(input),
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len() as u32,
                &mut read,
                None,
            )
            .map_err(os("ReadConsoleW"))?;
        }
        Ok(read as usize)
    }

    fn write_narrow(&self, output: RawHandle, text: &[u8]) -> Result<usize> {
        let mut written: u32 = 0;
        unsafe {
            WriteConsoleA(handle(output), text, Some(&mut written), None)
                .map_err(os("WriteConsoleA"))?;
        }
        Ok(written as usize)
    }

    fn write_wide(&self, output: RawHandle, text: &[u16]) -> Result<usize> {
        let mut written: u32 = 0;
        unsafe {
            WriteConsoleW(handle(output), text, Some(&mut written), None)
                .map_err(os("WriteConsoleW"))?;
        }
        Ok(written as usize)
    }

    fn screen_buffer_info(&self, output: RawHandle) -> Result<ScreenBufferInfo> {
        let mut csbi = CONSOLE_SCREEN_BUFFER_INFOEX {
            cbSize: std::mem::size_of::<CONSOLE_SCREEN_BUFFER_INFOEX>() as u32,
            ..Default::default()
        };
        unsafe {
            GetConsoleScreenBufferInfoEx(handle(output), &mut csbi)
                .map_err(os("GetConsoleScreenBufferInfoEx"))?;
        }

        let mut palette: Palette = [Rgb::default(); PALETTE_LEN];
        for (slot, colorref) in palette.iter_mut().zip(csbi.ColorTable.iter()) {
            *slot = Rgb::from_colorref(colorref.0);
        }

        Ok(ScreenBufferInfo {
            size: Coord::new(csbi.dwSize.X, csbi.dwSize.Y),
            cursor_position: Coord::new(csbi.dwCursorPosition.X, csbi.dwCursorPosition.Y),
            attributes: csbi.wAttributes.0,
            window: Rect {
                left: csbi.srWindow.Left,
                top: csbi.srWindow.Top,
                right: csbi.srWindow.Right,
                bottom: csbi.srWindow.Bottom,
            },
            maximum_window_size: Coord::new(
                csbi.dwMaximumWindowSize.X,
                csbi.dwMaximumWindowSize.Y,
            ),
            popup_attributes: csbi.wPopupAttributes,
            fullscreen_supported: csbi.bFullscreenSupported.as_bool(),
            palette,
        })
    }

    fn set_screen_buffer_info(&self, output: RawHandle, info: &ScreenBufferInfo) -> Result<()> {
        let mut color_table = [COLORREF(0); PALETTE_LEN];
        for (slot, rgb) in color_table.iter_mut().zip(info.palette.iter()) {
            *slot = COLORREF(rgb.to_colorref());
        }

        let csbi = CONSOLE_SCREEN_BUFFER_INFOEX {
            cbSize: std::mem::size_of::<CONSOLE_SCREEN_BUFFER_INFOEX>() as u32,
            dwSize: coord(info.size),
            dwCursorPosition: coord(info.cursor_position),
            wAttributes: CONSOLE_CHARACTER_ATTRIBUTES(info.attributes),
            srWindow: small_rect(info.window),
            dwMaximumWindowSize: coord(info.maximum_window_size),
            wPopupAttributes: info.popup_attributes,
            bFullscreenSupported: BOOL::from(info.fullscreen_supported),
            ColorTable: color_table,
        };
        unsafe {
            SetConsoleScreenBufferInfoEx(handle(output), &csbi)
                .map_err(os("SetConsoleScreenBufferInfoEx"))
        }
    }

    fn set_text_attribute(&self, output: RawHandle, attributes: u16) -> Result<()> {
        unsafe {
            SetConsoleTextAttribute(handle(output), CONSOLE_CHARACTER_ATTRIBUTES(attributes))
                .map_err(os("SetConsoleTextAttribute"))
        }
    }

    fn cursor_info(&self, output: RawHandle) -> Result<CursorInfo> {
        let mut cci = CONSOLE_CURSOR_INFO::default();
        unsafe {
            GetConsoleCursorInfo(handle(output), &mut cci).map_err(os("GetConsoleCursorInfo"))?;
        }
        Ok(CursorInfo {
            size: cci.dwSize,
            visible: cci.bVisible.as_bool(),
        })
    }

    fn set_cursor_info(&self, output: RawHandle, info: CursorInfo) -> Result<()> {
        let cci = CONSOLE_CURSOR_INFO {
            dwSize: info.size,
            bVisible: BOOL::from(info.visible),
        };
        unsafe { SetConsoleCursorInfo(handle(output), &cci).map_err(os("SetConsoleCursorInfo")) }
    }

    fn set_cursor_position(&self, output: RawHandle, position: Coord) -> Result<()> {
        unsafe {
            SetConsoleCursorPosition(handle(output), coord(position))
                .map_err(os("SetConsoleCursorPosition"))
        }
    }

    fn scroll(&self, output: RawHandle, scroll: Rect, destination: Coord, fill: Cell) -> Result<()> {
        let rect = small_rect(scroll);
        let fill = CHAR_INFO {
            Char: CHAR_INFO_0 { UnicodeChar: fill.ch },
            Attributes: fill.attributes,
        };
        unsafe {
            ScrollConsoleScreenBufferW(handle(output), &rect, None, coord(destination), &fill)
                .map_err(os("ScrollConsoleScreenBuffer"))
        }
    }

    fn fill_attribute(&self, output: RawHandle, attributes: u16, length: u32, start: Coord) -> Result<u32> {
        let mut written: u32 = 0;
        unsafe {
            FillConsoleOutputAttribute(handle(output), attributes, length, coord(start), &mut written)
                .map_err(os("FillConsoleOutputAttribute"))?;
        }
        Ok(written)
    }

    fn fill_character(&self, output: RawHandle, ch: u16, length: u32, start: Coord) -> Result<u32> {
        let mut written: u32 = 0;
        unsafe {
            FillConsoleOutputCharacterW(handle(output), ch, length, coord(start), &mut written)
                .map_err(os("FillConsoleOutputCharacter"))?;
        }
        Ok(written)
    }
}
