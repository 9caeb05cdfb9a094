//! Color and cursor state tracking
//!
//! `ColorConsole` wraps a [`ConsoleSession`] and keeps two levels of saved
//! color state:
//!
//! - **original**: captured at construction and on every `open`
//! - **previous**: the pair active right before the last successful set,
//!   for one-level undo
//!
//! Text color and cursor color are tracked separately but both read and
//! write the attribute word. `set_color` additionally repaints the
//! attribute plane of the whole buffer.

use tracing::{debug, trace, warn};

use super::{ConsoleError, ConsoleSession, Result};
use crate::backend::{
    Cell, ConsoleBackend, Coord, CursorInfo, RawHandle, Rect, ScreenBufferInfo, StdStream,
    WindowHandle,
};
use crate::color::{Color, ColorPair, Palette, Rgb};

pub struct ColorConsole<B: ConsoleBackend + Clone> {
    session: ConsoleSession<B>,
    /// Restore palette and original colors on close/drop
    auto_restore_colors: bool,
    original: ColorPair,
    original_cursor: ColorPair,
    previous: ColorPair,
    previous_cursor: ColorPair,
    original_palette: Palette,
    /// The original state above was read from a live console
    captured: bool,
}

impl<B: ConsoleBackend + Clone> ColorConsole<B> {
    pub fn new(backend: B, auto_close: bool, auto_restore_colors: bool) -> Self {
        let mut console = Self {
            session: ConsoleSession::new(backend, auto_close),
            auto_restore_colors,
            original: ColorPair::default(),
            original_cursor: ColorPair::default(),
            previous: ColorPair::default(),
            previous_cursor: ColorPair::default(),
            original_palette: Palette::default(),
            captured: false,
        };
        console.capture_originals();
        console
    }

    /// Open the session, then capture the original colors and palette again
    pub fn open(&mut self, update_streams: bool) -> Result<()> {
        self.session.open(update_streams)?;

        self.original = ColorPair::default();
        self.original_cursor = ColorPair::default();
        self.previous = ColorPair::default();
        self.previous_cursor = ColorPair::default();
        self.original_palette = Palette::default();
        self.capture_originals();
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        if self.should_restore() {
            if let Err(e) = self.restore_originals() {
                warn!("Failed to restore console colors: {}", e);
            }
        }
        let result = self.session.close();
        if result.is_ok() {
            self.captured = false;
        }
        result
    }

    pub fn buffer_info(&self) -> Result<ScreenBufferInfo> {
        let output = self.out_handle()?;
        Ok(self.backend().screen_buffer_info(output)?)
    }

    /// Apply buffer metadata; `info.window` uses inclusive edges, as
    /// returned by [`buffer_info`](Self::buffer_info)
    pub fn set_buffer_info(&self, info: &ScreenBufferInfo) -> Result<()> {
        let output = self.out_handle()?;
        let mut adjusted = *info;
        adjusted.window.right += 1;
        adjusted.window.bottom += 1;
        self.backend().set_screen_buffer_info(output, &adjusted)?;
        Ok(())
    }

    pub fn attributes(&self) -> Result<u16> {
        Ok(self.buffer_info()?.attributes)
    }

    pub fn set_attributes(&self, attributes: u16) -> Result<()> {
        let output = self.out_handle()?;
        self.backend().set_text_attribute(output, attributes)?;
        Ok(())
    }

    /// Set palette slot `color` to a packed `0xRRGGBB` value and repaint
    pub fn change_color_palette(&mut self, color: Color, rgb: u32) -> Result<()> {
        let rgb = Rgb::from_packed(rgb);
        self.change_color_palette_rgb(color, rgb.r, rgb.g, rgb.b)?;
        self.flush(false, false, false)
    }

    /// Set palette slot `color` without repainting
    pub fn change_color_palette_rgb(&self, color: Color, r: u8, g: u8, b: u8) -> Result<()> {
        let index = color.index().ok_or(ConsoleError::PaletteIndex(color as u8))?;

        let mut info = self.buffer_info()?;
        info.palette[index] = Rgb::new(r, g, b);
        self.set_buffer_info(&info)?;

        trace!("Palette slot {} set to {}", index, info.palette[index]);
        Ok(())
    }

    /// Replace the whole palette
    pub fn set_palette(&self, palette: &Palette) -> Result<()> {
        let mut info = self.buffer_info()?;
        info.palette = *palette;
        self.set_buffer_info(&info)
    }

    /// Repaint the attribute plane with the current attributes.
    ///
    /// `clear` scrolls the buffer contents out and homes the cursor first.
    pub fn flush(&mut self, clear: bool, update_original: bool, reset_previous: bool) -> Result<()> {
        let output = self.out_handle()?;
        let info = self.buffer_info()?;

        if clear {
            let whole = Rect {
                left: 0,
                top: 0,
                right: info.size.x,
                bottom: info.size.y,
            };
            self.backend().scroll(
                output,
                whole,
                Coord::new(0, -info.size.y),
                Cell::blank(info.attributes),
            )?;
            self.backend().set_cursor_position(output, Coord::default())?;
        }

        self.backend()
            .fill_attribute(output, info.attributes, info.area(), Coord::default())?;

        if update_original {
            self.original = ColorPair::from_attributes(info.attributes);
        }
        if reset_previous {
            self.previous = ColorPair::default();
        }
        Ok(())
    }

    pub fn color(&self) -> Result<ColorPair> {
        Ok(ColorPair::from_attributes(self.attributes()?))
    }

    /// Apply `pair` to the text attributes and repaint the buffer with them.
    /// `Unknown` fields keep their current value; a fully unspecified pair
    /// changes nothing, `previous` included.
    pub fn set_color(&mut self, pair: ColorPair) -> Result<()> {
        let output = self.out_handle()?;
        if pair.is_unspecified() {
            return Ok(());
        }
        let info = self.buffer_info()?;
        let current = ColorPair::from_attributes(info.attributes);
        let attributes = pair.apply_to(info.attributes);

        self.backend().set_text_attribute(output, attributes)?;
        self.backend()
            .fill_attribute(output, attributes, info.area(), Coord::default())?;

        self.previous = current;
        trace!("Color {:?} -> {:?}", current, pair);
        Ok(())
    }

    /// Re-apply the previous pair, or the original one
    pub fn restore_color(&mut self, restore_previous: bool) -> Result<()> {
        let pair = if restore_previous {
            self.previous
        } else {
            self.original
        };
        self.set_color(pair)
    }

    pub fn cursor_info(&self) -> Result<CursorInfo> {
        let output = self.out_handle()?;
        Ok(self.backend().cursor_info(output)?)
    }

    pub fn set_cursor_info(&self, info: CursorInfo) -> Result<()> {
        let output = self.out_handle()?;
        self.backend().set_cursor_info(output, info)?;
        Ok(())
    }

    pub fn cursor_position(&self) -> Result<Coord> {
        Ok(self.buffer_info()?.cursor_position)
    }

    pub fn set_cursor_position(&self, position: Coord) -> Result<()> {
        let output = self.out_handle()?;
        self.backend().set_cursor_position(output, position)?;
        Ok(())
    }

    pub fn show_cursor(&self) -> Result<()> {
        self.set_cursor_visible(|_| true)
    }

    pub fn hide_cursor(&self) -> Result<()> {
        self.set_cursor_visible(|_| false)
    }

    pub fn toggle_cursor(&self) -> Result<()> {
        self.set_cursor_visible(|visible| !visible)
    }

    pub fn cursor_color(&self) -> Result<ColorPair> {
        Ok(ColorPair::from_attributes(self.attributes()?))
    }

    /// Apply `pair` to the attributes used for text written from now on
    pub fn set_cursor_color(&mut self, pair: ColorPair) -> Result<()> {
        let attributes = self.attributes()?;
        if pair.is_unspecified() {
            return Ok(());
        }
        let current = ColorPair::from_attributes(attributes);

        self.set_attributes(pair.apply_to(attributes))?;

        self.previous_cursor = current;
        trace!("Cursor color {:?} -> {:?}", current, pair);
        Ok(())
    }

    pub fn restore_cursor_color(&mut self, restore_previous: bool) -> Result<()> {
        let pair = if restore_previous {
            self.previous_cursor
        } else {
            self.original_cursor
        };
        self.set_cursor_color(pair)
    }

    /// Blank `length` cells from `position` in the current attributes
    pub fn erase(&self, position: Coord, length: u32) -> Result<()> {
        let output = self.out_handle()?;
        self.backend()
            .fill_character(output, b' ' as u16, length, position)?;
        let attributes = self.attributes()?;
        self.backend()
            .fill_attribute(output, attributes, length, position)?;
        Ok(())
    }

    pub fn show(&self) -> Result<()> {
        self.session.show()
    }

    pub fn hide(&self) -> Result<()> {
        self.session.hide()
    }

    pub fn read_a(&self, buffer: &mut [u8]) -> Result<usize> {
        self.session.read_a(buffer)
    }

    pub fn read_w(&self, buffer: &mut [u16]) -> Result<usize> {
        self.session.read_w(buffer)
    }

    pub fn read(&self, capacity: usize) -> Result<String> {
        self.session.read(capacity)
    }

    pub fn write_a(&self, text: &[u8]) -> Result<usize> {
        self.session.write_a(text)
    }

    pub fn write_w(&self, text: &[u16]) -> Result<usize> {
        self.session.write_w(text)
    }

    pub fn write(&self, text: &str) -> Result<usize> {
        self.session.write(text)
    }

    pub fn window(&self) -> Option<WindowHandle> {
        self.session.window()
    }

    pub fn input(&self) -> Option<RawHandle> {
        self.session.input()
    }

    pub fn output(&self) -> Option<RawHandle> {
        self.session.output()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    pub fn session(&self) -> &ConsoleSession<B> {
        &self.session
    }

    pub fn backend(&self) -> &B {
        self.session.backend()
    }

    fn out_handle(&self) -> Result<RawHandle> {
        if self.session.window().is_none() {
            return Err(ConsoleError::NotOpen);
        }
        self.session
            .output()
            .ok_or(ConsoleError::InvalidHandle(StdStream::Output))
    }

    fn set_cursor_visible(&self, visible: impl FnOnce(bool) -> bool) -> Result<()> {
        let mut info = self.cursor_info()?;
        info.visible = visible(info.visible);
        self.set_cursor_info(info)
    }

    fn capture_originals(&mut self) {
        self.captured = false;
        if self.out_handle().is_err() {
            return;
        }

        match self.buffer_info() {
            Ok(info) => {
                let pair = ColorPair::from_attributes(info.attributes);
                self.original = pair;
                self.original_cursor = pair;
                self.original_palette = info.palette;
                self.captured = true;
                debug!("Captured original colors {:?}", pair);
            }
            Err(e) => warn!("Failed to capture original colors: {}", e),
        }
    }

    fn should_restore(&self) -> bool {
        self.auto_restore_colors && self.captured && self.out_handle().is_ok()
    }

    /// Palette, then original pair, then original cursor pair. Every step
    /// runs; the first failure is returned.
    fn restore_originals(&mut self) -> Result<()> {
        let palette = self.original_palette;
        let palette_result = self.set_palette(&palette);
        let color_result = self.set_color(self.original);
        let cursor_result = self.set_cursor_color(self.original_cursor);

        debug!("Restored original colors");
        palette_result.and(color_result).and(cursor_result)
    }
}

impl<B: ConsoleBackend + Clone> Drop for ColorConsole<B> {
    fn drop(&mut self) {
        if self.should_restore() {
            if let Err(e) = self.restore_originals() {
                warn!("Failed to restore console colors: {}", e);
            }
        }
    }
}
