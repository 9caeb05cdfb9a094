//! Console session
//!
//! Owns one console surface: allocation, window chrome, visibility and raw
//! line I/O. Window/handle values are only valid while the session holds
//! them; they are cleared on close.

use tracing::{debug, info, warn};

use super::{ConsoleError, Result, StreamBinding};
use crate::backend::{
    ConsoleBackend, InputMode, RawHandle, StdStream, WindowExStyle, WindowHandle, WindowStyle,
};

/// A console surface and the window state changed while it is held
pub struct ConsoleSession<B: ConsoleBackend + Clone> {
    backend: B,
    /// Close the console when the session is dropped
    auto_close: bool,
    window: Option<WindowHandle>,
    input: Option<RawHandle>,
    output: Option<RawHandle>,
    /// Values captured before the session changed them
    original_mode: Option<InputMode>,
    original_style: Option<WindowStyle>,
    original_ex_style: Option<WindowExStyle>,
    /// Standard streams bound by `open(true)`
    streams: Option<StreamBinding<B>>,
}

impl<B: ConsoleBackend + Clone> ConsoleSession<B> {
    /// Create a session, adopting the console the process already has (if any)
    pub fn new(backend: B, auto_close: bool) -> Self {
        let window = backend.console_window();
        let input = backend.std_handle(StdStream::Input);
        let output = backend.std_handle(StdStream::Output);

        let mut session = Self {
            backend,
            auto_close,
            window,
            input,
            output,
            original_mode: None,
            original_style: None,
            original_ex_style: None,
            streams: None,
        };

        if let Some(window) = window {
            session.apply_chrome(window);
        }
        session
    }

    /// Allocate a console unless one is already present.
    ///
    /// With `update_streams` the process standard input/output are rebound
    /// to the new console. Partial side effects are not rolled back on
    /// failure; `close` and drop still restore what was captured.
    pub fn open(&mut self, update_streams: bool) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }

        self.release_streams()?;

        self.backend.alloc_console()?;

        let window = self.backend.console_window().ok_or(ConsoleError::NoWindow)?;
        self.window = Some(window);

        if update_streams {
            self.streams = Some(StreamBinding::acquire(self.backend.clone())?);
        }

        let input = self
            .backend
            .std_handle(StdStream::Input)
            .ok_or(ConsoleError::InvalidHandle(StdStream::Input))?;
        self.input = Some(input);

        let output = self
            .backend
            .std_handle(StdStream::Output)
            .ok_or(ConsoleError::InvalidHandle(StdStream::Output))?;
        self.output = Some(output);

        self.apply_chrome(window);

        info!("Console opened (update_streams: {})", update_streams);
        Ok(())
    }

    /// Restore the window state, release the streams and free the console
    pub fn close(&mut self) -> Result<()> {
        let window = self.window.ok_or(ConsoleError::NotOpen)?;

        self.restore_chrome(window);

        self.release_streams()?;

        self.backend.free_console()?;

        self.window = None;
        self.input = None;
        self.output = None;

        self.backend.destroy_window(window)?;

        info!("Console closed");
        Ok(())
    }

    pub fn show(&self) -> Result<()> {
        let window = self.window.ok_or(ConsoleError::NotOpen)?;
        self.backend.set_visible(window, true)?;
        Ok(())
    }

    pub fn hide(&self) -> Result<()> {
        let window = self.window.ok_or(ConsoleError::NotOpen)?;
        self.backend.set_visible(window, false)?;
        Ok(())
    }

    /// Read one line of narrow text into `buffer`, returning the bytes read
    pub fn read_a(&self, buffer: &mut [u8]) -> Result<usize> {
        let input = self.io_handle(self.input, StdStream::Input)?;
        match self.backend.read_narrow(input, buffer)? {
            0 => Err(ConsoleError::EndOfInput),
            n => Ok(n),
        }
    }

    /// Read one line of UTF-16 text into `buffer`, returning the units read
    pub fn read_w(&self, buffer: &mut [u16]) -> Result<usize> {
        let input = self.io_handle(self.input, StdStream::Input)?;
        match self.backend.read_wide(input, buffer)? {
            0 => Err(ConsoleError::EndOfInput),
            n => Ok(n),
        }
    }

    /// Read one line of at most `capacity` UTF-16 units
    pub fn read(&self, capacity: usize) -> Result<String> {
        let mut buffer = vec![0u16; capacity];
        let n = self.read_w(&mut buffer)?;
        Ok(String::from_utf16_lossy(&buffer[..n]))
    }

    /// Write narrow text, returning the bytes the console accepted
    pub fn write_a(&self, text: &[u8]) -> Result<usize> {
        let output = self.io_handle(self.output, StdStream::Output)?;
        Ok(self.backend.write_narrow(output, text)?)
    }

    /// Write UTF-16 text, returning the units the console accepted
    pub fn write_w(&self, text: &[u16]) -> Result<usize> {
        let output = self.io_handle(self.output, StdStream::Output)?;
        Ok(self.backend.write_wide(output, text)?)
    }

    pub fn write(&self, text: &str) -> Result<usize> {
        let wide: Vec<u16> = text.encode_utf16().collect();
        self.write_w(&wide)
    }

    pub fn window(&self) -> Option<WindowHandle> {
        self.window
    }

    pub fn input(&self) -> Option<RawHandle> {
        self.input
    }

    pub fn output(&self) -> Option<RawHandle> {
        self.output
    }

    pub fn is_open(&self) -> bool {
        self.window.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Release the stream binding; on failure it is kept for a later retry
    fn release_streams(&mut self) -> Result<()> {
        if let Some(binding) = self.streams.as_mut() {
            binding.release()?;
        }
        self.streams = None;
        Ok(())
    }

    fn io_handle(&self, handle: Option<RawHandle>, stream: StdStream) -> Result<RawHandle> {
        if self.window.is_none() {
            return Err(ConsoleError::NotOpen);
        }
        handle.ok_or(ConsoleError::InvalidHandle(stream))
    }

    /// Insert mode on, no maximize/minimize boxes, layered window.
    /// Best effort: each step is independent.
    fn apply_chrome(&mut self, window: WindowHandle) {
        if let Some(input) = self.input {
            match self.backend.input_mode(input) {
                Ok(mode) => {
                    self.original_mode = Some(mode);
                    if let Err(e) = self.backend.set_input_mode(input, mode | InputMode::INSERT_MODE) {
                        warn!("Failed to enable insert mode: {}", e);
                    }
                }
                Err(e) => debug!("Input mode unavailable: {}", e),
            }
        }

        if let Some(style) = self.backend.window_style(window) {
            self.original_style = Some(style);
            let stripped = style - (WindowStyle::MAXIMIZEBOX | WindowStyle::MINIMIZEBOX);
            if let Err(e) = self.backend.set_window_style(window, stripped) {
                warn!("Failed to set window style: {}", e);
            }
        }

        if let Some(ex_style) = self.backend.window_ex_style(window) {
            self.original_ex_style = Some(ex_style);
            if let Err(e) = self
                .backend
                .set_window_ex_style(window, ex_style | WindowExStyle::LAYERED)
            {
                warn!("Failed to set extended window style: {}", e);
            }
        }

        if let Err(e) = self.backend.refresh_frame(window) {
            debug!("Frame refresh failed: {}", e);
        }
    }

    fn restore_chrome(&mut self, window: WindowHandle) {
        if let Some(style) = self.original_style.take() {
            if let Err(e) = self.backend.set_window_style(window, style) {
                warn!("Failed to restore window style: {}", e);
            }
        }

        if let Some(ex_style) = self.original_ex_style.take() {
            if let Err(e) = self.backend.set_window_ex_style(window, ex_style) {
                warn!("Failed to restore extended window style: {}", e);
            }
        }

        if let (Some(input), Some(mode)) = (self.input, self.original_mode.take()) {
            if let Err(e) = self.backend.set_input_mode(input, mode) {
                warn!("Failed to restore input mode: {}", e);
            }
        }
    }
}

impl<B: ConsoleBackend + Clone> Drop for ConsoleSession<B> {
    fn drop(&mut self) {
        if self.auto_close {
            if self.window.is_some() {
                if let Err(e) = self.close() {
                    warn!("Failed to close console: {}", e);
                }
            }
        } else if let Some(window) = self.window {
            self.restore_chrome(window);
        }
        // A remaining stream binding is released by its own drop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Faults, MemoryBackend};

    #[test]
    fn test_open_allocates_and_applies_chrome() {
        let backend = MemoryBackend::new(80, 25);
        let mut session = ConsoleSession::new(backend.clone(), false);
        assert!(!session.is_open());

        session.open(false).unwrap();
        assert!(session.is_open());
        assert!(session.input().is_some());
        assert!(session.output().is_some());

        let style = backend.style();
        assert!(!style.contains(WindowStyle::MAXIMIZEBOX));
        assert!(!style.contains(WindowStyle::MINIMIZEBOX));
        assert!(style.contains(WindowStyle::CAPTION));
        assert!(backend.ex_style().contains(WindowExStyle::LAYERED));
        assert!(backend.mode().contains(InputMode::INSERT_MODE));
        assert_eq!(backend.frame_refreshes(), 1);
    }

    #[test]
    fn test_open_is_idempotent() {
        let backend = MemoryBackend::new(80, 25);
        let mut session = ConsoleSession::new(backend.clone(), false);
        session.open(false).unwrap();
        let window = session.window();

        // A second allocation would fail; open must not try
        session.open(false).unwrap();
        assert_eq!(session.window(), window);
        assert_eq!(backend.frame_refreshes(), 1);
    }

    #[test]
    fn test_close_restores_and_frees() {
        let backend = MemoryBackend::new(80, 25);
        let original_style = backend.style();
        let original_mode = backend.mode();

        let mut session = ConsoleSession::new(backend.clone(), false);
        session.open(false).unwrap();
        session.close().unwrap();

        assert!(!backend.is_attached());
        assert!(session.window().is_none());
        assert!(session.output().is_none());
        assert_eq!(backend.style(), original_style);
        assert_eq!(backend.mode(), original_mode);

        assert!(matches!(session.close(), Err(ConsoleError::NotOpen)));
    }

    #[test]
    fn test_drop_keeps_console_but_restores_chrome() {
        let backend = MemoryBackend::attached(80, 25);
        let original_ex_style = backend.ex_style();
        {
            let session = ConsoleSession::new(backend.clone(), false);
            assert!(session.is_open());
            assert!(backend.ex_style().contains(WindowExStyle::LAYERED));
        }
        assert!(backend.is_attached());
        assert_eq!(backend.ex_style(), original_ex_style);
    }

    #[test]
    fn test_auto_close_on_drop() {
        let backend = MemoryBackend::new(80, 25);
        {
            let mut session = ConsoleSession::new(backend.clone(), true);
            session.open(false).unwrap();
        }
        assert!(!backend.is_attached());
    }

    #[test]
    fn test_update_streams_binding_lifecycle() {
        let backend = MemoryBackend::new(80, 25);
        let mut session = ConsoleSession::new(backend.clone(), false);
        session.open(true).unwrap();
        assert_eq!(backend.stream_refs(), 1);
        session.close().unwrap();
        assert_eq!(backend.stream_refs(), 0);

        // Dropping without close still unbinds
        let backend = MemoryBackend::new(80, 25);
        {
            let mut session = ConsoleSession::new(backend.clone(), false);
            session.open(true).unwrap();
        }
        assert_eq!(backend.stream_refs(), 0);
        assert!(backend.is_attached());
    }

    #[test]
    fn test_close_retries_failed_stream_release() {
        let backend = MemoryBackend::new(80, 25);
        {
            let mut session = ConsoleSession::new(backend.clone(), false);
            session.open(true).unwrap();

            backend.inject(Faults::STREAMS);
            assert!(session.close().is_err());
            assert!(session.is_open());
            assert_eq!(backend.stream_refs(), 1);

            backend.heal();
            session.close().unwrap();
            assert_eq!(backend.stream_refs(), 0);
        }
        assert_eq!(backend.stream_refs(), 0);
        assert!(!backend.is_attached());
    }

    #[test]
    fn test_drop_releases_after_failed_close() {
        let backend = MemoryBackend::new(80, 25);
        {
            let mut session = ConsoleSession::new(backend.clone(), false);
            session.open(true).unwrap();
            backend.inject(Faults::STREAMS);
            assert!(session.close().is_err());
            backend.heal();
        }
        assert_eq!(backend.stream_refs(), 0);
    }

    #[test]
    fn test_short_write_reports_count() {
        let backend = MemoryBackend::attached(80, 25);
        let session = ConsoleSession::new(backend.clone(), false);
        assert_eq!(session.write("abcdef").unwrap(), 6);

        backend.inject(Faults::SHORT_WRITE);
        assert_eq!(session.write_a(b"ghijkl").unwrap(), 3);
        assert_eq!(session.write("mnopqr").unwrap(), 3);
        assert_eq!(backend.output(), "abcdefghimno");
    }

    #[test]
    fn test_open_failure() {
        let backend = MemoryBackend::new(80, 25);
        backend.inject(Faults::ALLOC);
        let mut session = ConsoleSession::new(backend.clone(), false);
        assert!(matches!(session.open(false), Err(ConsoleError::Backend(_))));
        assert!(!session.is_open());
    }

    #[test]
    fn test_show_hide() {
        let backend = MemoryBackend::new(80, 25);
        let mut session = ConsoleSession::new(backend.clone(), false);
        assert!(matches!(session.hide(), Err(ConsoleError::NotOpen)));

        session.open(false).unwrap();
        session.hide().unwrap();
        assert!(!backend.is_visible());
        session.show().unwrap();
        assert!(backend.is_visible());

        backend.inject(Faults::SHOW);
        assert!(session.hide().is_err());
    }

    #[test]
    fn test_read_write() {
        let backend = MemoryBackend::attached(80, 25);
        let session = ConsoleSession::new(backend.clone(), false);

        session.write_a(b"narrow ").unwrap();
        session.write("wide").unwrap();
        assert_eq!(backend.output(), "narrow wide");
        assert_eq!(backend.row_text(0), "narrow wide");

        backend.push_input("line one\nrest");
        assert_eq!(session.read(64).unwrap(), "line one\n");

        let mut buffer = [0u8; 8];
        let n = session.read_a(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"rest");
        assert!(matches!(session.read_a(&mut buffer), Err(ConsoleError::EndOfInput)));
    }

    #[test]
    fn test_io_without_console() {
        let backend = MemoryBackend::new(80, 25);
        let session = ConsoleSession::new(backend, false);
        assert!(matches!(session.write("x"), Err(ConsoleError::NotOpen)));
        let mut buffer = [0u16; 4];
        assert!(matches!(session.read_w(&mut buffer), Err(ConsoleError::NotOpen)));
    }
}
