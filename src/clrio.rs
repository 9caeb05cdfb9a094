//! Colorized formatted print/scan
//!
//! Each call builds a transient [`ColorConsole`] over the already-open
//! console, applies the requested pair to the cursor color, does its I/O and
//! then puts the previous cursor color back, whether or not the I/O worked.
//!
//! Output is bounded by [`FORMAT_BUFFER_LEN`]: at most 8191 units (bytes on
//! the narrow path, UTF-16 units on the wide path) are written and a
//! character is never split. Input is one line of at most 8191 units.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use crate::backend::ConsoleBackend;
use crate::color::ColorPair;
use crate::console::{ColorConsole, ConsoleError, Result};

/// Size of the format/read buffer, terminator included
pub const FORMAT_BUFFER_LEN: usize = 8192;

/// Units available for text
const MAX_UNITS: usize = FORMAT_BUFFER_LEN - 1;

/// A scan target. Implemented for every `FromStr` type.
pub trait ScanField {
    /// Parse `token` into `self`; `false` leaves `self` untouched
    fn scan(&mut self, token: &str) -> bool;
}

impl<T: FromStr> ScanField for T {
    fn scan(&mut self, token: &str) -> bool {
        match token.parse() {
            Ok(value) => {
                *self = value;
                true
            }
            Err(_) => false,
        }
    }
}

struct NarrowBuffer {
    text: String,
    full: bool,
}

impl fmt::Write for NarrowBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.full {
            return Ok(());
        }
        let room = MAX_UNITS - self.text.len();
        if s.len() <= room {
            self.text.push_str(s);
            return Ok(());
        }
        let mut end = room;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.text.push_str(&s[..end]);
        self.full = true;
        Ok(())
    }
}

struct WideBuffer {
    units: Vec<u16>,
    full: bool,
}

impl fmt::Write for WideBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut encoded = [0u16; 2];
        for ch in s.chars() {
            if self.full {
                break;
            }
            if self.units.len() + ch.len_utf16() > MAX_UNITS {
                self.full = true;
                break;
            }
            self.units.extend_from_slice(ch.encode_utf16(&mut encoded));
        }
        Ok(())
    }
}

/// Format into at most 8191 bytes
pub fn format_narrow(args: fmt::Arguments<'_>) -> Result<String> {
    let mut buffer = NarrowBuffer {
        text: String::new(),
        full: false,
    };
    buffer.write_fmt(args).map_err(|_| ConsoleError::Format)?;
    Ok(buffer.text)
}

/// Format into at most 8191 UTF-16 units
pub fn format_wide(args: fmt::Arguments<'_>) -> Result<Vec<u16>> {
    let mut buffer = WideBuffer {
        units: Vec::new(),
        full: false,
    };
    buffer.write_fmt(args).map_err(|_| ConsoleError::Format)?;
    Ok(buffer.units)
}

/// Parse whitespace separated tokens of `line` into `fields`, in order.
///
/// Stops at the first token that does not parse. Nothing parsed (including
/// a blank line) is [`ConsoleError::NoMatch`].
pub fn scan_fields(line: &str, fields: &mut [&mut dyn ScanField]) -> Result<usize> {
    let mut tokens = line.split_whitespace();
    let mut parsed = 0;

    for field in fields.iter_mut() {
        match tokens.next() {
            Some(token) if field.scan(token) => parsed += 1,
            _ => break,
        }
    }

    if parsed == 0 && !fields.is_empty() {
        return Err(ConsoleError::NoMatch);
    }
    Ok(parsed)
}

/// Run `io` with the cursor color set to `color`, then restore the previous
/// cursor color. The first error wins.
fn with_cursor_color<B, T>(
    backend: &B,
    color: ColorPair,
    io: impl FnOnce(&ColorConsole<B>) -> Result<T>,
) -> Result<T>
where
    B: ConsoleBackend + Clone,
{
    let mut console = ColorConsole::new(backend.clone(), false, false);
    console.set_cursor_color(color)?;

    let result = io(&console);
    let restored = console.restore_cursor_color(true);

    let value = result?;
    restored?;
    Ok(value)
}

/// Write formatted narrow text in `color`; returns the bytes written
pub fn clrvprintf<B, P>(backend: &B, color: P, args: fmt::Arguments<'_>) -> Result<usize>
where
    B: ConsoleBackend + Clone,
    P: Into<ColorPair>,
{
    with_cursor_color(backend, color.into(), |console| {
        let text = format_narrow(args)?;
        console.write_a(text.as_bytes())
    })
}

/// Write formatted UTF-16 text in `color`; returns the units written
pub fn clrvwprintf<B, P>(backend: &B, color: P, args: fmt::Arguments<'_>) -> Result<usize>
where
    B: ConsoleBackend + Clone,
    P: Into<ColorPair>,
{
    with_cursor_color(backend, color.into(), |console| {
        let units = format_wide(args)?;
        console.write_w(&units)
    })
}

/// Generic form, same as [`clrvwprintf`]
pub fn tclrvprintf<B, P>(backend: &B, color: P, args: fmt::Arguments<'_>) -> Result<usize>
where
    B: ConsoleBackend + Clone,
    P: Into<ColorPair>,
{
    clrvwprintf(backend, color, args)
}

/// Read one narrow line in `color` and scan it into `fields`
pub fn clrvscanf<B, P>(backend: &B, color: P, fields: &mut [&mut dyn ScanField]) -> Result<usize>
where
    B: ConsoleBackend + Clone,
    P: Into<ColorPair>,
{
    with_cursor_color(backend, color.into(), |console| {
        let mut buffer = vec![0u8; MAX_UNITS];
        let n = console.read_a(&mut buffer)?;
        let line = String::from_utf8_lossy(&buffer[..n]);
        scan_fields(&line, fields)
    })
}

/// Read one UTF-16 line in `color` and scan it into `fields`
pub fn clrvwscanf<B, P>(backend: &B, color: P, fields: &mut [&mut dyn ScanField]) -> Result<usize>
where
    B: ConsoleBackend + Clone,
    P: Into<ColorPair>,
{
    with_cursor_color(backend, color.into(), |console| {
        let mut buffer = vec![0u16; MAX_UNITS];
        let n = console.read_w(&mut buffer)?;
        let line = String::from_utf16_lossy(&buffer[..n]);
        scan_fields(&line, fields)
    })
}

/// Generic form, same as [`clrvwscanf`]
pub fn tclrvscanf<B, P>(backend: &B, color: P, fields: &mut [&mut dyn ScanField]) -> Result<usize>
where
    B: ConsoleBackend + Clone,
    P: Into<ColorPair>,
{
    clrvwscanf(backend, color, fields)
}

/// `clrprintf!(&backend, color, "fmt", args...)`
#[macro_export]
macro_rules! clrprintf {
    ($backend:expr, $color:expr, $($arg:tt)*) => {
        $crate::clrio::clrvprintf($backend, $color, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! clrwprintf {
    ($backend:expr, $color:expr, $($arg:tt)*) => {
        $crate::clrio::clrvwprintf($backend, $color, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! tclrprintf {
    ($backend:expr, $color:expr, $($arg:tt)*) => {
        $crate::clrio::tclrvprintf($backend, $color, format_args!($($arg)*))
    };
}

/// `clrscanf!(&backend, color, a, b, ...)` with each target a `FromStr` place
#[macro_export]
macro_rules! clrscanf {
    ($backend:expr, $color:expr, $($field:expr),+ $(,)?) => {
        $crate::clrio::clrvscanf(
            $backend,
            $color,
            &mut [$(&mut $field as &mut dyn $crate::clrio::ScanField),+],
        )
    };
}

#[macro_export]
macro_rules! clrwscanf {
    ($backend:expr, $color:expr, $($field:expr),+ $(,)?) => {
        $crate::clrio::clrvwscanf(
            $backend,
            $color,
            &mut [$(&mut $field as &mut dyn $crate::clrio::ScanField),+],
        )
    };
}

#[macro_export]
macro_rules! tclrscanf {
    ($backend:expr, $color:expr, $($field:expr),+ $(,)?) => {
        $crate::clrio::tclrvscanf(
            $backend,
            $color,
            &mut [$(&mut $field as &mut dyn $crate::clrio::ScanField),+],
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Faults, MemoryBackend};
    use crate::color::Color;

    fn white_console() -> MemoryBackend {
        let backend = MemoryBackend::attached(80, 25);
        let mut console = ColorConsole::new(backend.clone(), false, false);
        console.set_cursor_color(Color::White.into()).unwrap();
        backend
    }

    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_narrow_output_truncates() {
        let backend = white_console();
        let long = "x".repeat(10_000);

        assert_eq!(clrprintf!(&backend, Color::Green, "{}", long).unwrap(), 8191);
        assert_eq!(backend.output().len(), 8191);
    }

    #[test]
    fn test_wide_output_truncates() {
        let backend = white_console();
        let long = "y".repeat(10_000);

        assert_eq!(clrwprintf!(&backend, Color::Green, "{}", long).unwrap(), 8191);
        assert_eq!(backend.output().encode_utf16().count(), 8191);
    }

    #[test]
    fn test_truncation_keeps_whole_characters() {
        let text = "\u{e9}".repeat(5_000);
        let narrow = format_narrow(format_args!("{}", text)).unwrap();
        assert_eq!(narrow.len(), 8190);

        let text = "\u{1F600}".repeat(5_000);
        let wide = format_wide(format_args!("{}", text)).unwrap();
        assert_eq!(wide.len(), 8190);
        assert!(String::from_utf16(&wide).is_ok());
    }

    #[test]
    fn test_print_uses_color_then_restores() {
        let backend = white_console();

        assert_eq!(clrprintf!(&backend, Color::Green, "n = {}", 5).unwrap(), 5);
        assert_eq!(backend.writes(), vec![(0x0A, "n = 5".to_string())]);
        assert_eq!(backend.attributes(), 0x0F);

        let pair = ColorPair::new(Color::Green, Color::Red);
        tclrprintf!(&backend, pair, "World!\n").unwrap();
        assert_eq!(backend.writes()[1].0, 0xAC);
        assert_eq!(backend.attributes(), 0x0F);
    }

    #[test]
    fn test_print_restores_after_write_failure() {
        let backend = white_console();
        backend.inject(Faults::WRITE);

        let result = clrprintf!(&backend, Color::Green, "lost");
        assert!(matches!(result, Err(ConsoleError::Backend(_))));
        assert_eq!(backend.attributes(), 0x0F);
    }

    #[test]
    fn test_print_reports_short_write() {
        let backend = white_console();
        backend.inject(Faults::SHORT_WRITE);

        assert_eq!(clrprintf!(&backend, Color::Green, "abcdef").unwrap(), 3);
        assert_eq!(clrwprintf!(&backend, Color::Green, "{}", "ghij").unwrap(), 2);
        assert_eq!(backend.output(), "abcgh");
        assert_eq!(backend.attributes(), 0x0F);
    }

    #[test]
    fn test_print_restores_after_format_failure() {
        let backend = white_console();

        let result = clrwprintf!(&backend, Color::Green, "{}", Broken);
        assert!(matches!(result, Err(ConsoleError::Format)));
        assert_eq!(backend.attributes(), 0x0F);
        assert!(backend.output().is_empty());
    }

    #[test]
    fn test_print_without_console() {
        let backend = MemoryBackend::new(80, 25);
        assert!(matches!(
            clrprintf!(&backend, Color::Green, "x"),
            Err(ConsoleError::NotOpen)
        ));
    }

    #[test]
    fn test_scan_fields() {
        let backend = white_console();
        backend.push_input("42 3.5 ferris\n");

        let mut number = 0i32;
        let mut ratio = 0.0f64;
        let mut name = String::new();
        let parsed = clrscanf!(&backend, Color::Green, number, ratio, name).unwrap();

        assert_eq!(parsed, 3);
        assert_eq!(number, 42);
        assert_eq!(ratio, 3.5);
        assert_eq!(name, "ferris");
        assert_eq!(backend.attributes(), 0x0F);
    }

    #[test]
    fn test_scan_partial_match() {
        let backend = white_console();
        backend.push_input("7 nope\n");

        let mut first = 0u8;
        let mut second = 0u8;
        assert_eq!(clrwscanf!(&backend, Color::Green, first, second).unwrap(), 1);
        assert_eq!(first, 7);
        assert_eq!(second, 0);
    }

    #[test]
    fn test_scan_failures_are_distinct() {
        let backend = white_console();
        let mut value = 0i32;

        backend.push_input("abc\n");
        assert!(matches!(
            tclrscanf!(&backend, Color::Green, value),
            Err(ConsoleError::NoMatch)
        ));

        backend.push_input("\n");
        assert!(matches!(
            clrscanf!(&backend, Color::Green, value),
            Err(ConsoleError::NoMatch)
        ));

        assert!(matches!(
            clrscanf!(&backend, Color::Green, value),
            Err(ConsoleError::EndOfInput)
        ));
        assert_eq!(backend.attributes(), 0x0F);

        backend.inject(Faults::READ);
        assert!(matches!(
            clrwscanf!(&backend, Color::Green, value),
            Err(ConsoleError::Backend(_))
        ));
        backend.heal();
        assert_eq!(backend.attributes(), 0x0F);
    }

    #[test]
    fn test_scan_fields_without_targets() {
        let mut fields: [&mut dyn ScanField; 0] = [];
        assert_eq!(scan_fields("anything", &mut fields).unwrap(), 0);
    }
}
