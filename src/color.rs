//! Console colors, color pairs and the attribute word.
//!
//! The console stores the active text colors in a 16-bit attribute word:
//! bits 0-3 hold the foreground palette index, bits 4-7 the background index
//! and the high byte carries LVB flags (grid lines, underscore, ...).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of entries in the console palette
pub const PALETTE_LEN: usize = 16;

const FOREGROUND_MASK: u16 = 0x000F;
const BACKGROUND_MASK: u16 = 0x00F0;

/// One of the 16 console colors, or `Unknown` meaning "leave unchanged"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    Black = 0x0,
    DarkBlue = 0x1,
    DarkGreen = 0x2,
    DarkCyan = 0x3,
    DarkRed = 0x4,
    DarkMagenta = 0x5,
    DarkYellow = 0x6,
    DarkGray = 0x7,
    Gray = 0x8,
    Blue = 0x9,
    Green = 0xA,
    Cyan = 0xB,
    Red = 0xC,
    Magenta = 0xD,
    Yellow = 0xE,
    White = 0xF,
    #[default]
    Unknown = 0xFF,
}

impl Color {
    /// All concrete colors in palette order
    pub const ALL: [Color; PALETTE_LEN] = [
        Color::Black,
        Color::DarkBlue,
        Color::DarkGreen,
        Color::DarkCyan,
        Color::DarkRed,
        Color::DarkMagenta,
        Color::DarkYellow,
        Color::DarkGray,
        Color::Gray,
        Color::Blue,
        Color::Green,
        Color::Cyan,
        Color::Red,
        Color::Magenta,
        Color::Yellow,
        Color::White,
    ];

    /// Color for a palette index; anything above 15 is `Unknown`
    pub fn from_index(index: u8) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or(Color::Unknown)
    }

    /// Palette index, `None` for `Unknown`
    pub fn index(self) -> Option<usize> {
        let raw = self as u8;
        if (raw as usize) < PALETTE_LEN {
            Some(raw as usize)
        } else {
            None
        }
    }

    pub fn is_unknown(self) -> bool {
        self == Color::Unknown
    }
}

/// Background/foreground pair applied to the attribute word
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColorPair {
    pub background: Color,
    pub foreground: Color,
}

impl ColorPair {
    pub const fn new(background: Color, foreground: Color) -> Self {
        Self { background, foreground }
    }

    /// Pair that changes only the foreground
    pub const fn foreground(foreground: Color) -> Self {
        Self {
            background: Color::Unknown,
            foreground,
        }
    }

    /// Decode the low byte of an attribute word
    pub fn from_attributes(attributes: u16) -> Self {
        Self {
            background: Color::from_index(((attributes & BACKGROUND_MASK) >> 4) as u8),
            foreground: Color::from_index((attributes & FOREGROUND_MASK) as u8),
        }
    }

    /// Both fields unspecified: applying the pair changes nothing
    pub fn is_unspecified(&self) -> bool {
        self.background.is_unknown() && self.foreground.is_unknown()
    }

    /// Apply the specified fields to `attributes`, keeping every other bit
    pub fn apply_to(&self, attributes: u16) -> u16 {
        let mut word = attributes;
        if let Some(index) = self.background.index() {
            word = (word & !BACKGROUND_MASK) | ((index as u16) << 4);
        }
        if let Some(index) = self.foreground.index() {
            word = (word & !FOREGROUND_MASK) | index as u16;
        }
        word
    }
}

impl From<Color> for ColorPair {
    fn from(foreground: Color) -> Self {
        Self::foreground(foreground)
    }
}

impl From<(Color, Color)> for ColorPair {
    fn from((background, foreground): (Color, Color)) -> Self {
        Self::new(background, foreground)
    }
}

/// Palette entry (RGB)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// From a packed `0xRRGGBB` value; bits above 24 are ignored
    pub const fn from_packed(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
        }
    }

    pub const fn to_packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// From the platform `0x00BBGGRR` layout
    pub const fn from_colorref(value: u32) -> Self {
        Self {
            r: (value & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: ((value >> 16) & 0xFF) as u8,
        }
    }

    pub const fn to_colorref(self) -> u32 {
        self.r as u32 | ((self.g as u32) << 8) | ((self.b as u32) << 16)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// The 16-entry palette table, indexed by [`Color`]
pub type Palette = [Rgb; PALETTE_LEN];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_attributes() {
        let pair = ColorPair::from_attributes(0x4F);
        assert_eq!(pair, ColorPair::new(Color::DarkRed, Color::White));

        // LVB flags in the high byte are ignored
        let pair = ColorPair::from_attributes(0x8007);
        assert_eq!(pair, ColorPair::new(Color::Black, Color::DarkGray));
    }

    #[test]
    fn test_apply_partial_pair() {
        // Foreground only keeps the background nibble
        assert_eq!(ColorPair::foreground(Color::Green).apply_to(0x1F), 0x1A);

        // Background only keeps the foreground nibble
        let pair = ColorPair::new(Color::Red, Color::Unknown);
        assert_eq!(pair.apply_to(0x07), 0xC7);

        // High byte survives
        assert_eq!(ColorPair::new(Color::Black, Color::White).apply_to(0x8012), 0x800F);
    }

    #[test]
    fn test_unspecified_pair_is_noop() {
        let pair = ColorPair::default();
        assert!(pair.is_unspecified());
        for word in [0x00, 0x07, 0x4F, 0xFFFF] {
            assert_eq!(pair.apply_to(word), word);
        }
    }

    #[test]
    fn test_color_index() {
        assert_eq!(Color::White.index(), Some(15));
        assert_eq!(Color::Unknown.index(), None);
        assert_eq!(Color::from_index(9), Color::Blue);
        assert_eq!(Color::from_index(16), Color::Unknown);
    }

    #[test]
    fn test_rgb_layouts() {
        let rgb = Rgb::from_packed(0x112233);
        assert_eq!(rgb, Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(rgb.to_colorref(), 0x0033_2211);
        assert_eq!(Rgb::from_colorref(0x0033_2211), rgb);
        assert_eq!(rgb.to_packed(), 0x112233);
        assert_eq!(rgb.to_string(), "#112233");
    }
}
