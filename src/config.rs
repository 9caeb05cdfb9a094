//! Configuration and palette schemes for clrconsole.
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.clrconsole/config.toml`. Every
//! key is optional:
//!
//! ```toml
//! [console]
//! auto_close = false
//! update_streams = false
//!
//! [colors]
//! auto_restore = false
//! # Palette scheme applied by the demo: campbell, vintage,
//! #                                     one-half-dark, solarized-dark
//! palette = "campbell"
//!
//! [log]
//! level = "info"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::color::{Palette, Rgb, PALETTE_LEN};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub console: ConsoleConfig,
    pub colors: ColorsConfig,
    pub log: LogConfig,
}

/// Console session settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Close the console when the session goes out of scope
    pub auto_close: bool,
    /// Rebind the process standard streams on open
    pub update_streams: bool,
}

/// Color tracking settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorsConfig {
    /// Restore palette and original colors on close
    pub auto_restore: bool,
    /// Palette scheme name
    pub palette: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. "info" or "clrconsole=debug"
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load `~/.clrconsole/config.toml`, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::default(),
        }
    }

    /// Load a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Cannot read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_toml_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The configured palette scheme, if any. Unknown names are logged.
    pub fn palette_scheme(&self) -> Option<PaletteScheme> {
        let name = self.colors.palette.as_deref()?;
        let scheme = PaletteScheme::by_name(name);
        if scheme.is_none() {
            warn!("Unknown palette scheme: {}", name);
        }
        scheme
    }

    /// `~/.clrconsole`, created on first use
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".clrconsole");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("clrconsole.log"))
    }
}

/// A named 16-color console palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteScheme {
    pub name: &'static str,
    /// In console color order
    pub colors: Palette,
}

impl PaletteScheme {
    fn from_packed(name: &'static str, values: [u32; PALETTE_LEN]) -> Self {
        Self {
            name,
            colors: values.map(Rgb::from_packed),
        }
    }

    /// Windows Terminal default
    pub fn campbell() -> Self {
        Self::from_packed(
            "campbell",
            [
                0x0C0C0C, 0x0037DA, 0x13A10E, 0x3A96DD, 0xC50F1F, 0x881798, 0xC19C00, 0xCCCCCC,
                0x767676, 0x3B78FF, 0x16C60C, 0x61D6D6, 0xE74856, 0xB4009E, 0xF9F1A5, 0xF2F2F2,
            ],
        )
    }

    /// Legacy conhost colors
    pub fn vintage() -> Self {
        Self::from_packed(
            "vintage",
            [
                0x000000, 0x000080, 0x008000, 0x008080, 0x800000, 0x800080, 0x808000, 0xC0C0C0,
                0x808080, 0x0000FF, 0x00FF00, 0x00FFFF, 0xFF0000, 0xFF00FF, 0xFFFF00, 0xFFFFFF,
            ],
        )
    }

    pub fn one_half_dark() -> Self {
        Self::from_packed(
            "one-half-dark",
            [
                0x282C34, 0x61AFEF, 0x98C379, 0x56B6C2, 0xE06C75, 0xC678DD, 0xE5C07B, 0xDCDFE4,
                0x5A6374, 0x61AFEF, 0x98C379, 0x56B6C2, 0xE06C75, 0xC678DD, 0xE5C07B, 0xDCDFE4,
            ],
        )
    }

    pub fn solarized_dark() -> Self {
        Self::from_packed(
            "solarized-dark",
            [
                0x002B36, 0x268BD2, 0x859900, 0x2AA198, 0xDC322F, 0xD33682, 0xB58900, 0xEEE8D5,
                0x073642, 0x839496, 0x586E75, 0x93A1A1, 0xCB4B16, 0x6C71C4, 0x657B83, 0xFDF6E3,
            ],
        )
    }

    /// Get scheme by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "campbell" | "default" => Some(Self::campbell()),
            "vintage" | "legacy" => Some(Self::vintage()),
            "one-half-dark" | "one_half_dark" | "onehalfdark" => Some(Self::one_half_dark()),
            "solarized-dark" | "solarized_dark" => Some(Self::solarized_dark()),
            _ => None,
        }
    }

    /// List available schemes
    pub fn list() -> Vec<&'static str> {
        vec!["campbell", "vintage", "one-half-dark", "solarized-dark"]
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.console.auto_close);
        assert!(!config.console.update_streams);
        assert!(!config.colors.auto_restore);
        assert!(config.colors.palette.is_none());
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_partial_file() {
        let config = Config::from_toml_str(
            r#"
            [colors]
            auto_restore = true
            palette = "vintage"
            "#,
        )
        .unwrap();

        assert!(config.colors.auto_restore);
        assert!(!config.console.auto_close);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.palette_scheme(), Some(PaletteScheme::vintage()));
    }

    #[test]
    fn test_invalid_file() {
        assert!(Config::from_toml_str("[console]\nauto_close = \"yes\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[console]\nauto_close = true\n[log]\nlevel = \"debug\"").unwrap();

        let config = Config::load_from(file.path());
        assert!(config.console.auto_close);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_load_from_bad_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not toml at all [").unwrap();
        assert!(!Config::load_from(&path).console.auto_close);

        let missing = dir.path().join("missing.toml");
        assert_eq!(Config::load_from(&missing).log.level, "info");
    }

    #[test]
    fn test_scheme_lookup() {
        for name in PaletteScheme::list() {
            let scheme = PaletteScheme::by_name(name).unwrap();
            assert_eq!(scheme.name, name);
        }
        assert_eq!(PaletteScheme::by_name("Solarized_Dark"), Some(PaletteScheme::solarized_dark()));
        assert!(PaletteScheme::by_name("nope").is_none());
    }

    #[test]
    fn test_scheme_colors() {
        let campbell = PaletteScheme::campbell();
        assert_eq!(campbell.colors[1], Rgb::new(0x00, 0x37, 0xDA));
        assert_eq!(campbell.colors[15].to_packed(), 0xF2F2F2);
    }

    #[test]
    fn test_unknown_scheme_in_config() {
        let config = Config::from_toml_str("[colors]\npalette = \"neon\"").unwrap();
        assert!(config.palette_scheme().is_none());
    }
}
