//! Rgb: True-color representation for matrix pixels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// True-color RGB representation.
///
/// Uses 3 bytes for 24-bit color depth. The matrix panel drives each
/// channel with PWM, so every value maps directly to LED brightness.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    /// Red channel (0-255)
    pub r: u8,
    /// Green channel (0-255)
    pub g: u8,
    /// Blue channel (0-255)
    pub b: u8,
}

impl Rgb {
    /// Create a new RGB color.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black (0, 0, 0), an unlit pixel.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// White (255, 255, 255)
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Yellow (255, 255, 0)
    pub const YELLOW: Self = Self::new(255, 255, 0);

    /// Create from a 24-bit hex color (e.g., 0xFF5500).
    #[inline]
    pub const fn from_u32(hex: u32) -> Self {
        Self::new(
            ((hex >> 16) & 0xFF) as u8,
            ((hex >> 8) & 0xFF) as u8,
            (hex & 0xFF) as u8,
        )
    }

    /// Scale every channel by `factor` (clamped to `[0, 1]`), truncating.
    ///
    /// Used to fade particles as their lifespan runs out.
    #[inline]
    pub fn scaled(self, factor: f32) -> Self {
        let factor = factor.clamp(0.0, 1.0);
        Self::new(
            (f32::from(self.r) * factor) as u8,
            (f32::from(self.g) * factor) as u8,
            (f32::from(self.b) * factor) as u8,
        )
    }

    /// Whether this pixel is unlit.
    #[inline]
    pub const fn is_black(self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

impl fmt::Debug for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    #[inline]
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl From<u32> for Rgb {
    /// Convert from a 24-bit hex color (e.g., 0xFF5500)
    #[inline]
    fn from(hex: u32) -> Self {
        Self::from_u32(hex)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_string()
    }
}

/// Error returned when a hex color string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex color {0:?}, expected #RRGGBB")]
pub struct ParseColorError(String);

impl FromStr for Rgb {
    type Err = ParseColorError;

    /// Parse `#RRGGBB` or `RRGGBB`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseColorError(s.to_string()));
        }
        u32::from_str_radix(hex, 16)
            .map(Self::from_u32)
            .map_err(|_| ParseColorError(s.to_string()))
    }
}

impl TryFrom<String> for Rgb {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!("#FF1493".parse::<Rgb>(), Ok(Rgb::new(255, 20, 147)));
        assert_eq!("00ff00".parse::<Rgb>(), Ok(Rgb::new(0, 255, 0)));
        assert!("#FFF".parse::<Rgb>().is_err());
        assert!("#GG0000".parse::<Rgb>().is_err());
        assert!("".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let color = Rgb::new(255, 105, 180);
        assert_eq!(color.to_string(), "#FF69B4");
        assert_eq!(color.to_string().parse::<Rgb>(), Ok(color));
    }

    #[test]
    fn test_scaled() {
        let color = Rgb::new(200, 100, 50);
        assert_eq!(color.scaled(0.5), Rgb::new(100, 50, 25));
        assert_eq!(color.scaled(1.0), color);
        assert_eq!(color.scaled(0.0), Rgb::BLACK);
        assert_eq!(color.scaled(3.0), color);
    }

    #[test]
    fn test_serde_hex_string() {
        let color: Rgb = serde_json::from_str("\"#FFFF00\"").unwrap();
        assert_eq!(color, Rgb::YELLOW);
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#FFFF00\"");
        assert!(serde_json::from_str::<Rgb>("12").is_err());
    }
}
