//! Border color handling
//!
//! Colors are configured as `#RRGGBB` hex strings. The leading `#` is optional.

use serde::{Serialize, Serializer};
use std::fmt;

/// 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// Parse a `#RRGGBB` (or `RRGGBB`) hex string
    ///
    /// Returns `None` for anything that is not exactly six hex digits.
    pub fn parse(hex: &str) -> Option<Self> {
        let digits = hex.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let value = u32::from_str_radix(digits, 16).ok()?;
        Some(Self::from_rgb24(value))
    }

    pub const fn from_rgb24(value: u32) -> Self {
        Self {
            red: ((value >> 16) & 0xFF) as u8,
            green: ((value >> 8) & 0xFF) as u8,
            blue: (value & 0xFF) as u8,
        }
    }

    pub const fn rgb24(self) -> u32 {
        ((self.red as u32) << 16) | ((self.green as u32) << 8) | self.blue as u32
    }

    /// Pixel value for a 24/32-bit TrueColor visual
    pub const fn to_x11_pixel(self) -> u32 {
        self.rgb24()
    }

    pub fn to_hex_string(self) -> String {
        format!("#{:06X}", self.rgb24())
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06X}", self.rgb24())
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_string())
    }
}

/// Parse an optional configured color, logging strings that fail to parse
pub fn parse_logged(field: &str, hex: &str) -> Option<Rgb> {
    let parsed = Rgb::parse(hex);
    if parsed.is_none() {
        tracing::warn!(field = %field, color = %hex, "Invalid color, expected #RRGGBB");
    }
    parsed
}
