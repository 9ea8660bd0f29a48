use crate::error::{Result, WatermarkError};
use image::{Rgb, Rgba};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An opaque RGB color. Serialized as a `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

const NAMED_COLORS: &[(&str, Color)] = &[
    ("white", Color::new(255, 255, 255)),
    ("black", Color::new(0, 0, 0)),
    ("red", Color::new(255, 0, 0)),
    ("green", Color::new(0, 255, 0)),
    ("blue", Color::new(0, 0, 255)),
    ("yellow", Color::new(255, 255, 0)),
    ("cyan", Color::new(0, 255, 255)),
    ("magenta", Color::new(255, 0, 255)),
    ("gray", Color::new(128, 128, 128)),
];

impl Color {
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a palette name or an `R,G,B` triple. Components outside 0-255
    /// are rejected, never clamped.
    pub fn parse(spec: &str) -> Result<Self> {
        let normalized = spec.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(WatermarkError::InvalidColorSpec(spec.to_string()));
        }

        if let Some((_, color)) = NAMED_COLORS.iter().find(|(name, _)| *name == normalized) {
            return Ok(*color);
        }

        let components: Vec<&str> = normalized.split(',').map(str::trim).collect();
        if components.len() != 3 {
            return Err(WatermarkError::InvalidColorSpec(spec.to_string()));
        }

        let mut channels = [0u8; 3];
        for (channel, component) in channels.iter_mut().zip(&components) {
            // Parse wide so "256" reports as out of range rather than garbage
            let value: i64 = component
                .parse()
                .map_err(|_| WatermarkError::InvalidColorSpec(spec.to_string()))?;
            *channel = u8::try_from(value)
                .map_err(|_| WatermarkError::InvalidColorSpec(spec.to_string()))?;
        }

        Ok(Self::from(channels))
    }

    pub fn to_rgb(self) -> Rgb<u8> {
        Rgb([self.r, self.g, self.b])
    }

    pub fn with_alpha(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl From<[u8; 3]> for Color {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Color> for [u8; 3] {
    fn from(color: Color) -> Self {
        [color.r, color.g, color.b]
    }
}

impl FromStr for Color {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        Color::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors() {
        assert_eq!(Color::parse("white").unwrap(), Color::new(255, 255, 255));
        assert_eq!(Color::parse("Black").unwrap(), Color::new(0, 0, 0));
        assert_eq!(Color::parse(" magenta ").unwrap(), Color::new(255, 0, 255));
        assert_eq!(Color::parse("gray").unwrap(), Color::new(128, 128, 128));
        assert_eq!(NAMED_COLORS.len(), 9);
        assert!(Color::parse("grey").is_err());
    }

    #[test]
    fn test_numeric_triples_round_trip() {
        for (r, g, b) in [(0, 0, 0), (255, 255, 255), (12, 200, 99), (1, 254, 128)] {
            let color = Color::new(r, g, b);
            let parsed = Color::parse(&color.to_string()).unwrap();
            assert_eq!(parsed, color);
        }
        assert_eq!(Color::parse("10, 20 ,30").unwrap(), Color::new(10, 20, 30));
    }

    #[test]
    fn test_rejects_out_of_range_components() {
        for spec in ["256,0,0", "0,-1,0", "0,0,1000"] {
            assert!(
                matches!(Color::parse(spec), Err(WatermarkError::InvalidColorSpec(_))),
                "{spec} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_specs() {
        for spec in ["", "purple", "1,2", "1,2,3,4", "a,b,c", "1,,3", "#ffffff"] {
            assert!(
                matches!(Color::parse(spec), Err(WatermarkError::InvalidColorSpec(_))),
                "{spec:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&Color::new(1, 2, 3)).unwrap();
        assert_eq!(json, "[1,2,3]");
        let back: Color = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Color::new(1, 2, 3));
    }
}
