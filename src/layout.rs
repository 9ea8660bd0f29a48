use crate::error::{Result, WatermarkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default distance in pixels between an edge-aligned watermark and the canvas edge.
pub const DEFAULT_MARGIN: u32 = 10;

/// The nine named placements for watermark content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    #[default]
    BottomRight,
}

#[derive(Clone, Copy)]
enum Align {
    Start,
    Middle,
    End,
}

impl Anchor {
    pub const ALL: [Anchor; 9] = [
        Anchor::TopLeft,
        Anchor::TopCenter,
        Anchor::TopRight,
        Anchor::CenterLeft,
        Anchor::Center,
        Anchor::CenterRight,
        Anchor::BottomLeft,
        Anchor::BottomCenter,
        Anchor::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopCenter => "top-center",
            Anchor::TopRight => "top-right",
            Anchor::CenterLeft => "center-left",
            Anchor::Center => "center",
            Anchor::CenterRight => "center-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomCenter => "bottom-center",
            Anchor::BottomRight => "bottom-right",
        }
    }

    fn alignment(&self) -> (Align, Align) {
        match self {
            Anchor::TopLeft => (Align::Start, Align::Start),
            Anchor::TopCenter => (Align::Middle, Align::Start),
            Anchor::TopRight => (Align::End, Align::Start),
            Anchor::CenterLeft => (Align::Start, Align::Middle),
            Anchor::Center => (Align::Middle, Align::Middle),
            Anchor::CenterRight => (Align::End, Align::Middle),
            Anchor::BottomLeft => (Align::Start, Align::End),
            Anchor::BottomCenter => (Align::Middle, Align::End),
            Anchor::BottomRight => (Align::End, Align::End),
        }
    }
}

impl FromStr for Anchor {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Anchor::ALL
            .into_iter()
            .find(|anchor| anchor.as_str() == normalized)
            .ok_or_else(|| WatermarkError::InvalidPosition(s.to_string()))
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn align_axis(align: Align, canvas: u32, content: u32, margin: u32) -> i64 {
    let (canvas, content, margin) = (canvas as i64, content as i64, margin as i64);
    match align {
        Align::Start => margin,
        Align::Middle => (canvas - content).div_euclid(2),
        Align::End => canvas - content - margin,
    }
}

/// Top-left origin for a `content` box placed at `anchor` inside `canvas`.
///
/// Content larger than the canvas yields negative coordinates; clipping is
/// left to whoever draws the content.
pub fn resolve_position(
    anchor: Anchor,
    canvas: (u32, u32),
    content: (u32, u32),
    margin: u32,
) -> (i64, i64) {
    let (horizontal, vertical) = anchor.alignment();
    (
        align_axis(horizontal, canvas.0, content.0, margin),
        align_axis(vertical, canvas.1, content.1, margin),
    )
}

/// Same as [`resolve_position`] for an anchor given by name.
pub fn resolve_named_position(
    name: &str,
    canvas: (u32, u32),
    content: (u32, u32),
    margin: u32,
) -> Result<(i64, i64)> {
    let anchor: Anchor = name.parse()?;
    Ok(resolve_position(anchor, canvas, content, margin))
}
