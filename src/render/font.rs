use super::builtin::{self, GLYPH_ADVANCE, GLYPH_COLUMNS, GLYPH_ROWS};
use crate::color::Color;
use ab_glyph::{FontVec, PxScale};
use image::RgbaImage;
use imageproc::drawing::{draw_text_mut, text_size};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Font files tried, in order, when no font is configured explicitly.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// The typeface used for text watermarks.
pub enum WatermarkFont {
    Outline { font: FontVec, path: PathBuf },
    /// Bitmap font compiled into the binary, always available.
    Builtin,
}

impl std::fmt::Debug for WatermarkFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatermarkFont::Outline { path, .. } => write!(f, "Outline({})", path.display()),
            WatermarkFont::Builtin => f.write_str("Builtin"),
        }
    }
}

impl WatermarkFont {
    pub fn builtin() -> Self {
        WatermarkFont::Builtin
    }

    pub fn from_path(path: &Path) -> Result<Self, String> {
        let font_data = std::fs::read(path)
            .map_err(|e| format!("Failed to read font file {}: {}", path.display(), e))?;
        let font = FontVec::try_from_vec(font_data)
            .map_err(|_| format!("Failed to parse font {}", path.display()))?;
        Ok(WatermarkFont::Outline {
            font,
            path: path.to_path_buf(),
        })
    }

    /// First loadable font among `explicit`, `search_paths` and the
    /// well-known system locations. Falls back to the built-in font.
    pub fn discover(explicit: Option<&Path>, search_paths: &[PathBuf]) -> Self {
        let candidates = explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain(search_paths.iter().cloned())
            .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

        for candidate in candidates {
            if !candidate.is_file() {
                continue;
            }
            match Self::from_path(&candidate) {
                Ok(font) => {
                    info!("Using font {}", candidate.display());
                    return font;
                }
                Err(e) => debug!("{}", e),
            }
        }

        debug!("No system font found, using built-in bitmap font");
        WatermarkFont::Builtin
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, WatermarkFont::Builtin)
    }

    /// File the outline font was loaded from.
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatermarkFont::Outline { path, .. } => Some(path),
            WatermarkFont::Builtin => None,
        }
    }

    /// Rendered size of `text` at `font_size` pixels.
    pub fn measure(&self, text: &str, font_size: u32) -> (u32, u32) {
        match self {
            WatermarkFont::Outline { font, .. } => {
                text_size(PxScale::from(font_size as f32), font, text)
            }
            WatermarkFont::Builtin => {
                let glyphs = text.chars().count() as u32;
                if glyphs == 0 {
                    return (0, 0);
                }
                let pixel = builtin_pixel_size(font_size);
                let units = glyphs.saturating_mul(GLYPH_ADVANCE).saturating_sub(1);
                (
                    units.saturating_mul(pixel),
                    GLYPH_ROWS.saturating_mul(pixel),
                )
            }
        }
    }

    /// Draw `text` into a transparent layer sized by [`WatermarkFont::measure`].
    ///
    /// Color channels are constant across the layer and coverage lives in
    /// the alpha channel only, so the layer composites without dark fringes.
    pub fn render(&self, text: &str, font_size: u32, color: Color) -> Option<RgbaImage> {
        let (width, height) = self.measure(text, font_size);
        if width == 0 || height == 0 {
            return None;
        }

        let mut layer = RgbaImage::from_pixel(width, height, color.with_alpha(0));
        match self {
            WatermarkFont::Outline { font, .. } => {
                let scale = PxScale::from(font_size as f32);
                draw_text_mut(&mut layer, color.with_alpha(255), 0, 0, scale, font, text);
            }
            WatermarkFont::Builtin => {
                let pixel = builtin_pixel_size(font_size);
                let opaque = color.with_alpha(255);
                for (index, c) in text.chars().enumerate() {
                    let origin_x = index as u32 * GLYPH_ADVANCE * pixel;
                    for column in 0..GLYPH_COLUMNS {
                        for row in 0..GLYPH_ROWS {
                            if !builtin::is_set(c, column, row) {
                                continue;
                            }
                            for dy in 0..pixel {
                                for dx in 0..pixel {
                                    layer.put_pixel(
                                        origin_x + column * pixel + dx,
                                        row * pixel + dy,
                                        opaque,
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
        Some(layer)
    }
}

/// Side of one bitmap-font pixel so the glyph height approximates `font_size`.
fn builtin_pixel_size(font_size: u32) -> u32 {
    (font_size.saturating_add(4) / 8).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_measure_scales_with_font_size() {
        let font = WatermarkFont::builtin();
        assert_eq!(font.measure("", 30), (0, 0));
        // 30px -> 4px blocks: 2 glyphs * 6 columns - 1 spacing = 11 units
        assert_eq!(font.measure("AB", 30), (44, 28));
        assert_eq!(font.measure("A", 1), (5, 7));
    }

    #[test]
    fn test_builtin_measure_saturates() {
        let font = WatermarkFont::builtin();
        let (width, height) = font.measure("2024-01-01 12:00:00", u32::MAX);
        assert_eq!(width, u32::MAX);
        assert_eq!(height, 7 * (u32::MAX / 8));
    }

    #[test]
    fn test_builtin_render_matches_measure() {
        let font = WatermarkFont::builtin();
        let layer = font.render("2024-01-01", 16, Color::new(255, 0, 0)).unwrap();
        assert_eq!(layer.dimensions(), font.measure("2024-01-01", 16));

        let opaque = layer.pixels().filter(|p| p[3] == 255).count();
        assert!(opaque > 0);
        assert!(layer.pixels().all(|p| p[0] == 255 && p[1] == 0 && p[2] == 0));
    }

    #[test]
    fn test_render_empty_text_yields_nothing() {
        assert!(WatermarkFont::builtin().render("", 30, Color::WHITE).is_none());
    }

    #[test]
    fn test_discover_falls_back_to_builtin() {
        let font = WatermarkFont::discover(Some(Path::new("/no/such/font.ttf")), &[]);
        // Either a system font was found or the built-in one was chosen; never an error
        if let WatermarkFont::Outline { path, .. } = &font {
            assert!(path.exists());
        }
    }

    #[test]
    fn test_unparseable_font_is_skipped() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let bogus = temp_dir.path().join("bogus.ttf");
        std::fs::write(&bogus, b"not a font").unwrap();
        assert!(WatermarkFont::from_path(&bogus).is_err());

        let font = WatermarkFont::discover(Some(&bogus), std::slice::from_ref(&bogus));
        assert_ne!(font.path(), Some(bogus.as_path()));
        assert_eq!(WatermarkFont::builtin().path(), None);
    }

    #[test]
    fn test_outline_font_when_available() {
        // Skip when the machine has no system font
        let Some(path) = SYSTEM_FONT_CANDIDATES
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())
        else {
            return;
        };
        let Ok(font) = WatermarkFont::from_path(path) else {
            return;
        };
        let (width, height) = font.measure("2024-05-06", 30);
        assert!(width > 0 && height > 0);
        let layer = font.render("2024-05-06", 30, Color::WHITE).unwrap();
        assert_eq!(layer.dimensions(), (width, height));
    }
}
