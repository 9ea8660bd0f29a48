// Render module - composes text and image watermarks onto photos
mod builtin;
pub mod compose;
mod font;
pub mod formats;

pub use font::{SYSTEM_FONT_CANDIDATES, WatermarkFont};

use crate::error::{Result, WatermarkError};
use crate::layout::{DEFAULT_MARGIN, resolve_position};
use crate::timestamp::TimestampExtractor;
use crate::watermark::WatermarkConfig;
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_BACKING_ALPHA: u8 = 128;

/// Largest text layer, in pixels, the renderer will allocate.
pub const MAX_TEXT_LAYER_PIXELS: u64 = 1 << 26;

/// Applies a resolved [`WatermarkConfig`] to images.
///
/// Stacking order is fixed: the overlay image goes down first, then the
/// legibility backing, then the text.
#[derive(Debug)]
pub struct Renderer {
    font: WatermarkFont,
    timestamps: TimestampExtractor,
    margin: u32,
    backing_alpha: u8,
}

impl Renderer {
    pub fn new(font: WatermarkFont, timestamps: TimestampExtractor) -> Self {
        Self {
            font,
            timestamps,
            margin: DEFAULT_MARGIN,
            backing_alpha: DEFAULT_BACKING_ALPHA,
        }
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_backing_alpha(mut self, alpha: u8) -> Self {
        self.backing_alpha = alpha;
        self
    }

    pub fn font(&self) -> &WatermarkFont {
        &self.font
    }

    /// The text to draw for `source`: the configured text, or the capture
    /// timestamp when neither text nor an overlay is configured.
    pub fn watermark_text(&self, source: &Path, config: &WatermarkConfig) -> Option<String> {
        if config.needs_derived_text() {
            return Some(self.timestamps.extract(source));
        }
        config.text.clone().filter(|text| !text.is_empty())
    }

    /// Watermark an already decoded image. `source` is the file it came from,
    /// consulted only for capture-time metadata.
    pub fn render(
        &self,
        base: &DynamicImage,
        source: &Path,
        config: &WatermarkConfig,
    ) -> Result<RgbaImage> {
        config.validate()?;
        let mut canvas = base.to_rgba8();
        let canvas_size = canvas.dimensions();

        if let Some(overlay_path) = &config.overlay_image_path {
            let mut overlay = load_overlay(overlay_path, config.overlay_scale)?;
            compose::apply_opacity(&mut overlay, config.alpha_factor());
            let (x, y) = resolve_position(
                config.position,
                canvas_size,
                overlay.dimensions(),
                self.margin,
            );
            debug!("Placing overlay {} at ({}, {})", overlay_path.display(), x, y);
            compose::composite(&mut canvas, &overlay, x, y);
        }

        let text = self.watermark_text(source, config);
        if let Some(text) = &text {
            let (width, height) = self.font.measure(text, config.font_size);
            if width as u64 * height as u64 > MAX_TEXT_LAYER_PIXELS {
                return Err(WatermarkError::encoding(
                    source,
                    format!(
                        "text layer {}x{} at font size {} is too large",
                        width, height, config.font_size
                    ),
                ));
            }
        }

        if let Some(text) = text
            && let Some(mut layer) = self.font.render(&text, config.font_size, config.color)
        {
            let padding = compose::backing_padding(config.font_size);
            let (text_width, text_height) = layer.dimensions();
            let inset = padding.saturating_mul(2);
            let boxed = (
                text_width.saturating_add(inset),
                text_height.saturating_add(inset),
            );
            let (x, y) = resolve_position(config.position, canvas_size, boxed, self.margin);
            debug!("Placing text '{}' at ({}, {})", text, x, y);

            let backing = compose::backing(boxed.0, boxed.1, self.backing_alpha);
            compose::composite(&mut canvas, &backing, x, y);

            compose::apply_opacity(&mut layer, config.alpha_factor());
            compose::composite(&mut canvas, &layer, x + padding as i64, y + padding as i64);
        }

        Ok(canvas)
    }

    /// Decode `source`, watermark it and write the result to `destination`.
    ///
    /// The output is staged beside `destination` and renamed into place, so a
    /// failure never leaves a partial file behind.
    pub fn render_file(
        &self,
        source: &Path,
        destination: &Path,
        config: &WatermarkConfig,
    ) -> Result<()> {
        let base = decode(source)?;
        let keep_alpha = base.color().has_alpha();
        let watermarked = self.render(&base, source, config)?;
        drop(base);

        let bytes = formats::encode(&watermarked, config.output_format, config.quality, keep_alpha)
            .map_err(|e| WatermarkError::encoding(destination, e))?;
        write_atomically(destination, &bytes)
    }
}

pub fn decode(path: &Path) -> Result<DynamicImage> {
    let unsupported = |source: image::ImageError| WatermarkError::UnsupportedImageFormat {
        path: path.to_path_buf(),
        source,
    };

    let reader = image::ImageReader::open(path)
        .map_err(|e| unsupported(image::ImageError::IoError(e)))?
        .with_guessed_format()
        .map_err(|e| unsupported(image::ImageError::IoError(e)))?;
    reader.decode().map_err(unsupported)
}

fn load_overlay(path: &Path, scale: f32) -> Result<RgbaImage> {
    if !path.is_file() {
        return Err(WatermarkError::OverlayImageNotFound(path.to_path_buf()));
    }
    let overlay = image::open(path).map_err(|e| {
        debug!("Cannot decode overlay {}: {}", path.display(), e);
        WatermarkError::OverlayImageNotFound(path.to_path_buf())
    })?;

    if (scale - 1.0).abs() <= f32::EPSILON {
        return Ok(overlay.to_rgba8());
    }
    let width = ((overlay.width() as f32 * scale).round() as u32).max(1);
    let height = ((overlay.height() as f32 * scale).round() as u32).max(1);
    debug!(
        "Scaling overlay from {}x{} to {}x{}",
        overlay.width(),
        overlay.height(),
        width,
        height
    );
    Ok(overlay
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgba8())
}

fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| WatermarkError::encoding(destination, e))?;
    }

    let staging = staging_path(destination);
    if let Err(e) = std::fs::write(&staging, bytes) {
        let _ = std::fs::remove_file(&staging);
        return Err(WatermarkError::encoding(destination, e));
    }
    std::fs::rename(&staging, destination).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        WatermarkError::encoding(destination, e)
    })
}

fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.partial", name))
}

#[cfg(test)]
mod tests {
    mod compose_tests;
    mod formats_tests;
    mod render_tests;
}
