use image::{Rgba, RgbaImage, imageops};

/// Scale every pixel's alpha by `factor` (0.0-1.0).
pub fn apply_opacity(layer: &mut RgbaImage, factor: f32) {
    let factor = factor.clamp(0.0, 1.0);
    if factor >= 1.0 {
        return;
    }
    for pixel in layer.pixels_mut() {
        pixel[3] = (pixel[3] as f32 * factor).round() as u8;
    }
}

/// Alpha-composite `layer` onto `canvas` with its top-left corner at (`x`, `y`).
/// Parts outside the canvas are clipped.
pub fn composite(canvas: &mut RgbaImage, layer: &RgbaImage, x: i64, y: i64) {
    imageops::overlay(canvas, layer, x, y);
}

/// Uniform translucent rectangle used behind text to keep it legible.
pub fn backing(width: u32, height: u32, alpha: u8) -> RgbaImage {
    RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([0, 0, 0, alpha]))
}

/// Padding between the text and the edge of its backing rectangle.
pub fn backing_padding(font_size: u32) -> u32 {
    (font_size / 3).max(2)
}
