use crate::color::Color;
use crate::error::WatermarkError;
use crate::layout::Anchor;
use crate::render::{Renderer, WatermarkFont};
use crate::timestamp::TimestampExtractor;
use crate::watermark::{MAX_FONT_SIZE, OutputFormat, WatermarkConfig};
use image::{ColorType, DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn renderer() -> Renderer {
    Renderer::new(WatermarkFont::builtin(), TimestampExtractor::default())
}

fn blue_canvas(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, BLUE))
}

fn text_config(text: &str) -> WatermarkConfig {
    WatermarkConfig {
        text: Some(text.to_string()),
        font_size: 8,
        color: Color::new(255, 0, 0),
        opacity: 100,
        ..WatermarkConfig::default()
    }
}

fn write_png(dir: &Path, name: &str, image: &DynamicImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

#[test]
fn test_text_lands_bottom_right_with_backing() {
    let base = blue_canvas(200, 100);
    let out = renderer()
        .render(&base, Path::new("unused.png"), &text_config("A"))
        .unwrap();

    // Builtin "A" at 8px is 5x7, padding 2 -> 9x11 box at (181, 79)
    assert_eq!(*out.get_pixel(183, 82), Rgba([255, 0, 0, 255]));

    let backing = out.get_pixel(181, 79);
    assert_eq!(backing[0], 0);
    assert!((100..160).contains(&backing[2]), "got {:?}", backing);

    assert_eq!(*out.get_pixel(180, 79), BLUE);
    assert_eq!(*out.get_pixel(190, 90), BLUE);
    assert_eq!(*out.get_pixel(0, 0), BLUE);
}

#[test]
fn test_margin_moves_content() {
    let base = blue_canvas(200, 100);
    let out = renderer()
        .with_margin(0)
        .render(&base, Path::new("unused.png"), &text_config("A"))
        .unwrap();

    // Box now at (191, 89); text origin (193, 91)
    assert_eq!(*out.get_pixel(193, 92), Rgba([255, 0, 0, 255]));
    assert_ne!(*out.get_pixel(199, 99), BLUE);
}

#[test]
fn test_zero_opacity_hides_text_but_not_backing() {
    let base = blue_canvas(200, 100);
    let config = WatermarkConfig {
        opacity: 0,
        ..text_config("A")
    };
    let out = renderer()
        .render(&base, Path::new("unused.png"), &config)
        .unwrap();

    let pixel = out.get_pixel(183, 82);
    assert_eq!(pixel[0], 0);
    assert_eq!(pixel, out.get_pixel(181, 79));
}

#[test]
fn test_empty_text_draws_nothing() {
    let base = blue_canvas(64, 64);
    let out = renderer()
        .render(&base, Path::new("unused.png"), &text_config(""))
        .unwrap();
    assert_eq!(out, base.to_rgba8());
}

#[test]
fn test_missing_text_and_overlay_draws_timestamp() {
    let temp_dir = TempDir::new().unwrap();
    let base = blue_canvas(400, 100);
    let source = write_png(temp_dir.path(), "photo.png", &base);

    let config = WatermarkConfig {
        text: None,
        ..text_config("")
    };
    let renderer = renderer();
    let text = renderer.watermark_text(&source, &config).unwrap();
    assert_eq!(text.len(), "2024-01-01 00:00:00".len());

    let out = renderer.render(&base, &source, &config).unwrap();
    assert_ne!(out, base.to_rgba8());
}

#[test]
fn test_overlay_suppresses_derived_text() {
    let temp_dir = TempDir::new().unwrap();
    let overlay = write_png(
        temp_dir.path(),
        "logo.png",
        &DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]))),
    );
    let config = WatermarkConfig {
        text: None,
        overlay_image_path: Some(overlay),
        opacity: 100,
        position: Anchor::TopLeft,
        ..WatermarkConfig::default()
    };

    let renderer = renderer();
    assert!(renderer.watermark_text(Path::new("x.png"), &config).is_none());

    let out = renderer
        .render(&blue_canvas(50, 50), Path::new("x.png"), &config)
        .unwrap();
    assert_eq!(*out.get_pixel(10, 10), Rgba([0, 255, 0, 255]));
    assert_eq!(*out.get_pixel(13, 13), Rgba([0, 255, 0, 255]));
    assert_eq!(*out.get_pixel(9, 9), BLUE);
    assert_eq!(*out.get_pixel(14, 14), BLUE);
}

#[test]
fn test_overlay_scale() {
    let temp_dir = TempDir::new().unwrap();
    let overlay = write_png(
        temp_dir.path(),
        "logo.png",
        &DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]))),
    );
    let config = WatermarkConfig {
        overlay_image_path: Some(overlay),
        overlay_scale: 2.0,
        opacity: 100,
        position: Anchor::TopLeft,
        ..WatermarkConfig::default()
    };

    let out = renderer()
        .render(&blue_canvas(50, 50), Path::new("x.png"), &config)
        .unwrap();
    let inside = out.get_pixel(17, 17);
    assert!(inside[1] > 200 && inside[2] < 50, "got {:?}", inside);
    assert_eq!(*out.get_pixel(18, 18), BLUE);
}

#[test]
fn test_overlay_then_text_on_top() {
    let temp_dir = TempDir::new().unwrap();
    let overlay = write_png(
        temp_dir.path(),
        "logo.png",
        &DynamicImage::ImageRgba8(RgbaImage::from_pixel(30, 30, Rgba([0, 255, 0, 255]))),
    );
    let config = WatermarkConfig {
        overlay_image_path: Some(overlay),
        ..text_config("A")
    };

    let out = renderer()
        .render(&blue_canvas(200, 100), Path::new("x.png"), &config)
        .unwrap();
    // Overlay spans (160..190, 60..90); text sits inside it and wins
    assert_eq!(*out.get_pixel(183, 82), Rgba([255, 0, 0, 255]));
    assert_eq!(*out.get_pixel(165, 65), Rgba([0, 255, 0, 255]));
}

#[test]
fn test_oversized_text_layer_is_an_error() {
    let config = WatermarkConfig {
        font_size: MAX_FONT_SIZE,
        ..text_config(&"A".repeat(60))
    };
    let err = renderer()
        .render(&blue_canvas(20, 20), Path::new("x.png"), &config)
        .unwrap_err();
    assert!(matches!(err, WatermarkError::EncodingFailure { .. }));
    assert!(err.to_string().contains("too large"));
}

#[test]
fn test_invalid_config_rejected_before_drawing() {
    let config = WatermarkConfig {
        font_size: u32::MAX,
        ..text_config("A")
    };
    let err = renderer()
        .render(&blue_canvas(20, 20), Path::new("x.png"), &config)
        .unwrap_err();
    assert!(matches!(err, WatermarkError::InvalidConfig(_)));
}

#[test]
fn test_missing_overlay_is_an_error() {
    let config = WatermarkConfig {
        overlay_image_path: Some(PathBuf::from("/no/such/logo.png")),
        ..WatermarkConfig::default()
    };
    let err = renderer()
        .render(&blue_canvas(20, 20), Path::new("x.png"), &config)
        .unwrap_err();
    assert!(matches!(err, WatermarkError::OverlayImageNotFound(_)));
}

#[test]
fn test_undecodable_overlay_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let overlay = temp_dir.path().join("logo.png");
    std::fs::write(&overlay, b"definitely not a png").unwrap();

    let config = WatermarkConfig {
        overlay_image_path: Some(overlay),
        ..WatermarkConfig::default()
    };
    let err = renderer()
        .render(&blue_canvas(20, 20), Path::new("x.png"), &config)
        .unwrap_err();
    assert!(matches!(err, WatermarkError::OverlayImageNotFound(_)));
}

#[test]
fn test_render_file_creates_parent_and_keeps_dimensions() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_png(temp_dir.path(), "photo.png", &blue_canvas(64, 48));
    let destination = temp_dir.path().join("out").join("nested").join("photo.jpg");

    renderer()
        .render_file(&source, &destination, &text_config("hello"))
        .unwrap();

    let written = image::open(&destination).unwrap();
    assert_eq!((written.width(), written.height()), (64, 48));

    let leftovers: Vec<_> = std::fs::read_dir(destination.parent().unwrap())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".partial"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_render_file_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_png(temp_dir.path(), "photo.png", &blue_canvas(64, 48));
    let first = temp_dir.path().join("first.jpg");
    let second = temp_dir.path().join("second.jpg");
    let config = text_config("same every time");

    let renderer = renderer();
    renderer.render_file(&source, &first, &config).unwrap();
    renderer.render_file(&source, &second, &config).unwrap();

    assert_eq!(std::fs::read(first).unwrap(), std::fs::read(second).unwrap());
}

#[test]
fn test_render_file_png_keeps_source_alpha() {
    let temp_dir = TempDir::new().unwrap();
    let with_alpha = write_png(temp_dir.path(), "alpha.png", &blue_canvas(32, 32));
    let opaque = write_png(
        temp_dir.path(),
        "opaque.png",
        &DynamicImage::ImageRgb8(image::RgbImage::from_pixel(32, 32, image::Rgb([0, 0, 255]))),
    );
    let config = WatermarkConfig {
        output_format: OutputFormat::Png,
        ..text_config("x")
    };

    let renderer = renderer();
    let out_alpha = temp_dir.path().join("out_alpha.png");
    let out_opaque = temp_dir.path().join("out_opaque.png");
    renderer.render_file(&with_alpha, &out_alpha, &config).unwrap();
    renderer.render_file(&opaque, &out_opaque, &config).unwrap();

    assert_eq!(image::open(out_alpha).unwrap().color(), ColorType::Rgba8);
    assert_eq!(image::open(out_opaque).unwrap().color(), ColorType::Rgb8);
}

#[test]
fn test_render_file_rejects_corrupt_source() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("broken.jpg");
    std::fs::write(&source, b"\xFF\xD8 this is not really a jpeg").unwrap();
    let destination = temp_dir.path().join("out.jpg");

    let err = renderer()
        .render_file(&source, &destination, &text_config("x"))
        .unwrap_err();

    assert!(matches!(err, WatermarkError::UnsupportedImageFormat { .. }));
    assert!(!destination.exists());
}
