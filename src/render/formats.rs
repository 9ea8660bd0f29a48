use crate::watermark::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageResult, Rgb, RgbImage, RgbaImage};
use std::io::Cursor;
use tracing::trace;

/// Background that alpha is flattened onto for formats without transparency.
pub const FLATTEN_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Encode `image` as `format`.
///
/// `keep_alpha` only matters for formats that can carry transparency; JPEG
/// and BMP output is always flattened onto [`FLATTEN_BACKGROUND`].
pub fn encode(
    image: &RgbaImage,
    format: OutputFormat,
    quality: u8,
    keep_alpha: bool,
) -> ImageResult<Vec<u8>> {
    let mut buffer = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let rgb_image = flatten(image, FLATTEN_BACKGROUND);
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            encoder.write_image(
                &rgb_image,
                rgb_image.width(),
                rgb_image.height(),
                image::ExtendedColorType::Rgb8,
            )?;
        }
        OutputFormat::Bmp => {
            let rgb_image = flatten(image, FLATTEN_BACKGROUND);
            DynamicImage::ImageRgb8(rgb_image)
                .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Bmp)?;
        }
        OutputFormat::Png => {
            let encoder = PngEncoder::new(&mut buffer);
            with_alpha_policy(image, keep_alpha).write_with_encoder(encoder)?;
        }
        OutputFormat::Tiff => {
            with_alpha_policy(image, keep_alpha)
                .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Tiff)?;
        }
    }

    trace!("Encoded {} bytes as {}", buffer.len(), format);
    Ok(buffer)
}

fn with_alpha_policy(image: &RgbaImage, keep_alpha: bool) -> DynamicImage {
    if keep_alpha {
        DynamicImage::ImageRgba8(image.clone())
    } else {
        DynamicImage::ImageRgb8(flatten(image, FLATTEN_BACKGROUND))
    }
}

/// Composite `image` over an opaque `background`, dropping the alpha channel.
pub fn flatten(image: &RgbaImage, background: Rgb<u8>) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        let alpha = pixel[3] as u32;
        let mut out = [0u8; 3];
        for (channel, value) in out.iter_mut().enumerate() {
            let blended = pixel[channel] as u32 * alpha + background[channel] as u32 * (255 - alpha);
            *value = ((blended + 127) / 255) as u8;
        }
        Rgb(out)
    })
}
