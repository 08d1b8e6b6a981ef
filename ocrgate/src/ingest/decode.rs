use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, RgbImage, RgbaImage};

use super::source::RawImage;
use crate::error::{OcrGateError, Result};

/// A decoded image normalised to 8-bit, 3-channel RGB.
///
/// Cloning shares the pixel buffer, so engines can hand it to the blocking
/// pool without copying.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<RgbImage>,
}

impl DecodedImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels: Arc::new(pixels),
        }
    }

    /// Encode as PNG, the interchange format handed to OCR engines.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.pixels)
    }
}

pub(crate) fn encode_png(pixels: &RgbImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    pixels
        .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| OcrGateError::Internal(format!("Failed to encode image: {e}")))?;
    Ok(output)
}

/// Decode raw bytes and normalise the colour layout to RGB.
///
/// The format is guessed from the content rather than the declared type,
/// since data-URI mimes and server headers are frequently wrong.
pub fn decode(raw: &RawImage) -> Result<DecodedImage> {
    let reader = ImageReader::new(Cursor::new(&raw.bytes))
        .with_guessed_format()
        .map_err(|e| OcrGateError::Decode(format!("Failed to read image: {e}")))?;

    if reader.format().is_none() {
        return Err(OcrGateError::Decode(format!(
            "Unrecognized image format (declared {})",
            raw.content_type.as_deref().unwrap_or("unknown")
        )));
    }

    let img = reader
        .decode()
        .map_err(|e| OcrGateError::Decode(format!("Failed to decode image: {e}")))?;

    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrGateError::Decode(format!(
            "Image has no pixels: {width}x{height}"
        )));
    }

    let color = img.color();
    let pixels = to_rgb(img);
    tracing::debug!(width, height, ?color, "Image decoded");

    Ok(DecodedImage::from_rgb(pixels))
}

fn to_rgb(img: DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        img if img.color().has_alpha() => flatten_alpha(&img.to_rgba8()),
        img => img.to_rgb8(),
    }
}

/// Composite onto a white background so transparent regions read as paper.
fn flatten_alpha(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    fn encode(img: DynamicImage, format: ImageFormat) -> RawImage {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        RawImage::new(bytes, None)
    }

    #[test]
    fn test_decode_rgb_png() {
        let raw = encode(DynamicImage::new_rgb8(120, 40), ImageFormat::Png);
        let decoded = decode(&raw).unwrap();
        assert_eq!((decoded.width, decoded.height), (120, 40));
        assert_eq!(decoded.pixels.dimensions(), (120, 40));
    }

    #[test]
    fn test_grayscale_expands_to_three_channels() {
        let gray = GrayImage::from_pixel(4, 4, Luma([80]));
        let raw = encode(DynamicImage::ImageLuma8(gray), ImageFormat::Png);
        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.pixels.get_pixel(2, 2).0, [80, 80, 80]);
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let mut rgba = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));
        let raw = encode(DynamicImage::ImageRgba8(rgba), ImageFormat::Png);

        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded.pixels.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(decoded.pixels.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_half_alpha_blends_toward_white() {
        let rgba = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let rgb = flatten_alpha(&rgba);
        assert_eq!(rgb.get_pixel(0, 0).0, [127, 127, 127]);
    }

    #[test]
    fn test_jpeg_is_supported() {
        let raw = encode(DynamicImage::new_rgb8(16, 16), ImageFormat::Jpeg);
        assert!(decode(&raw).is_ok());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let raw = RawImage::new(vec![0, 1, 2, 3, 4, 5], None);
        let err = decode(&raw).unwrap_err();
        assert!(matches!(err, OcrGateError::Decode(_)));
    }

    #[test]
    fn test_truncated_png_is_decode_error() {
        let mut raw = encode(DynamicImage::new_rgb8(64, 64), ImageFormat::Png);
        raw.bytes.truncate(raw.bytes.len() / 2);
        let err = decode(&raw).unwrap_err();
        assert!(matches!(err, OcrGateError::Decode(_)));
    }

    #[test]
    fn test_png_round_trip_keeps_dimensions() {
        let decoded = DecodedImage::from_rgb(RgbImage::new(30, 10));
        let png = decoded.to_png().unwrap();
        let again = decode(&RawImage::new(png, None)).unwrap();
        assert_eq!((again.width, again.height), (30, 10));
    }
}
