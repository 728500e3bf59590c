use std::io::Cursor;

use image::{DynamicImage, ImageFormat, ImageReader, Pixel, Rgb, Rgba};

use crate::error::{GlimpseError, Result};
use crate::models::{ImagePayload, Preprocess};

/// Luma weights applied to (r, g, b).
const LUMA_WEIGHTS: [f64; 3] = [0.30, 0.59, 0.11];

/// Grey levels strictly above this become white when binarizing.
pub const BINARY_THRESHOLD: u8 = 128;

/// Unrounded luma of one RGB triple, in the channels' own units.
pub fn raw_luma(r: f64, g: f64, b: f64) -> f64 {
    LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b
}

/// Perceptual intensity of one 8-bit RGB triple, rounded to the nearest level.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    raw_luma(f64::from(r), f64::from(g), f64::from(b))
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Integer channel depths the transform works on without narrowing.
trait Level: Copy {
    const MAX: f64;
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Level for u8 {
    const MAX: f64 = 255.0;
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, <Self as Level>::MAX) as u8
    }
}

impl Level for u16 {
    const MAX: f64 = 65535.0;
    fn to_f64(self) -> f64 {
        f64::from(self)
    }
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, <Self as Level>::MAX) as u16
    }
}

fn intensity<T: Level>(channels: &[T], binarize: bool) -> T {
    let raw = raw_luma(channels[0].to_f64(), channels[1].to_f64(), channels[2].to_f64());
    if !binarize {
        return T::from_f64(raw);
    }
    // The cutoff is defined on the 0..=255 scale and applied before rounding.
    let on_8bit_scale = raw * 255.0 / T::MAX;
    if on_8bit_scale > f64::from(BINARY_THRESHOLD) {
        T::from_f64(T::MAX)
    } else {
        T::from_f64(0.0)
    }
}

fn apply<P>(pixel: &mut P, binarize: bool)
where
    P: Pixel,
    P::Subpixel: Level,
{
    let channels = pixel.channels_mut();
    let value = intensity(channels, binarize);
    // Only the colour channels change; a fourth (alpha) channel is left as is.
    for channel in channels.iter_mut().take(3) {
        *channel = value;
    }
}

/// Replace every pixel's colour channels with its derived intensity.
///
/// Works in place on 8- and 16-bit RGB or RGBA buffers. Luma inputs are
/// widened to RGB(A) at the same depth; float inputs are narrowed to 8-bit.
pub fn transform_pixels(img: DynamicImage, binarize: bool) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(mut rgb) => {
            rgb.pixels_mut().for_each(|p: &mut Rgb<u8>| apply(p, binarize));
            DynamicImage::ImageRgb8(rgb)
        }
        DynamicImage::ImageRgba8(mut rgba) => {
            rgba.pixels_mut()
                .for_each(|p: &mut Rgba<u8>| apply(p, binarize));
            DynamicImage::ImageRgba8(rgba)
        }
        DynamicImage::ImageRgb16(mut rgb) => {
            rgb.pixels_mut().for_each(|p: &mut Rgb<u16>| apply(p, binarize));
            DynamicImage::ImageRgb16(rgb)
        }
        DynamicImage::ImageRgba16(mut rgba) => {
            rgba.pixels_mut()
                .for_each(|p: &mut Rgba<u16>| apply(p, binarize));
            DynamicImage::ImageRgba16(rgba)
        }
        other => {
            let sixteen_bit = matches!(
                other,
                DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_)
            );
            let widened = match (sixteen_bit, other.color().has_alpha()) {
                (true, true) => DynamicImage::ImageRgba16(other.to_rgba16()),
                (true, false) => DynamicImage::ImageRgb16(other.to_rgb16()),
                (false, true) => DynamicImage::ImageRgba8(other.to_rgba8()),
                (false, false) => DynamicImage::ImageRgb8(other.to_rgb8()),
            };
            transform_pixels(widened, binarize)
        }
    }
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| GlimpseError::Decode(format!("Failed to read image: {e}")))?;

    reader
        .decode()
        .map_err(|e| GlimpseError::Decode(format!("Failed to decode image: {e}")))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| GlimpseError::Encode(format!("Failed to encode image: {e}")))?;
    Ok(output)
}

/// Decode, convert to grayscale (optionally binarized) and re-encode as PNG.
pub fn preprocess_image(bytes: &[u8], binarize: bool) -> Result<Vec<u8>> {
    let img = decode(bytes)?;
    let img = transform_pixels(img, binarize);
    encode_png(&img)
}

/// Apply the requested transform to a payload, producing a new PNG payload.
///
/// `Preprocess::None` hands the payload back untouched.
pub fn preprocess_payload(payload: ImagePayload, mode: Preprocess) -> Result<ImagePayload> {
    let binarize = match mode {
        Preprocess::None => return Ok(payload),
        Preprocess::Grayscale => false,
        Preprocess::Binary => true,
    };

    let png = preprocess_image(payload.bytes(), binarize)?;
    Ok(ImagePayload::new(png, "image/png"))
}
