//! Image decoding and tensor construction
//!
//! Turns an encoded image into the channel-first, ImageNet-normalized `f32`
//! buffer the ResNet family expects. The function is pure: the same bytes
//! always produce the same buffer.

use foodgate_core::{Error, ImageInput, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader, Limits};
use std::io::Cursor;

/// Per-channel RGB mean of the ImageNet training set
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel RGB standard deviation of the ImageNet training set
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Maximum decoded pixel count (50 megapixels)
pub const MAX_PIXELS: u64 = 50_000_000;

/// Decoder allocation cap: [`MAX_PIXELS`] at 16-bit RGBA
pub const MAX_DECODE_ALLOC: u64 = MAX_PIXELS * 8;

/// Interpolation used for every resize
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// A decoded, resized and normalized image ready for inference
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedImage {
    data: Vec<f32>,
    shape: [usize; 3],
    original_width: u32,
    original_height: u32,
}

impl PreprocessedImage {
    /// An all-zero `[3, side, side]` tensor, i.e. a mean-colored image
    pub fn zeros(side: usize) -> Self {
        Self {
            data: vec![0.0; 3 * side * side],
            shape: [3, side, side],
            original_width: side as u32,
            original_height: side as u32,
        }
    }

    /// Flat buffer in `[channels, height, width]` order
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Tensor shape, `[3, size, size]`
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// Pixel dimensions of the image before resizing
    pub fn original_dimensions(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }
}

/// Decode `input` and build a `[3, target_size, target_size]` tensor.
///
/// Fails with [`Error::InvalidInput`] for empty, oversized or non-base64
/// payloads and with [`Error::Decode`] when the bytes are not a supported image.
pub fn preprocess(input: &ImageInput, target_size: u32) -> Result<PreprocessedImage> {
    if target_size == 0 {
        return Err(Error::invalid_input("target size must be positive"));
    }
    if input.is_empty() {
        return Err(Error::invalid_input(format!(
            "{} image payload is empty",
            input.kind()
        )));
    }

    let bytes = input.to_bytes()?;
    let image = decode(&bytes)?;
    let (original_width, original_height) = (image.width(), image.height());

    let rgb = image
        .resize_exact(target_size, target_size, RESIZE_FILTER)
        .to_rgb8();

    let side = target_size as usize;
    let plane = side * side;
    let mut data = vec![0f32; 3 * plane];
    for (i, pixel) in rgb.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }

    Ok(PreprocessedImage {
        data,
        shape: [3, side, side],
        original_width,
        original_height,
    })
}

fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::decode(format!("failed to sniff image format: {e}")))?;

    if reader.format().is_none() {
        return Err(Error::decode("unrecognized image format"));
    }

    reader.limits(decode_limits());

    let image = reader.decode().map_err(|e| match e {
        ImageError::Limits(limit) => {
            Error::invalid_input(format!("image exceeds decode limits: {limit}"))
        }
        other => Error::decode(other.to_string()),
    })?;

    let pixels = u64::from(image.width()) * u64::from(image.height());
    if pixels == 0 {
        return Err(Error::decode(format!(
            "image has no pixels: {}x{}",
            image.width(),
            image.height()
        )));
    }
    if pixels > MAX_PIXELS {
        return Err(Error::invalid_input(format!(
            "image too large: {}x{} pixels (max: {MAX_PIXELS})",
            image.width(),
            image.height()
        )));
    }

    Ok(image)
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};

    fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn encode_dynamic(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        encode(&RgbImage::from_pixel(width, height, Rgb(color)), ImageFormat::Png)
    }

    #[test]
    fn test_shape_and_dimensions() {
        let png = solid_png(64, 48, [200, 30, 30]);
        let tensor = preprocess(&ImageInput::from(png), 32).unwrap();

        assert_eq!(tensor.shape(), [3, 32, 32]);
        assert_eq!(tensor.data().len(), 3 * 32 * 32);
        assert_eq!(tensor.original_dimensions(), (64, 48));
    }

    #[test]
    fn test_normalization_values() {
        let png = solid_png(8, 8, [255, 0, 128]);
        let tensor = preprocess(&ImageInput::from(png), 4).unwrap();
        let plane = 16;

        let expected_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let expected_g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        let expected_b = (128.0 / 255.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];

        assert!((tensor.data()[0] - expected_r).abs() < 0.02);
        assert!((tensor.data()[plane] - expected_g).abs() < 0.02);
        assert!((tensor.data()[2 * plane + 5] - expected_b).abs() < 0.02);
    }

    #[test]
    fn test_channel_first_layout() {
        // Left half red, right half blue
        let image = RgbImage::from_fn(8, 8, |x, _| {
            if x < 4 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let tensor = preprocess(&ImageInput::from(encode(&image, ImageFormat::Png)), 8).unwrap();
        let data = tensor.data();

        // red channel, row 0: high on the left, low on the right
        assert!(data[0] > 2.0);
        assert!(data[7] < -2.0);
        // blue channel plane starts at 2 * 64
        assert!(data[128] < -1.0);
        assert!(data[128 + 7] > 2.0);
    }

    #[test]
    fn test_deterministic() {
        let image = RgbImage::from_fn(37, 23, |x, y| {
            Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8])
        });
        let jpeg = encode(&image, ImageFormat::Jpeg);

        let a = preprocess(&ImageInput::from(jpeg.clone()), 224).unwrap();
        let b = preprocess(&ImageInput::from(jpeg), 224).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_base64_matches_bytes() {
        let png = solid_png(10, 10, [10, 200, 90]);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

        let from_bytes = preprocess(&ImageInput::from(png), 16).unwrap();
        let from_b64 = preprocess(&ImageInput::from(encoded), 16).unwrap();
        assert_eq!(from_bytes, from_b64);
    }

    #[test]
    fn test_truncated_image_is_decode_error() {
        let png = solid_png(32, 32, [1, 2, 3]);
        let truncated = png[..png.len() / 2].to_vec();

        let err = preprocess(&ImageInput::from(truncated), 16).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_unknown_format_is_decode_error() {
        let input = ImageInput::from(b"definitely not an image".to_vec());
        let err = preprocess(&input, 16).unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[test]
    fn test_empty_input_is_invalid() {
        let err = preprocess(&ImageInput::from(Vec::new()), 16).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = preprocess(&ImageInput::from("   "), 16).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_sixteen_bit_images_decode() {
        let image = ImageBuffer::<Rgb<u16>, Vec<u16>>::from_pixel(12, 9, Rgb([65535, 0, 32768]));
        let png = encode_dynamic(DynamicImage::ImageRgb16(image), ImageFormat::Png);

        let tensor = preprocess(&ImageInput::from(png), 4).unwrap();
        assert_eq!(tensor.original_dimensions(), (12, 9));
        assert!(tensor.data()[0] > 2.0);
    }

    #[test]
    fn test_alloc_limit_covers_sixteen_bit_rgba() {
        // 8 bytes per pixel at 16-bit RGBA
        assert_eq!(decode_limits().max_alloc, Some(MAX_PIXELS * 8));
        assert_eq!(MAX_DECODE_ALLOC, 400_000_000);
    }

    #[test]
    fn test_zero_target_size_is_invalid() {
        let png = solid_png(4, 4, [0, 0, 0]);
        let err = preprocess(&ImageInput::from(png), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
