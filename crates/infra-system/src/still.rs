// Native still-image pipeline (decode, orient, flatten, downscale, encode)
//
// Everything here is blocking and CPU-bound; callers run it on spawn_blocking.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageError, ImageReader, Rgb, RgbImage};
use mediapress_core::domain::ImageFormat;
use mediapress_core::port::CompressionError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub(crate) fn image_error(err: ImageError) -> CompressionError {
    match err {
        ImageError::IoError(e) => CompressionError::from(e),
        ImageError::Unsupported(e) => CompressionError::UnsupportedMedia(e.to_string()),
        other => CompressionError::Failed(format!("Image processing failed: {other}")),
    }
}

/// Decode and apply the EXIF orientation, if the container carries one
pub fn decode_oriented(path: &Path) -> Result<DynamicImage, CompressionError> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(image_error)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(image_error)?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Composite any alpha channel onto a white background
pub fn flatten_onto_white(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.into_rgb8();
    }
    let rgba = img.into_rgba8();
    let (width, height) = rgba.dimensions();
    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Target size keeping aspect ratio so the longest edge is at most `max_edge`.
/// `None` when the image already fits.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_edge || longest == 0 {
        return None;
    }
    let scale = |side: u32| ((u64::from(side) * u64::from(max_edge) + u64::from(longest) / 2) / u64::from(longest)).max(1) as u32;
    Some((scale(width), scale(height)))
}

pub fn downscale(img: RgbImage, max_edge: Option<u32>) -> RgbImage {
    let Some(max_edge) = max_edge else {
        return img;
    };
    match fit_within(img.width(), img.height(), max_edge) {
        Some((w, h)) => imageops::resize(&img, w, h, FilterType::Lanczos3),
        None => img,
    }
}

/// Encode into any writer. Quality only applies to JPEG; PNG uses maximum compression
/// and WebP is written lossless.
pub fn encode<W: Write>(
    img: &RgbImage,
    format: ImageFormat,
    quality: u8,
    writer: W,
) -> Result<(), CompressionError> {
    let result = match format {
        ImageFormat::Jpg => img.write_with_encoder(JpegEncoder::new_with_quality(writer, quality)),
        ImageFormat::Png => img.write_with_encoder(PngEncoder::new_with_quality(
            writer,
            CompressionType::Best,
            PngFilter::Adaptive,
        )),
        ImageFormat::Webp => img.write_with_encoder(WebPEncoder::new_lossless(writer)),
    };
    result.map_err(image_error)
}

/// Full still compression from one file to another
pub fn compress_still(
    input: &Path,
    output: &Path,
    format: ImageFormat,
    quality: u8,
    max_edge: Option<u32>,
) -> Result<(), CompressionError> {
    let img = downscale(flatten_onto_white(decode_oriented(input)?), max_edge);

    let mut writer = BufWriter::new(File::create(output)?);
    encode(&img, format, quality, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// JPEG preview bounded by `max_edge`
pub fn jpeg_thumbnail(input: &Path, max_edge: u32, quality: u8) -> Result<Vec<u8>, CompressionError> {
    let img = downscale(flatten_onto_white(decode_oriented(input)?), Some(max_edge));
    let mut bytes = Vec::new();
    encode(&img, ImageFormat::Jpg, quality, &mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(100, 50, 200), None);
        assert_eq!(fit_within(4000, 3000, 2048), Some((2048, 1536)));
        assert_eq!(fit_within(3000, 4000, 200), Some((150, 200)));
        assert_eq!(fit_within(10_000, 1, 200), Some((200, 1)));
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        rgba.put_pixel(1, 0, Rgba([10, 20, 30, 255]));

        let flat = flatten_onto_white(DynamicImage::ImageRgba8(rgba));
        assert_eq!(flat.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(flat.get_pixel(1, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_compress_still_downscales_png_to_jpg() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("big.png");
        let output = dir.path().join("small.jpg");
        RgbaImage::from_pixel(400, 300, Rgba([200, 100, 50, 128]))
            .save(&input)
            .unwrap();

        compress_still(&input, &output, ImageFormat::Jpg, 80, Some(200)).unwrap();

        let decoded = image::open(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (200, 150));
    }

    #[test]
    fn test_thumbnail_is_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("pic.webp");
        RgbImage::from_pixel(50, 80, Rgb([1, 2, 3])).save(&input).unwrap();

        let bytes = jpeg_thumbnail(&input, 200, 70).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fake.jpg");
        std::fs::write(&input, b"definitely not an image").unwrap();
        assert!(decode_oriented(&input).is_err());
    }
}
