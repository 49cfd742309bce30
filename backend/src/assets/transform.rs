//! Image normalization: bound, flatten, re-encode.
//!
//! Output is always an opaque RGB JPEG no larger than the bounding box, with
//! transparent areas composited onto white. Smaller images are not upscaled.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::{AssetError, AssetResult};

/// Decode `bytes`, fit them into `max_dimension` x `max_dimension` and encode as JPEG.
pub fn transcode(bytes: &[u8], max_dimension: u32, quality: u8) -> AssetResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AssetError::TransformFailed(format!("decode: {}", e)))?;

    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };

    let flattened = flatten_on_white(&img);

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, quality);
    DynamicImage::ImageRgb8(flattened)
        .write_with_encoder(encoder)
        .map_err(|e| AssetError::TransformFailed(format!("encode: {}", e)))?;
    Ok(out)
}

/// Composite every pixel over an opaque white background.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as u32;
        let blend = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}
