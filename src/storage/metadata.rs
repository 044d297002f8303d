//! Generation parameters stored inside the PNG as a text chunk.

use crate::{
    error::{Result, StudioError},
    models::GenerationMetadata,
};
use image::DynamicImage;
use std::io::Cursor;

pub const METADATA_KEYWORD: &str = "genstudio";

/// Raw PNG scanlines for `image`, keeping its channel layout and bit depth.
/// 16-bit samples are written big-endian; float images drop to 16 bits.
fn png_pixels(image: DynamicImage) -> (png::ColorType, png::BitDepth, Vec<u8>) {
    fn be16(samples: &[u16]) -> Vec<u8> {
        samples.iter().flat_map(|sample| sample.to_be_bytes()).collect()
    }

    use png::{BitDepth, ColorType};
    match image {
        DynamicImage::ImageLuma8(img) => (ColorType::Grayscale, BitDepth::Eight, img.into_raw()),
        DynamicImage::ImageLumaA8(img) => {
            (ColorType::GrayscaleAlpha, BitDepth::Eight, img.into_raw())
        }
        DynamicImage::ImageRgb8(img) => (ColorType::Rgb, BitDepth::Eight, img.into_raw()),
        DynamicImage::ImageRgba8(img) => (ColorType::Rgba, BitDepth::Eight, img.into_raw()),
        DynamicImage::ImageLuma16(img) => (ColorType::Grayscale, BitDepth::Sixteen, be16(&img)),
        DynamicImage::ImageLumaA16(img) => {
            (ColorType::GrayscaleAlpha, BitDepth::Sixteen, be16(&img))
        }
        DynamicImage::ImageRgb16(img) => (ColorType::Rgb, BitDepth::Sixteen, be16(&img)),
        DynamicImage::ImageRgba16(img) => (ColorType::Rgba, BitDepth::Sixteen, be16(&img)),
        rgb @ DynamicImage::ImageRgb32F(_) => {
            (ColorType::Rgb, BitDepth::Sixteen, be16(&rgb.to_rgb16()))
        }
        other => (ColorType::Rgba, BitDepth::Sixteen, be16(&other.to_rgba16())),
    }
}

/// Re-encodes `image_bytes` (any format the `image` crate can decode) as a
/// PNG carrying `metadata` as JSON under [`METADATA_KEYWORD`]. The decoded
/// colour type and bit depth are kept.
pub fn embed_metadata(image_bytes: &[u8], metadata: &GenerationMetadata) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| StudioError::ImageError(e.to_string()))?;
    let (width, height) = (decoded.width(), decoded.height());
    let (color, depth, pixels) = png_pixels(decoded);

    let text = serde_json::to_string(metadata)
        .map_err(|e| StudioError::SerializationError(e.to_string()))?;

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(depth);

        // tEXt only carries Latin-1.
        let chunk = if text.chars().all(|c| (c as u32) < 0x100) {
            encoder.add_text_chunk(METADATA_KEYWORD.to_string(), text)
        } else {
            encoder.add_itxt_chunk(METADATA_KEYWORD.to_string(), text)
        };
        chunk.map_err(|e| StudioError::ImageError(e.to_string()))?;

        let mut writer = encoder
            .write_header()
            .map_err(|e| StudioError::ImageError(e.to_string()))?;
        writer
            .write_image_data(&pixels)
            .map_err(|e| StudioError::ImageError(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| StudioError::ImageError(e.to_string()))?;
    }
    Ok(out)
}

/// Reads the embedded metadata back. `Ok(None)` when the PNG has none.
pub fn read_metadata(png_bytes: &[u8]) -> Result<Option<GenerationMetadata>> {
    let mut decoder = png::Decoder::new(Cursor::new(png_bytes));
    decoder.set_ignore_text_chunk(false);
    let reader = decoder
        .read_info()
        .map_err(|e| StudioError::ImageError(e.to_string()))?;
    let info = reader.info();

    let text = info
        .uncompressed_latin1_text
        .iter()
        .find(|chunk| chunk.keyword == METADATA_KEYWORD)
        .map(|chunk| Ok(chunk.text.clone()))
        .or_else(|| {
            info.utf8_text
                .iter()
                .find(|chunk| chunk.keyword == METADATA_KEYWORD)
                .map(|chunk| chunk.get_text())
        });

    match text {
        Some(Ok(text)) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StudioError::SerializationError(e.to_string())),
        Some(Err(e)) => Err(StudioError::ImageError(e.to_string())),
        None => Ok(None),
    }
}
