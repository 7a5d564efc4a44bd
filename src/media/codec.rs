/// Raster encode/decode helpers
///
/// Images are stored as `data:<mime>;base64,<payload>` strings. Every
/// encoding we produce is a JPEG at a fixed quality so stored size stays
/// bounded.
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, ImageReader};
use std::io::Cursor;

use crate::error::{NoteVaultError, Result};

pub const JPEG_MIME: &str = "image/jpeg";

/// Target bounding box and JPEG quality for a re-encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// JPEG quality 1-100
    pub quality: u8,
}

/// Build a data URL from raw bytes
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Split a base64 data URL into its MIME type and decoded bytes
pub fn decode_data_url(url: &str) -> Result<(String, Vec<u8>)> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| NoteVaultError::DataUrl("missing 'data:' prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| NoteVaultError::DataUrl("missing ',' separator".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| NoteVaultError::DataUrl("payload is not base64".to_string()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| NoteVaultError::DataUrl(e.to_string()))?;
    Ok((mime.to_string(), bytes))
}

/// Decode any supported raster format from memory
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NoteVaultError::DataUrl(e.to_string()))?
        .decode()?;
    Ok(img)
}

/// Decode the image held in a data URL
pub fn decode_data_url_image(url: &str) -> Result<DynamicImage> {
    let (_, bytes) = decode_data_url(url)?;
    decode_image(&bytes)
}

/// Width and height of a data URL image, read from its header only
pub fn natural_size(url: &str) -> Result<(u32, u32)> {
    let (_, bytes) = decode_data_url(url)?;
    let dims = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NoteVaultError::DataUrl(e.to_string()))?
        .into_dimensions()?;
    Ok(dims)
}

/// Size that fits `(width, height)` inside the bounding box without upscaling
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width.max(1), height.max(1));
    }
    let scale = (max_width as f64 / width as f64)
        .min(max_height as f64 / height as f64)
        .min(1.0);
    let target_w = ((width as f64 * scale).round() as u32).max(1);
    let target_h = ((height as f64 * scale).round() as u32).max(1);
    (target_w, target_h)
}

/// Encode as JPEG at the given quality
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    encoder.encode_image(&rgb)?;
    Ok(buffer)
}

/// Rescale to fit the options' bounding box and re-encode as a JPEG data URL
pub fn compress_image(img: &DynamicImage, opts: &CompressOptions) -> Result<String> {
    let (target_w, target_h) = fit_within(img.width(), img.height(), opts.max_width, opts.max_height);

    let jpeg = if (target_w, target_h) == (img.width(), img.height()) {
        encode_jpeg(img, opts.quality)?
    } else {
        let resized = img.resize_exact(target_w, target_h, FilterType::Lanczos3);
        encode_jpeg(&resized, opts.quality)?
    };

    Ok(encode_data_url(JPEG_MIME, &jpeg))
}

/// Decode raw file bytes, rescale and re-encode
pub fn compress_bytes(bytes: &[u8], opts: &CompressOptions) -> Result<String> {
    let img = decode_image(bytes)?;
    compress_image(&img, opts)
}

/// Re-encode an existing data URL with different options
pub fn compress_data_url(url: &str, opts: &CompressOptions) -> Result<String> {
    let img = decode_data_url_image(url)?;
    compress_image(&img, opts)
}
