/// Crop rendering
///
/// Samples a square region of the original (never re-cropped) image and
/// scales it onto a fixed-size square canvas before re-encoding.
use image::imageops::FilterType;

use super::codec::{decode_data_url_image, encode_data_url, encode_jpeg, JPEG_MIME};
use crate::crop::SourceRegion;
use crate::error::Result;

/// Crop `region` out of `source_url` into an `output_size`² JPEG data URL
pub fn render_crop(source_url: &str, region: SourceRegion, output_size: u32, quality: u8) -> Result<String> {
    let source = decode_data_url_image(source_url)?;

    // Region was computed against the same natural size, but stay inside
    // the decoded bounds regardless
    let x = region.x.min(source.width().saturating_sub(1));
    let y = region.y.min(source.height().saturating_sub(1));
    let size = region
        .size
        .min(source.width() - x)
        .min(source.height() - y)
        .max(1);

    let cropped = source.crop_imm(x, y, size, size);
    let canvas = cropped.resize_exact(output_size, output_size, FilterType::Lanczos3);
    let jpeg = encode_jpeg(&canvas, quality)?;

    log::debug!(
        "Rendered crop {}x{} at ({}, {}) onto {}x{}",
        size, size, x, y, output_size, output_size
    );
    Ok(encode_data_url(JPEG_MIME, &jpeg))
}

/// Background version of `render_crop` for the UI
pub async fn render_crop_async(
    source_url: String,
    region: SourceRegion,
    output_size: u32,
    quality: u8,
) -> std::result::Result<String, String> {
    // Spawn blocking because resampling is CPU-intensive
    tokio::task::spawn_blocking(move || {
        render_crop(&source_url, region, output_size, quality).map_err(|e| e.user_message())
    })
    .await
    .map_err(|e| format!("Task join error: {}", e))?
}
