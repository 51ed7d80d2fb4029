//! Embedded texture extraction.
//!
//! Depth-capable cameras embed one or more preview JPEGs after the primary
//! image data. The mesh texture is the embedded image whose pixel width
//! matches the primary photo, re-encoded at a fixed square resolution.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use log::{debug, warn};

/// Output texture edge length in pixels.
pub const TEXTURE_SIZE: u32 = 2048;

/// JPEG quality for the re-encoded texture.
pub const TEXTURE_QUALITY: u8 = 90;

/// Scan the raw bytes for embedded JPEG sub-images and return the first one
/// that decodes with the expected pixel width.
///
/// Candidates that fail to decode are skipped. When nothing matches, the
/// whole buffer is decoded as a single image instead, so a photo without a
/// separate preview still gets a texture.
pub fn extract_texture(data: &[u8], expected_width: u32) -> Result<DynamicImage> {
    for offset in edof::jpeg_soi_offsets(data) {
        let decoded = match image::load_from_memory(&data[offset..]) {
            Ok(decoded) => decoded,
            Err(_) => continue,
        };

        if decoded.width() == expected_width {
            debug!(
                "texture sub-image at offset {} ({}x{})",
                offset,
                decoded.width(),
                decoded.height()
            );
            return Ok(decoded);
        }
    }

    warn!("no embedded sub-image is {expected_width}px wide, using the whole buffer");
    image::load_from_memory(data).context("no decodable image in input")
}

/// Resize to the fixed square resolution and write as quality-90 JPEG.
pub fn write_texture(image: &DynamicImage, path: &Path) -> Result<()> {
    let resized = image.resize_exact(TEXTURE_SIZE, TEXTURE_SIZE, FilterType::CatmullRom);

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let mut encoder = JpegEncoder::new_with_quality(&mut out, TEXTURE_QUALITY);
    encoder
        .encode_image(&resized.to_rgb8())
        .with_context(|| format!("encoding {}", path.display()))?;

    out.flush()?;
    Ok(())
}
