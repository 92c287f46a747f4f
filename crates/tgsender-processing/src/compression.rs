use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use tgsender_core::constants::{
    BASE_JPEG_QUALITY, COMPRESSED_SUFFIX, JPEG_QUALITY_STEP, MIN_JPEG_QUALITY,
};
use tgsender_core::SenderResult;

use crate::image::derived_path;
use crate::image_error;

/// Final encoding chosen by the compressor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionResult {
    pub path: PathBuf,
    pub quality: u8,
    pub size_bytes: u64,
    /// Whether `size_bytes` is within the requested target
    pub within_target: bool,
}

/// Size-targeted JPEG re-encoding
pub struct ImageCompressor;

impl ImageCompressor {
    /// Qualities tried in order: 85, 75, ... down to a last attempt at 30.
    pub fn quality_schedule() -> Vec<u8> {
        let mut schedule = vec![BASE_JPEG_QUALITY];
        let mut quality = BASE_JPEG_QUALITY;
        loop {
            match quality.checked_sub(JPEG_QUALITY_STEP) {
                Some(next) if next >= MIN_JPEG_QUALITY => {
                    schedule.push(next);
                    quality = next;
                }
                _ => {
                    if quality > MIN_JPEG_QUALITY {
                        schedule.push(MIN_JPEG_QUALITY);
                    }
                    break;
                }
            }
        }
        schedule
    }

    /// Re-encode `path` as JPEG, lowering quality until the file fits in
    /// `target_bytes` or the quality floor is reached.
    ///
    /// Writes `<stem>_compressed.jpg` next to the input. When even the lowest
    /// quality is too large, that encoding is written anyway.
    pub fn compress(path: &Path, target_bytes: u64) -> SenderResult<CompressionResult> {
        let img = image::open(path).map_err(image_error)?;
        let rgb = img.to_rgb8();
        let output = derived_path(path, COMPRESSED_SUFFIX);

        let mut last: Option<(u8, Vec<u8>)> = None;
        for quality in Self::quality_schedule() {
            let encoded = encode_jpeg(&rgb, quality)?;
            let size = encoded.len() as u64;

            tracing::debug!(
                path = %path.display(),
                quality = quality,
                size_bytes = size,
                target_bytes = target_bytes,
                "Compression attempt"
            );

            if size <= target_bytes {
                std::fs::write(&output, &encoded)?;
                return Ok(CompressionResult {
                    path: output,
                    quality,
                    size_bytes: size,
                    within_target: true,
                });
            }
            last = Some((quality, encoded));
        }

        // The schedule is never empty, so `last` holds the floor encoding.
        let (quality, encoded) = last.unwrap_or_default();
        std::fs::write(&output, &encoded)?;

        tracing::warn!(
            path = %path.display(),
            quality = quality,
            size_bytes = encoded.len(),
            target_bytes = target_bytes,
            "Image still exceeds target at minimum quality"
        );

        Ok(CompressionResult {
            path: output,
            quality,
            size_bytes: encoded.len() as u64,
            within_target: false,
        })
    }
}

pub(crate) fn encode_jpeg(rgb: &RgbImage, quality: u8) -> SenderResult<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(rgb)
        .map_err(image_error)?;
    Ok(buffer)
}

pub(crate) fn write_jpeg(img: &DynamicImage, quality: u8, output: &Path) -> SenderResult<u64> {
    let encoded = encode_jpeg(&img.to_rgb8(), quality)?;
    std::fs::write(output, &encoded)?;
    Ok(encoded.len() as u64)
}
