use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tgsender_core::constants::{BASE_JPEG_QUALITY, PHOTO_SIZE_LIMIT_BYTES, RESIZED_SUFFIX};
use tgsender_core::{SenderConfig, SenderResult};

use crate::compression::write_jpeg;
use crate::image::derived_path;
use crate::image_error;

/// Size limits applied to images sent as photos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeConstraints {
    /// Longest side allowed for portrait images
    pub portrait_max_size: u32,
    /// Width allowed for landscape and square images
    pub landscape_max_width: u32,
    /// Upload ceiling; larger artifacts are compressed before sending
    pub max_photo_bytes: u64,
}

impl Default for ResizeConstraints {
    fn default() -> Self {
        Self::from_config(&SenderConfig::default())
    }
}

impl ResizeConstraints {
    pub fn from_config(config: &SenderConfig) -> Self {
        Self {
            portrait_max_size: config.portrait_max_size,
            landscape_max_width: config.landscape_max_width,
            max_photo_bytes: PHOTO_SIZE_LIMIT_BYTES,
        }
    }

    /// Bound for an image of the given size.
    pub fn limit_for(&self, width: u32, height: u32) -> u32 {
        if width >= height {
            self.landscape_max_width
        } else {
            self.portrait_max_size
        }
    }
}

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Target size for an image, or `None` if it already fits.
    ///
    /// The aspect ratio is kept; the longer side is scaled down to the limit.
    pub fn target_dimensions(
        width: u32,
        height: u32,
        constraints: &ResizeConstraints,
    ) -> Option<(u32, u32)> {
        let limit = constraints.limit_for(width, height);
        let longest = width.max(height);
        if longest <= limit || longest == 0 {
            return None;
        }

        let ratio = limit as f64 / longest as f64;
        let new_width = ((width as f64 * ratio) as u32).max(1);
        let new_height = ((height as f64 * ratio) as u32).max(1);
        Some((new_width, new_height))
    }

    /// Resize the image at `path` to fit `constraints`.
    ///
    /// Returns `path` itself when no resize is needed. Otherwise the resized
    /// image is written as `<stem>_resized.jpg` at quality 85 and that path
    /// is returned.
    pub fn resize(path: &Path, constraints: &ResizeConstraints) -> SenderResult<PathBuf> {
        let (width, height) = image::image_dimensions(path).map_err(image_error)?;

        let Some((new_width, new_height)) = Self::target_dimensions(width, height, constraints)
        else {
            return Ok(path.to_path_buf());
        };

        let img = image::open(path).map_err(image_error)?;
        let resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);

        let output = derived_path(path, RESIZED_SUFFIX);
        let size_bytes = write_jpeg(&resized, BASE_JPEG_QUALITY, &output)?;

        tracing::debug!(
            path = %path.display(),
            output = %output.display(),
            from = %format!("{}x{}", width, height),
            to = %format!("{}x{}", new_width, new_height),
            size_bytes = size_bytes,
            "Image resized"
        );

        Ok(output)
    }
}
