//! Image processing for the Telegram sender
//!
//! - Generation metadata extraction (`metadata`)
//! - Orientation-aware resizing and photo preparation (`image`)
//! - Size-targeted JPEG compression (`compression`)

pub mod compression;
pub mod image;
pub mod metadata;

pub use compression::{CompressionResult, ImageCompressor};
pub use image::{ImageResize, ImageTransformer, ResizeConstraints};
pub use metadata::MetadataExtractor;

use tgsender_core::SenderError;

pub(crate) fn image_error(err: ::image::ImageError) -> SenderError {
    SenderError::ImageProcessing(err.to_string())
}
