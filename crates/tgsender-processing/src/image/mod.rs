//! Image module
//!
//! - Orientation-aware resizing (resize)
//! - Photo preparation: resize, then compress when still over the upload limit (transformer)

pub mod resize;
pub mod transformer;

pub use resize::{ImageResize, ResizeConstraints};
pub use transformer::ImageTransformer;

use std::path::{Path, PathBuf};

/// `<dir>/<stem><suffix>.jpg` next to `original`.
pub(crate) fn derived_path(original: &Path, suffix: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    original.with_file_name(format!("{}{}.jpg", stem, suffix))
}
