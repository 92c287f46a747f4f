//! Image transformer - prepares a saved image for `sendPhoto`
//!
//! Chains the resize and compression steps and falls back to the untouched
//! original whenever a step fails.

use std::path::{Path, PathBuf};

use tgsender_core::{SenderResult, TransferArtifact};

use crate::compression::ImageCompressor;
use crate::image::resize::{ImageResize, ResizeConstraints};

pub struct ImageTransformer;

impl ImageTransformer {
    /// See [`ImageResize::resize`].
    pub fn resize(path: &Path, constraints: &ResizeConstraints) -> SenderResult<PathBuf> {
        ImageResize::resize(path, constraints)
    }

    /// See [`ImageCompressor::compress`].
    pub fn compress(path: &Path, target_bytes: u64) -> SenderResult<PathBuf> {
        ImageCompressor::compress(path, target_bytes).map(|result| result.path)
    }

    /// Produce the artifact to upload as a photo.
    ///
    /// Never fails: a resize or compression error leaves the previous stage's
    /// file in place and is logged.
    pub fn prepare_photo(original: &Path, constraints: &ResizeConstraints) -> TransferArtifact {
        let mut current = match Self::resize(original, constraints) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    path = %original.display(),
                    error = %e,
                    "Resize failed, sending original image"
                );
                original.to_path_buf()
            }
        };

        match std::fs::metadata(&current) {
            Ok(meta) if meta.len() > constraints.max_photo_bytes => {
                match Self::compress(&current, constraints.max_photo_bytes) {
                    Ok(compressed) => {
                        if current != original {
                            remove_intermediate(&current);
                        }
                        current = compressed;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %current.display(),
                            error = %e,
                            "Compression failed, sending uncompressed image"
                        );
                    }
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    path = %current.display(),
                    error = %e,
                    "Failed to check prepared image size"
                );
            }
        }

        if current == original {
            return TransferArtifact::original(original);
        }

        match TransferArtifact::temporary(&current, original) {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::error!(error = %e, "Refusing to treat original as temporary");
                TransferArtifact::original(original)
            }
        }
    }
}

fn remove_intermediate(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed intermediate artifact"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove intermediate artifact"
        ),
    }
}
