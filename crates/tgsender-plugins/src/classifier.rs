//! Classifier abstraction
//!
//! The classification model itself is opaque: implementations only have to
//! return a binary label and a confidence score for an image on disk.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

/// Binary classifier verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NsfwLabel {
    Nsfw,
    Sfw,
}

impl NsfwLabel {
    /// Map a provider label onto the binary verdict.
    pub fn from_provider_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "nsfw" | "unsafe" | "explicit" | "porn" | "hentai" | "sexy" => NsfwLabel::Nsfw,
            _ => NsfwLabel::Sfw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: NsfwLabel,
    /// Confidence in `label`, 0.0-1.0
    pub score: f32,
}

impl Classification {
    /// Whether this verdict triggers the NSFW override at `threshold`.
    pub fn is_nsfw_at(&self, threshold: f32) -> bool {
        self.label == NsfwLabel::Nsfw && self.score >= threshold
    }
}

/// Trait that all NSFW classifiers must implement
#[async_trait]
pub trait NsfwClassifier: Send + Sync + Debug {
    /// Classifier name used in logs
    fn name(&self) -> &str;

    /// Classify the image stored at `path`
    async fn classify(&self, path: &Path) -> Result<Classification>;
}
