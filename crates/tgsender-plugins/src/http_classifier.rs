//! HTTP-backed NSFW classifier
//!
//! Posts the image as multipart form data (`image` field) to a classification
//! service and expects `{"label": "nsfw" | "sfw", "score": 0.0-1.0}` back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;

use crate::classifier::{Classification, NsfwClassifier, NsfwLabel};

/// HTTP classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpNsfwClassifierConfig {
    /// Classification endpoint URL
    pub endpoint: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

impl HttpNsfwClassifierConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClassifierResponse {
    label: String,
    score: f32,
}

pub struct HttpNsfwClassifier {
    http_client: reqwest::Client,
    config: HttpNsfwClassifierConfig,
}

impl Debug for HttpNsfwClassifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpNsfwClassifier")
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

impl HttpNsfwClassifier {
    pub fn new(config: HttpNsfwClassifierConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            anyhow::bail!("Classifier endpoint must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client for NSFW classifier")?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl NsfwClassifier for HttpNsfwClassifier {
    fn name(&self) -> &str {
        "http_nsfw_classifier"
    }

    async fn classify(&self, path: &Path) -> Result<Classification> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image '{}'", path.display()))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let form = reqwest::multipart::Form::new().part(
            "image",
            reqwest::multipart::Part::bytes(data).file_name(file_name),
        );

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Failed to send request to NSFW classifier")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "NSFW classifier request failed: {} - {}",
                status,
                error_text
            ));
        }

        let body: ClassifierResponse = response
            .json()
            .await
            .context("Failed to parse NSFW classifier response")?;

        let classification = Classification {
            label: NsfwLabel::from_provider_label(&body.label),
            score: body.score.clamp(0.0, 1.0),
        };

        tracing::debug!(
            path = %path.display(),
            label = ?classification.label,
            score = classification.score,
            "Image classified"
        );

        Ok(classification)
    }
}
