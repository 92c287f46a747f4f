use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::time::Duration;

use tgsender_core::{
    DeliveryMode, DeliveryOutcome, LogLevel, SenderConfig, SenderError, SenderResult,
    TransferArtifact,
};

/// Configuration for the delivery client
#[derive(Clone)]
pub struct TelegramClientConfig {
    pub api_base: String,
    pub bot_token: String,
    /// Upper bound on upload attempts, at least 1
    pub retry_count: u32,
    /// Fixed pause between attempts
    pub retry_delay: Duration,
    /// Kill switch plus credential check, resolved once
    pub enabled: bool,
}

impl TelegramClientConfig {
    pub fn from_sender_config(config: &SenderConfig) -> Self {
        Self {
            api_base: config.api_base.clone(),
            bot_token: config.bot_token.clone(),
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
            enabled: config.sending_enabled(),
        }
    }
}

impl Debug for TelegramClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TelegramClientConfig")
            .field("api_base", &self.api_base)
            .field("bot_token", &"<redacted>")
            .field("retry_count", &self.retry_count)
            .field("retry_delay", &self.retry_delay)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Bot API reply envelope
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Uploads artifacts with `sendPhoto` / `sendDocument`
#[derive(Clone, Debug)]
pub struct TelegramClient {
    http_client: Client,
    config: TelegramClientConfig,
}

impl TelegramClient {
    pub fn new(config: TelegramClientConfig) -> SenderResult<Self> {
        let http_client = Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(http_error)?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn from_sender_config(config: &SenderConfig) -> SenderResult<Self> {
        Self::new(TelegramClientConfig::from_sender_config(config))
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn max_attempts(&self) -> u32 {
        self.config.retry_count.max(1)
    }

    fn endpoint(&self, mode: DeliveryMode) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base,
            self.config.bot_token,
            mode.method()
        )
    }

    /// Upload `artifact` to `chat_id`.
    ///
    /// Attempts are sequential with a fixed delay in between. A temporary
    /// artifact is removed after a confirmed upload; after exhausted retries
    /// it stays on disk. Never returns an error: the outcome carries it.
    #[tracing::instrument(
        skip(self, artifact),
        fields(path = %artifact.path().display(), method = mode.method())
    )]
    pub async fn deliver(
        &self,
        artifact: &TransferArtifact,
        chat_id: &str,
        mode: DeliveryMode,
    ) -> DeliveryOutcome {
        if !self.config.enabled {
            tracing::debug!("Sending disabled or bot token not configured, skipping delivery");
            return DeliveryOutcome::disabled();
        }

        let max_attempts = self.max_attempts();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.send_once(artifact, chat_id, mode).await {
                Ok(()) => {
                    tracing::info!(attempt = attempt, "Image delivered");
                    if artifact.is_temporary() {
                        remove_artifact(artifact.path()).await;
                    }
                    return DeliveryOutcome::delivered(attempt);
                }
                Err(e) => {
                    match e.log_level() {
                        LogLevel::Error => tracing::error!(
                            attempt = attempt,
                            max_attempts = max_attempts,
                            error = %e,
                            "Delivery attempt failed"
                        ),
                        _ => tracing::warn!(
                            attempt = attempt,
                            max_attempts = max_attempts,
                            recoverable = e.is_recoverable(),
                            error = %e,
                            "Delivery attempt failed"
                        ),
                    }
                    last_error = e.to_string();
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        tracing::error!(
            attempts = max_attempts,
            error = %last_error,
            "Delivery failed, artifact left in place"
        );
        DeliveryOutcome::failed(max_attempts, last_error)
    }

    /// One multipart upload.
    async fn send_once(
        &self,
        artifact: &TransferArtifact,
        chat_id: &str,
        mode: DeliveryMode,
    ) -> SenderResult<()> {
        let data = tokio::fs::read(artifact.path()).await?;

        let part = Part::bytes(data)
            .file_name(artifact.file_name())
            .mime_str(mime_for(artifact.path()))
            .map_err(http_error)?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part(mode.field_name(), part);

        let response = self
            .http_client
            .post(self.endpoint(mode))
            .multipart(form)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        let body = response.text().await.map_err(http_error)?;
        let parsed = serde_json::from_str::<ApiResponse>(&body).ok();

        let ok = match &parsed {
            Some(reply) => status.is_success() && reply.ok,
            None => status.is_success(),
        };
        if ok {
            return Ok(());
        }

        let description = parsed
            .and_then(|reply| reply.description)
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.trim().to_string()
                }
            });

        Err(SenderError::Api {
            status: status.as_u16(),
            description,
        })
    }
}

/// Strips the request URL, which embeds the bot token.
fn http_error(err: reqwest::Error) -> SenderError {
    SenderError::Http(err.without_url().to_string())
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed temporary artifact"),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Failed to remove temporary artifact"
        ),
    }
}
