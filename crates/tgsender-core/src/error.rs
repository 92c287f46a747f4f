//! Error types module
//!
//! Every failure inside the pipeline is expressed as a `SenderError`. None of
//! them is fatal to the host: the dispatcher and delivery client log the error
//! at the level reported by [`SenderError::log_level`] and move on.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected conditions like a disabled sender
    Debug,
    /// Warning level - for recoverable issues like a failed upload attempt
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Telegram API error ({status}): {description}")]
    Api { status: u16, description: String },

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),
}

pub type SenderResult<T> = Result<T, SenderError>;

impl From<serde_json::Error> for SenderError {
    fn from(err: serde_json::Error) -> Self {
        SenderError::Http(format!("JSON parsing error: {}", err))
    }
}

impl SenderError {
    /// Machine-readable error code (e.g., "API_ERROR")
    pub fn error_code(&self) -> &'static str {
        match self {
            SenderError::Config(_) => "CONFIG_ERROR",
            SenderError::ImageProcessing(_) => "IMAGE_PROCESSING_ERROR",
            SenderError::Io(_) => "IO_ERROR",
            SenderError::Http(_) => "HTTP_ERROR",
            SenderError::Api { .. } => "API_ERROR",
            SenderError::Classifier(_) => "CLASSIFIER_ERROR",
            SenderError::InvalidArtifact(_) => "INVALID_ARTIFACT",
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Rate limiting (429) and server-side API failures are transient; other
    /// 4xx answers (bad chat id, oversized photo) are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SenderError::Http(_) | SenderError::Io(_) => true,
            SenderError::Api { status, .. } => *status == 429 || *status >= 500,
            SenderError::Classifier(_) => true,
            SenderError::Config(_)
            | SenderError::ImageProcessing(_)
            | SenderError::InvalidArtifact(_) => false,
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            SenderError::Config(_) => LogLevel::Debug,
            SenderError::ImageProcessing(_)
            | SenderError::Http(_)
            | SenderError::Api { .. }
            | SenderError::Classifier(_) => LogLevel::Warn,
            SenderError::Io(_) | SenderError::InvalidArtifact(_) => LogLevel::Error,
        }
    }
}
