use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SenderError, SenderResult};

/// How a file is handed to Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// `sendPhoto`: recompressed by Telegram, subject to size limits
    Photo,
    /// `sendDocument`: byte-for-byte original
    Document,
}

impl DeliveryMode {
    /// Bot API method name
    pub fn method(self) -> &'static str {
        match self {
            DeliveryMode::Photo => "sendPhoto",
            DeliveryMode::Document => "sendDocument",
        }
    }

    /// Multipart field carrying the file
    pub fn field_name(self) -> &'static str {
        match self {
            DeliveryMode::Photo => "photo",
            DeliveryMode::Document => "document",
        }
    }
}

/// A file prepared for one delivery.
///
/// Temporary artifacts are deleted by the delivery client after a confirmed
/// upload. A temporary artifact can never point at the original image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferArtifact {
    path: PathBuf,
    is_temporary: bool,
}

impl TransferArtifact {
    /// The user's own file. Never deleted by the pipeline.
    pub fn original(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_temporary: false,
        }
    }

    /// A file produced by the transformer from `original`.
    pub fn temporary(path: impl Into<PathBuf>, original: &Path) -> SenderResult<Self> {
        let path = path.into();
        if same_file(&path, original) {
            return Err(SenderError::InvalidArtifact(format!(
                "temporary artifact '{}' is the original image",
                path.display()
            )));
        }
        Ok(Self {
            path,
            is_temporary: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Result of one delivery task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub attempts_made: u32,
    pub last_error: Option<String>,
}

impl DeliveryOutcome {
    /// Sending is switched off; nothing was attempted.
    pub fn disabled() -> Self {
        Self {
            success: false,
            attempts_made: 0,
            last_error: None,
        }
    }

    pub fn delivered(attempts_made: u32) -> Self {
        Self {
            success: true,
            attempts_made,
            last_error: None,
        }
    }

    pub fn failed(attempts_made: u32, last_error: impl Into<String>) -> Self {
        Self {
            success: false,
            attempts_made,
            last_error: Some(last_error.into()),
        }
    }

    pub fn was_attempted(&self) -> bool {
        self.attempts_made > 0
    }
}
