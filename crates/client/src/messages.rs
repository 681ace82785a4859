//! Wire types for the remote generation and translation endpoints.
//!
//! Job status uses the remote vocabulary `pending | processing |
//! succeeded | failed`; [`RemoteStatus::task_status`] maps it onto the
//! internal [`TaskStatus`].

use imagegen_core::status::TaskStatus;
use serde::{Deserialize, Serialize};

/// Remote job status vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    /// Any value the service may add later.
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    /// Internal status for this observation, `None` for [`RemoteStatus::Unknown`].
    pub fn task_status(self) -> Option<TaskStatus> {
        match self {
            RemoteStatus::Pending => Some(TaskStatus::Pending),
            RemoteStatus::Processing => Some(TaskStatus::Processing),
            RemoteStatus::Succeeded => Some(TaskStatus::Completed),
            RemoteStatus::Failed => Some(TaskStatus::Failed),
            RemoteStatus::Unknown => None,
        }
    }
}

/// Response of the job submission endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned job identifier.
    pub task_id: String,
    /// Initial status reported by the service.
    pub status: RemoteStatus,
}

/// Response of the job status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResponse {
    /// Echo of the requested job id; some responses omit it.
    #[serde(default)]
    pub task_id: String,
    pub status: RemoteStatus,
    /// Generation output. Usually the image URL, sometimes a list of URLs
    /// or an object carrying a `url` field.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    /// The full response body, kept for diagnostics.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl FetchResponse {
    /// Parse a status payload, keeping the raw JSON alongside.
    pub fn from_value(raw: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut parsed: FetchResponse = serde_json::from_value(raw.clone())?;
        parsed.raw = raw;
        Ok(parsed)
    }

    /// URL of the produced image, if the output carries one.
    pub fn image_url(&self) -> Option<&str> {
        fn url_of(value: &serde_json::Value) -> Option<&str> {
            match value {
                serde_json::Value::String(s) => Some(s.as_str()),
                serde_json::Value::Array(items) => items.iter().find_map(url_of),
                serde_json::Value::Object(map) => map.get("url").and_then(url_of),
                _ => None,
            }
        }
        self.output
            .as_ref()
            .and_then(url_of)
            .filter(|url| !url.trim().is_empty())
    }
}

/// Request body of the translation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TranslateRequest<'a> {
    /// Translation model, `deepl-<target language>`.
    pub model: String,
    pub message: &'a str,
}

impl<'a> TranslateRequest<'a> {
    pub fn new(message: &'a str, target_language: &str) -> Self {
        Self {
            model: format!("deepl-{}", target_language.to_ascii_lowercase()),
            message,
        }
    }
}

/// Response of the translation endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateResponse {
    /// Translated text.
    pub output: String,
}
