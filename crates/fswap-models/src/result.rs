//! Job result record.
//!
//! The same shape is returned to the invoking runtime and posted to callback
//! endpoints.

use serde::{Deserialize, Serialize};

/// Outcome of a callback delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Sent,
    Failed,
}

/// Result record for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub success: bool,

    /// Rendered video, base64 encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_base64: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Captured tool logs on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(
        rename = "file_size_mb",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub file_size_mb: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackStatus>,
}

impl JobResult {
    /// Successful render with the encoded video inline.
    pub fn success(video_base64: String, size_bytes: u64) -> Self {
        Self {
            success: true,
            video_base64: Some(video_base64),
            file_size_mb: Some(size_mb(size_bytes)),
            ..Default::default()
        }
    }

    /// Failed job.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Attach correlation ids.
    pub fn with_ids(mut self, request_id: Option<String>, user_id: Option<String>) -> Self {
        self.request_id = request_id;
        self.user_id = user_id;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        if !details.trim().is_empty() {
            self.details = Some(details);
        }
        self
    }

    pub fn with_callback(mut self, status: CallbackStatus) -> Self {
        self.callback = Some(status);
        self
    }

    /// Copy of this result without the video payload, for callers whose
    /// video already went out through the callback.
    pub fn without_video(&self) -> Self {
        Self {
            video_base64: None,
            ..self.clone()
        }
    }
}

/// Bytes to megabytes, rounded to two decimals.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0
}
