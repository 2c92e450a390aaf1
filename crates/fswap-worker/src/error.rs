//! Worker error types.

use fswap_media::MediaError;
use fswap_models::JobResult;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Tool logs attached to results are cut to this many trailing bytes.
pub const MAX_DETAIL_BYTES: usize = 8 * 1024;

/// Message for a zero exit that left no output file.
pub const OUTPUT_NOT_PRODUCED: &str = "output not produced";

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Bad or missing input fields, raised before any I/O
    #[error("{0}")]
    Validation(String),

    /// Download or decode failure
    #[error("{0}")]
    Asset(String),

    /// Non-zero exit, or a zero exit without output
    #[error("{message}")]
    Tool {
        message: String,
        logs: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("tool timed out after {0} seconds")]
    Timeout(u64),

    /// Never fails a job; logged and counted only
    #[error("callback delivery failed: {0}")]
    CallbackDelivery(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        Self::Asset(msg.into())
    }

    pub fn tool(msg: impl Into<String>, logs: Option<String>, exit_code: Option<i32>) -> Self {
        Self::Tool {
            message: msg.into(),
            logs,
            exit_code,
        }
    }

    pub fn callback_delivery(msg: impl Into<String>) -> Self {
        Self::CallbackDelivery(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::Validation(_) => "validation",
            WorkerError::Asset(_) => "asset",
            WorkerError::Tool { .. } => "tool",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::CallbackDelivery(_) => "callback",
            WorkerError::ConfigError(_) => "config",
            WorkerError::Io(_) => "io",
        }
    }

    /// Check if the tool ran and exited cleanly without writing output.
    pub fn is_missing_output(&self) -> bool {
        matches!(self, WorkerError::Tool { message, .. } if message == OUTPUT_NOT_PRODUCED)
    }

    /// Failure record for this error, without correlation ids.
    pub fn to_result(&self) -> JobResult {
        let result = JobResult::failure(self.to_string());
        match self {
            WorkerError::Tool {
                logs, exit_code, ..
            } => {
                let message = if self.is_missing_output() {
                    "tool exited successfully but wrote no output".to_string()
                } else {
                    match exit_code {
                        Some(code) => format!("render failed (exit code {})", code),
                        None => "render failed".to_string(),
                    }
                };
                let result = result.with_message(message);
                match logs {
                    Some(logs) => result.with_details(tail(logs, MAX_DETAIL_BYTES)),
                    None => result,
                }
            }
            WorkerError::Timeout(_) => result.with_message("render timed out"),
            WorkerError::Validation(_) => result.with_message("invalid job input"),
            WorkerError::Asset(_) => result.with_message("asset preparation failed"),
            _ => result,
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Timeout(secs) => WorkerError::Timeout(secs),
            MediaError::ToolFailed {
                message,
                stderr,
                exit_code,
            } => WorkerError::Tool {
                message,
                logs: stderr,
                exit_code,
            },
            MediaError::ToolNotFound(_) | MediaError::Internal(_) => {
                WorkerError::tool(err.to_string(), None, None)
            }
            MediaError::Io(e) => WorkerError::Io(e),
            MediaError::DecodeFailed
            | MediaError::DownloadFailed { .. }
            | MediaError::FileNotFound(_) => WorkerError::Asset(err.to_string()),
        }
    }
}

/// Last `max` bytes of `text`, cut on a char boundary.
pub fn tail(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
