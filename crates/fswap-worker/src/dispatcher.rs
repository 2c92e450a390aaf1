//! Result classification and delivery.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use fswap_media::encode_file;
use fswap_media::fs_utils::is_nonempty_file;
use fswap_media::ExecutionResult;
use fswap_models::{CallbackStatus, JobResult};

use crate::error::{tail, WorkerError, WorkerResult, MAX_DETAIL_BYTES, OUTPUT_NOT_PRODUCED};
use crate::metrics;

pub const SENT_VIA_CALLBACK: &str = "sent via callback";

/// Turns a finished tool run into a [`JobResult`] and delivers it.
#[derive(Clone)]
pub struct ResultDispatcher {
    client: Client,
    callback_timeout: Duration,
}

impl ResultDispatcher {
    pub fn new(client: Client, callback_timeout: Duration) -> Self {
        Self {
            client,
            callback_timeout,
        }
    }

    /// Classify a tool run.
    ///
    /// A non-zero exit and a clean exit without output are distinct
    /// failures; only a present, non-empty output file is a success.
    pub async fn collect_output(
        &self,
        execution: &ExecutionResult,
        output_path: &Path,
    ) -> WorkerResult<JobResult> {
        if !execution.success() {
            return Err(WorkerError::tool(
                tail(&execution.error_text(), MAX_DETAIL_BYTES),
                Some(execution.combined_logs()),
                execution.exit_code,
            ));
        }

        if !is_nonempty_file(output_path).await {
            return Err(WorkerError::tool(
                OUTPUT_NOT_PRODUCED,
                Some(execution.combined_logs()),
                execution.exit_code,
            ));
        }

        let (video_base64, size_bytes) = encode_file(output_path).await?;
        info!(
            size_bytes,
            "Render produced {}",
            output_path.display()
        );
        Ok(JobResult::success(video_base64, size_bytes))
    }

    /// Deliver `result`, returning the record for the synchronous caller.
    ///
    /// With a callback URL the full record is POSTed. A failed delivery is
    /// logged and counted but never turns a success into a failure; the
    /// video then stays inline so the render is not lost.
    pub async fn deliver(&self, callback_url: Option<&str>, result: JobResult) -> JobResult {
        let Some(url) = callback_url else {
            return result;
        };

        match self.post_callback(url, &result).await {
            Ok(()) => {
                info!(callback = %url, success = result.success, "Result sent via callback");
                if result.success {
                    result
                        .without_video()
                        .with_message(SENT_VIA_CALLBACK)
                        .with_callback(CallbackStatus::Sent)
                } else {
                    result.with_callback(CallbackStatus::Sent)
                }
            }
            Err(e) => {
                warn!(callback = %url, "{}", e);
                metrics::record_callback_failure();
                result.with_callback(CallbackStatus::Failed)
            }
        }
    }

    /// POST a result record as JSON. Non-2xx responses are errors.
    pub async fn post_callback(&self, url: &str, result: &JobResult) -> WorkerResult<()> {
        let response = self
            .client
            .post(url)
            .timeout(self.callback_timeout)
            .json(result)
            .send()
            .await
            .map_err(|e| WorkerError::callback_delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WorkerError::callback_delivery(format!(
                "{} returned {}",
                url, status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher() -> ResultDispatcher {
        ResultDispatcher::new(Client::new(), Duration::from_secs(5))
    }

    fn execution(exit_code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            exit_code: Some(exit_code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_tool_failure() {
        let dir = TempDir::new().unwrap();
        let err = dispatcher()
            .collect_output(&execution(1, "", "CUDA out of memory\n"), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();

        let result = err.to_result();
        assert_eq!(result.error.as_deref(), Some("CUDA out of memory"));
        assert_eq!(result.message.as_deref(), Some("render failed (exit code 1)"));
    }

    #[tokio::test]
    async fn test_long_stderr_is_cut_in_error_and_details() {
        let dir = TempDir::new().unwrap();
        let mut stderr = "frame=1 progress\n".repeat(4096);
        stderr.push_str("CUDA out of memory");
        let err = dispatcher()
            .collect_output(&execution(1, "", &stderr), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();

        let result = err.to_result();
        let error = result.error.unwrap();
        assert!(error.len() <= MAX_DETAIL_BYTES);
        assert!(error.ends_with("CUDA out of memory"));
        assert!(result.details.unwrap().len() <= MAX_DETAIL_BYTES);
    }

    #[tokio::test]
    async fn test_clean_exit_without_output() {
        let dir = TempDir::new().unwrap();
        let err = dispatcher()
            .collect_output(&execution(0, "processing done", ""), &dir.path().join("out.mp4"))
            .await
            .unwrap_err();

        assert!(err.is_missing_output());
        let result = err.to_result();
        assert_eq!(result.error.as_deref(), Some(OUTPUT_NOT_PRODUCED));
        assert_eq!(result.details.as_deref(), Some("processing done"));
    }

    #[tokio::test]
    async fn test_output_is_encoded() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out.mp4");
        std::fs::write(&output, b"video").unwrap();

        let result = dispatcher()
            .collect_output(&execution(0, "", ""), &output)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.video_base64.as_deref(), Some("dmlkZW8="));
        assert_eq!(result.file_size_mb, Some(0.0));
    }

    #[tokio::test]
    async fn test_no_callback_returns_inline() {
        let result = JobResult::success("AAAA".to_string(), 3);
        let delivered = dispatcher().deliver(None, result.clone()).await;
        assert_eq!(delivered, result);
    }

    #[tokio::test]
    async fn test_callback_success_strips_video() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "success": true,
                "videoBase64": "AAAA",
                "requestId": "req-1"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let result = JobResult::success("AAAA".to_string(), 3).with_ids(Some("req-1".to_string()), None);
        let url = format!("{}/hook", server.uri());
        let delivered = dispatcher().deliver(Some(&url), result).await;

        assert!(delivered.success);
        assert!(delivered.video_base64.is_none());
        assert_eq!(delivered.message.as_deref(), Some(SENT_VIA_CALLBACK));
        assert_eq!(delivered.callback, Some(CallbackStatus::Sent));
        assert_eq!(delivered.request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn test_callback_failure_keeps_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = JobResult::success("AAAA".to_string(), 3);
        let url = format!("{}/hook", server.uri());
        let delivered = dispatcher().deliver(Some(&url), result).await;

        assert!(delivered.success);
        assert_eq!(delivered.video_base64.as_deref(), Some("AAAA"));
        assert_eq!(delivered.callback, Some(CallbackStatus::Failed));
    }

    #[tokio::test]
    async fn test_failure_result_is_posted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "success": false,
                "error": "output not produced"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/hook", server.uri());
        let delivered = dispatcher()
            .deliver(Some(&url), JobResult::failure(OUTPUT_NOT_PRODUCED))
            .await;

        assert!(!delivered.success);
        assert_eq!(delivered.callback, Some(CallbackStatus::Sent));
    }
}
