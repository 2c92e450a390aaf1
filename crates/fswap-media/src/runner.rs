//! Child-process runner for the face-swap tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::FaceSwapCommand;
use crate::config::ToolConfig;
use crate::error::{MediaError, MediaResult};

/// Captured outcome of one tool run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Exit code; `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best single error text: stderr, else stdout, else the exit status.
    pub fn error_text(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("tool exited with status {}", code),
            None => "tool terminated by signal".to_string(),
        }
    }

    /// Both streams, stderr first.
    pub fn combined_logs(&self) -> String {
        match (self.stderr.trim().is_empty(), self.stdout.trim().is_empty()) {
            (false, false) => format!("{}\n{}", self.stderr.trim_end(), self.stdout.trim_end()),
            (false, true) => self.stderr.trim_end().to_string(),
            (true, false) => self.stdout.trim_end().to_string(),
            (true, true) => String::new(),
        }
    }
}

/// Runs built commands inside the tool's installation root.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    /// Interpreter or executable
    program: String,
    /// Working directory for the child
    working_dir: PathBuf,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl ToolRunner {
    /// Create a new runner.
    pub fn new(program: impl Into<String>, working_dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.as_ref().to_path_buf(),
            timeout_secs: None,
        }
    }

    /// Runner for the configured tool installation.
    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.program.clone(), &config.root).with_timeout(config.timeout.as_secs())
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run a command to completion.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ExecutionResult::exit_code`]. Only spawn failures and the timeout
    /// are errors. Never retries.
    pub async fn run(&self, cmd: &FaceSwapCommand) -> MediaResult<ExecutionResult> {
        let program = which::which(&self.program)
            .map_err(|_| MediaError::ToolNotFound(self.program.clone()))?;

        let args = cmd.build_args();
        info!(
            program = %program.display(),
            cwd = %self.working_dir.display(),
            "Running face-swap tool: {} {}",
            self.program,
            args.join(" ")
        );

        let start = Instant::now();
        let mut child = Command::new(&program)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::tool_failed(format!("failed to spawn {}: {}", self.program, e), None, None)
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("stderr not captured"))?;

        let mut stdout_handle = tokio::spawn(collect_stream(stdout, "stdout"));
        let mut stderr_handle = tokio::spawn(collect_stream(stderr, "stderr"));

        // The deadline covers the stream readers too: a leftover grandchild
        // can hold the pipes open after the tool itself exits.
        let finished = {
            let completion = async {
                let status = child.wait().await?;
                let stdout = (&mut stdout_handle).await.unwrap_or_default();
                let stderr = (&mut stderr_handle).await.unwrap_or_default();
                Ok::<_, std::io::Error>((status, stdout, stderr))
            };
            match self.timeout_secs {
                Some(secs) => {
                    let deadline = tokio::time::Instant::from_std(start) + Duration::from_secs(secs);
                    tokio::time::timeout_at(deadline, completion).await.ok()
                }
                None => Some(completion.await),
            }
        };

        let (status, stdout, stderr) = match finished {
            Some(outcome) => outcome?,
            None => {
                let secs = self.timeout_secs.unwrap_or_default();
                warn!("Face-swap tool timed out after {} seconds, killing process", secs);
                let _ = child.kill().await;
                stdout_handle.abort();
                stderr_handle.abort();
                return Err(MediaError::Timeout(secs));
            }
        };
        let duration = start.elapsed();

        debug!(
            exit_code = ?status.code(),
            duration_ms = duration.as_millis() as u64,
            "Face-swap tool exited"
        );

        Ok(ExecutionResult {
            exit_code: status.code(),
            stdout,
            stderr,
            duration,
        })
    }
}

/// Read a child stream to the end, tracing each line.
async fn collect_stream<R>(stream: R, name: &'static str) -> String
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut collected = String::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                debug!(stream = name, "{}", text.trim_end());
                collected.push_str(&text);
            }
            Err(e) => {
                warn!(stream = name, "Failed to read tool output: {}", e);
                break;
            }
        }
    }

    collected
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_script(dir: &Path, body: &str) -> String {
        let path = dir.join("tool.sh");
        tokio::fs::write(&path, body).await.unwrap();
        path.to_string_lossy().to_string()
    }

    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            dir.path(),
            "echo progress\necho 'face not found' >&2\nexit 3\n",
        )
        .await;

        let cmd = FaceSwapCommand::new(script, "s", "t", "o");
        let result = ToolRunner::new("sh", dir.path())
            .with_timeout(10)
            .run(&cmd)
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success());
        assert_eq!(result.stdout.trim(), "progress");
        assert_eq!(result.error_text(), "face not found");
        assert_eq!(result.combined_logs(), "face not found\nprogress");
    }

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "pwd\n").await;

        let cmd = FaceSwapCommand::new(script, "s", "t", "o");
        let result = ToolRunner::new("sh", dir.path()).run(&cmd).await.unwrap();

        assert!(result.success());
        let reported = std::fs::canonicalize(result.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "sleep 5\n").await;

        let cmd = FaceSwapCommand::new(script, "s", "t", "o");
        let err = ToolRunner::new("sh", dir.path())
            .with_timeout(1)
            .run(&cmd)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_timeout_covers_inherited_pipes() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "sleep 6 &\nexit 0\n").await;

        let cmd = FaceSwapCommand::new(script, "s", "t", "o");
        let start = Instant::now();
        let err = ToolRunner::new("sh", dir.path())
            .with_timeout(1)
            .run(&cmd)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let cmd = FaceSwapCommand::new("facefusion.py", "s", "t", "o");
        let err = ToolRunner::new("definitely-not-a-real-tool-7f3a", dir.path())
            .run(&cmd)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }

    #[test]
    fn test_error_text_fallbacks() {
        let only_stdout = ExecutionResult {
            exit_code: Some(1),
            stdout: "bad target\n".to_string(),
            ..Default::default()
        };
        assert_eq!(only_stdout.error_text(), "bad target");

        let silent = ExecutionResult {
            exit_code: Some(2),
            ..Default::default()
        };
        assert_eq!(silent.error_text(), "tool exited with status 2");
    }
}
