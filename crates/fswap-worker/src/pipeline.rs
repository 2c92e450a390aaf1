//! Job pipeline.
//!
//! One job runs strictly in order: resolve, materialize, build the command,
//! run the tool, classify and deliver the result, clean up. Every outcome,
//! including validation failures, comes back as a [`JobResult`].

use std::time::Instant;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn, Instrument};

use fswap_media::fs_utils::{ensure_parent, remove_if_exists};
use fswap_media::{FaceSwapCommand, ToolConfig, ToolRunner};
use fswap_models::{Job, JobResult, ResolvedAssets};

use crate::cleanup::Cleanup;
use crate::config::WorkerConfig;
use crate::dispatcher::ResultDispatcher;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::materializer::AssetMaterializer;
use crate::metrics;
use crate::resolver::{callback_url, correlation_ids, resolve_job};

const OPERATION: &str = "face_swap";

/// Runs face-swap jobs end to end.
#[derive(Clone)]
pub struct JobPipeline {
    config: WorkerConfig,
    materializer: AssetMaterializer,
    dispatcher: ResultDispatcher,
    runner: ToolRunner,
}

impl JobPipeline {
    /// Create a pipeline with a shared HTTP client for downloads and callbacks.
    pub fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("fswap-worker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WorkerError::config_error(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            materializer: AssetMaterializer::new(client.clone(), config.clone()),
            dispatcher: ResultDispatcher::new(client, config.callback_timeout),
            runner: ToolRunner::from_config(&config.tool),
            config,
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Handle one job record. Never fails: errors become failure records.
    pub async fn handle(&self, record: &Value) -> JobResult {
        let job = match resolve_job(record, &self.config) {
            Ok(job) => job,
            Err(e) => {
                let (request_id, user_id) = correlation_ids(record);
                let logger = JobLogger::from_string(request_id.as_deref().unwrap_or("-"), OPERATION);
                logger.log_error(&format!("rejected: {}", e));
                metrics::record_job(false, e.kind());
                let result = e.to_result().with_ids(request_id, user_id);
                return self
                    .dispatcher
                    .deliver(callback_url(record).as_deref(), result)
                    .await;
            }
        };

        let logger = JobLogger::new(&job, OPERATION);
        let span = logger.create_span();
        self.process(job, logger).instrument(span).await
    }

    async fn process(&self, job: Job, logger: JobLogger) -> JobResult {
        logger.log_start(&format!(
            "face={} target={} dir={}",
            job.face.kind(),
            job.target.kind(),
            job.job_dir.display()
        ));
        let start = Instant::now();

        let mut cleanup = Cleanup::new(&self.config.work_dir);
        cleanup.track_dir(&job.job_dir);

        let result = match self.render(&job, &mut cleanup, &logger).await {
            Ok(result) => {
                metrics::record_job(true, "none");
                logger.log_completion(&format!(
                    "{:.2} MB in {:.1}s",
                    result.file_size_mb.unwrap_or_default(),
                    start.elapsed().as_secs_f64()
                ));
                result
            }
            Err(e) => {
                metrics::record_job(false, e.kind());
                logger.log_error(&format!("{} ({})", e, e.kind()));
                e.to_result()
            }
        }
        .with_ids(job.request_id.clone(), job.user_id.clone());

        let delivered = self
            .dispatcher
            .deliver(job.callback_url.as_deref(), result)
            .await;

        let removed = cleanup.finish().await;
        debug!(removed, "Job files cleaned up");

        delivered
    }

    async fn render(
        &self,
        job: &Job,
        cleanup: &mut Cleanup,
        logger: &JobLogger,
    ) -> WorkerResult<JobResult> {
        tokio::fs::create_dir_all(&job.job_dir).await?;

        let assets = self.materializer.materialize(job, cleanup).await?;
        logger.log_progress(&format!(
            "assets ready: face={} target={}",
            assets.face.path.display(),
            assets.target.path.display()
        ));

        cleanup.track_file(&job.output_path);
        if remove_if_exists(&job.output_path).await? {
            logger.log_warning(&format!("removed stale output {}", job.output_path.display()));
        }
        ensure_parent(&job.output_path).await?;

        let cmd = build_command(&self.config.tool, job, &assets);
        let execution = match self.runner.run(&cmd).await {
            Ok(execution) => execution,
            Err(e) => {
                if e.is_timeout() {
                    warn!("Render killed after timeout");
                }
                return Err(e.into());
            }
        };
        metrics::record_tool_duration(execution.duration.as_secs_f64(), execution.exit_code);
        logger.log_progress(&format!(
            "tool exited with {:?} after {:.1}s",
            execution.exit_code,
            execution.duration.as_secs_f64()
        ));

        self.dispatcher
            .collect_output(&execution, &job.output_path)
            .await
    }
}

/// Tool command for a job: the configured template, or the caller's
/// override list with placeholders substituted.
pub fn build_command(tool: &ToolConfig, job: &Job, assets: &ResolvedAssets) -> FaceSwapCommand {
    let cmd = FaceSwapCommand::from_config(
        tool,
        assets.face.path(),
        assets.target.path(),
        &job.output_path,
    );
    match &job.override_args {
        Some(args) => cmd.with_override(args.clone()),
        None => cmd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fswap_media::OFFLINE_FLAG;
    use fswap_models::{Asset, FaceSource, JobId, TargetSource};
    use std::path::PathBuf;

    fn job(override_args: Option<Vec<String>>) -> Job {
        Job {
            id: JobId("job-1".to_string()),
            request_id: None,
            user_id: None,
            callback_url: None,
            face: FaceSource::Inline("AAAA".to_string()),
            target: TargetSource::Existing(PathBuf::from("/workspace/video/1.mp4")),
            job_dir: PathBuf::from("/tmp/fswap/job-1"),
            output_path: PathBuf::from("/tmp/fswap/job-1/output.mp4"),
            override_args,
        }
    }

    fn assets() -> ResolvedAssets {
        ResolvedAssets {
            face: Asset::transient("/tmp/fswap/job-1/source.jpg"),
            target: Asset::retained("/workspace/video/1.mp4"),
        }
    }

    #[test]
    fn test_default_command() {
        let args = build_command(&ToolConfig::default(), &job(None), &assets()).build_args();

        assert_eq!(args[0], "facefusion.py");
        assert_eq!(args[1], "headless-run");
        let output = args.iter().position(|a| a == "--output-path").unwrap();
        assert_eq!(args[output + 1], "/tmp/fswap/job-1/output.mp4");
        assert_eq!(args.iter().filter(|a| *a == OFFLINE_FLAG).count(), 1);
    }

    #[test]
    fn test_override_command() {
        let custom = vec![
            "headless-run".to_string(),
            "-s".to_string(),
            "{source}".to_string(),
            "-o".to_string(),
            "{output}".to_string(),
            OFFLINE_FLAG.to_string(),
        ];
        let args = build_command(&ToolConfig::default(), &job(Some(custom)), &assets()).build_args();

        assert_eq!(
            args,
            vec![
                "facefusion.py",
                "headless-run",
                "-s",
                "/tmp/fswap/job-1/source.jpg",
                "-o",
                "/tmp/fswap/job-1/output.mp4",
                OFFLINE_FLAG,
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_record_returns_failure() {
        let pipeline = JobPipeline::new(WorkerConfig::default()).unwrap();
        let result = pipeline
            .handle(&serde_json::json!({ "input": { "requestId": "req-3" } }))
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("missing face source"));
        assert_eq!(result.request_id.as_deref(), Some("req-3"));
    }
}
