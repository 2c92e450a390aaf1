//! Application state.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use fswap_models::JobResult;
use fswap_worker::{JobPipeline, WorkerConfig};

use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::metrics;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<JobPipeline>,
    /// One permit per job allowed to run at once
    pub job_permits: Arc<Semaphore>,
    /// Background jobs accepted by `/process/async`
    pub background_jobs: TaskTracker,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig, worker: WorkerConfig) -> ApiResult<Self> {
        let job_permits = Arc::new(Semaphore::new(worker.max_concurrent_jobs.max(1)));
        let pipeline = JobPipeline::new(worker)?;

        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            job_permits,
            background_jobs: TaskTracker::new(),
        })
    }

    /// Stop accepting background jobs and wait for the running ones to
    /// deliver their results.
    pub async fn drain_background_jobs(&self) {
        self.background_jobs.close();
        if !self.background_jobs.is_empty() {
            info!(pending = self.background_jobs.len(), "Waiting for background jobs");
        }
        self.background_jobs.wait().await;
    }

    /// Run one job record once a permit is free.
    pub async fn run_job(&self, record: Value) -> JobResult {
        metrics::job_queued();
        let permit = self.job_permits.clone().acquire_owned().await;
        metrics::job_dequeued();

        let _permit = match permit {
            Ok(permit) => permit,
            Err(_) => {
                let (request_id, user_id) = fswap_worker::correlation_ids(&record);
                return JobResult::failure("job slots closed").with_ids(request_id, user_id);
            }
        };

        metrics::job_started();
        let _running = scopeguard::guard((), |_| metrics::job_finished());
        debug!(available = self.job_permits.available_permits(), "Job permit acquired");

        self.pipeline.handle(&record).await
    }
}
