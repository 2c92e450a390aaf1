//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use fswap_media::ToolConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Sandbox root for transient job files
    pub work_dir: PathBuf,
    /// Shared template cache, survives across jobs
    pub shared_dir: PathBuf,
    /// Roots under which pre-existing target videos may be referenced
    pub template_roots: Vec<PathBuf>,
    /// Host serving `/templates/<id>.mp4` for id-only targets
    pub template_host: Option<String>,
    /// Timeout for one asset download
    pub download_timeout: Duration,
    /// Timeout for one callback POST
    pub callback_timeout: Duration,
    /// Maximum jobs run at once by long-lived hosts
    pub max_concurrent_jobs: usize,
    /// External tool installation
    pub tool: ToolConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let shared_dir = PathBuf::from("/workspace/bridge_data/templates");
        Self {
            work_dir: PathBuf::from("/tmp/fswap"),
            template_roots: vec![shared_dir.clone(), PathBuf::from("/workspace/video")],
            shared_dir,
            template_host: None,
            download_timeout: Duration::from_secs(60),
            callback_timeout: Duration::from_secs(60),
            max_concurrent_jobs: 1,
            tool: ToolConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let shared_dir = std::env::var("WORKER_SHARED_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/workspace/bridge_data/templates"));

        let template_roots = std::env::var("WORKER_TEMPLATE_ROOTS")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_else(|_| vec![shared_dir.clone(), PathBuf::from("/workspace/video")]);

        Self {
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/fswap")),
            shared_dir,
            template_roots,
            template_host: std::env::var("WORKER_TEMPLATE_HOST")
                .ok()
                .map(|s| s.trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            download_timeout: Duration::from_secs(
                std::env::var("WORKER_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            callback_timeout: Duration::from_secs(
                std::env::var("WORKER_CALLBACK_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(1),
            tool: ToolConfig::from_env(),
        }
    }
}
