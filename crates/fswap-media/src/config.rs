//! FaceFusion tool configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default hard timeout for one tool run.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;

/// How the external face-swap tool is installed and tuned.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Installation root, used as working directory
    pub root: PathBuf,
    /// Interpreter or executable to launch
    pub program: String,
    /// Entry script, relative to the root
    pub script: String,
    /// Pre-provisioned model artifacts
    pub models_dir: PathBuf,
    /// Processing stages
    pub processors: Vec<String>,
    /// Execution providers (cuda, cpu, ...)
    pub execution_providers: Vec<String>,
    pub thread_count: u32,
    pub queue_count: u32,
    pub video_memory_strategy: String,
    pub face_detector_model: String,
    /// Encoder preset (ultrafast, ...)
    pub output_video_preset: Option<String>,
    /// Encoder quality 0-100
    pub output_video_quality: Option<u8>,
    /// Hard timeout for one run
    pub timeout: Duration,
}

impl Default for ToolConfig {
    fn default() -> Self {
        let root = PathBuf::from("/workspace/facefusion");
        Self {
            models_dir: root.join(".assets").join("models"),
            root,
            program: "python3".to_string(),
            script: "facefusion.py".to_string(),
            processors: vec!["face_swapper".to_string()],
            execution_providers: vec!["cuda".to_string()],
            thread_count: 4,
            queue_count: 2,
            video_memory_strategy: "moderate".to_string(),
            face_detector_model: "yoloface".to_string(),
            output_video_preset: None,
            output_video_quality: None,
            timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }
}

impl ToolConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let root = std::env::var("FACEFUSION_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.root);

        Self {
            models_dir: std::env::var("FACEFUSION_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| root.join(".assets").join("models")),
            root,
            program: std::env::var("FACEFUSION_PYTHON").unwrap_or(defaults.program),
            script: std::env::var("FACEFUSION_SCRIPT").unwrap_or(defaults.script),
            processors: std::env::var("FACEFUSION_PROCESSORS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.processors),
            execution_providers: std::env::var("FACEFUSION_PROVIDERS")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.execution_providers),
            thread_count: std::env::var("FACEFUSION_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.thread_count),
            queue_count: std::env::var("FACEFUSION_QUEUE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.queue_count),
            video_memory_strategy: std::env::var("FACEFUSION_MEMORY_STRATEGY")
                .unwrap_or(defaults.video_memory_strategy),
            face_detector_model: std::env::var("FACEFUSION_DETECTOR")
                .unwrap_or(defaults.face_detector_model),
            output_video_preset: std::env::var("FACEFUSION_PRESET").ok(),
            output_video_quality: std::env::var("FACEFUSION_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(|q: u8| q.min(100)),
            timeout: Duration::from_secs(
                std::env::var("FACEFUSION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS),
            ),
        }
    }

    /// Absolute path of the entry script.
    pub fn script_path(&self) -> PathBuf {
        self.root.join(&self.script)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
