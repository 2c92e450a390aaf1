//! Job definitions.

use std::fmt;
use std::path::PathBuf;

use url::Url;
use uuid::Uuid;

/// Internal identifier for a job.
///
/// Used to name the per-job working directory. Caller supplied ids never
/// reach the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the face image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceSource {
    /// Base64 payload, data-URI header already stripped
    Inline(String),
    /// Remote image
    Url(Url),
}

impl FaceSource {
    pub fn kind(&self) -> &'static str {
        match self {
            FaceSource::Inline(_) => "inline",
            FaceSource::Url(_) => "url",
        }
    }
}

/// Where the target video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    /// Base64 payload, data-URI header already stripped
    Inline(String),
    /// Remote video, cached in shared storage under `cache_key` when given
    Url { url: Url, cache_key: Option<String> },
    /// A video already present on local or shared storage
    Existing(PathBuf),
    /// A template known only by id: served from the shared cache or the
    /// configured template host
    Template { template_id: String },
}

impl TargetSource {
    pub fn kind(&self) -> &'static str {
        match self {
            TargetSource::Inline(_) => "inline",
            TargetSource::Url { .. } => "url",
            TargetSource::Existing(_) => "existing",
            TargetSource::Template { .. } => "template",
        }
    }
}

/// A resolved face-swap job.
///
/// Built once by the input resolver and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Job {
    /// Internal id, names the working directory
    pub id: JobId,

    /// Caller correlation id, echoed back
    pub request_id: Option<String>,

    /// Caller user id, echoed back
    pub user_id: Option<String>,

    /// Where to POST the result record
    pub callback_url: Option<String>,

    pub face: FaceSource,

    pub target: TargetSource,

    /// Directory holding this job's transient files
    pub job_dir: PathBuf,

    /// Where the tool writes the rendered video
    pub output_path: PathBuf,

    /// Caller arguments replacing the default tool template
    pub override_args: Option<Vec<String>>,
}

impl Job {
    /// Label used in logs when the caller did not send a request id.
    pub fn log_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or_else(|| self.id.as_str())
    }

    pub fn has_callback(&self) -> bool {
        self.callback_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(request_id: Option<&str>) -> Job {
        Job {
            id: JobId("job-1".to_string()),
            request_id: request_id.map(str::to_string),
            user_id: None,
            callback_url: None,
            face: FaceSource::Inline("aGVsbG8=".to_string()),
            target: TargetSource::Existing(PathBuf::from("/workspace/video/1.mp4")),
            job_dir: PathBuf::from("/tmp/fswap/job-1"),
            output_path: PathBuf::from("/tmp/fswap/job-1/output.mp4"),
            override_args: None,
        }
    }

    #[test]
    fn test_job_id_is_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_log_id_prefers_request_id() {
        assert_eq!(sample_job(Some("req-9")).log_id(), "req-9");
        assert_eq!(sample_job(None).log_id(), "job-1");
    }

    #[test]
    fn test_source_kinds() {
        let url = Url::parse("https://host/video.mp4").unwrap();
        assert_eq!(FaceSource::Url(url.clone()).kind(), "url");
        assert_eq!(
            TargetSource::Url { url, cache_key: None }.kind(),
            "url"
        );
        assert_eq!(
            TargetSource::Template { template_id: "intro".to_string() }.kind(),
            "template"
        );
    }
}
