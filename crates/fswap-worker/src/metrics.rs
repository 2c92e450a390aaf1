//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade; a no-op unless the host installs
//! a recorder (the API server installs Prometheus).

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "fswap_jobs_total";
    pub const TOOL_DURATION_SECONDS: &str = "fswap_tool_duration_seconds";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "fswap_download_duration_seconds";
    pub const TEMPLATE_CACHE_TOTAL: &str = "fswap_template_cache_total";
    pub const CALLBACK_FAILURES_TOTAL: &str = "fswap_callback_failures_total";
    pub const CLEANUP_FAILURES_TOTAL: &str = "fswap_cleanup_failures_total";
}

/// Record a finished job. `kind` is the error kind, or "none" on success.
pub fn record_job(success: bool, kind: &str) {
    let labels = [
        ("outcome", if success { "success" } else { "failure" }.to_string()),
        ("kind", kind.to_string()),
    ];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
}

pub fn record_tool_duration(duration_secs: f64, exit_code: Option<i32>) {
    let labels = [(
        "exit_code",
        exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
    )];
    histogram!(names::TOOL_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_download(asset: &str, duration_secs: f64) {
    let labels = [("asset", asset.to_string())];
    histogram!(names::DOWNLOAD_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a template cache lookup.
pub fn record_template_cache(hit: bool) {
    let labels = [("result", if hit { "hit" } else { "miss" }.to_string())];
    counter!(names::TEMPLATE_CACHE_TOTAL, &labels).increment(1);
}

pub fn record_callback_failure() {
    counter!(names::CALLBACK_FAILURES_TOTAL).increment(1);
}

pub fn record_cleanup_failure() {
    counter!(names::CLEANUP_FAILURES_TOTAL).increment(1);
}
