//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "fswap_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "fswap_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "fswap_http_requests_in_flight";

    // Job slot metrics
    pub const JOBS_WAITING: &str = "fswap_jobs_waiting";
    pub const JOBS_RUNNING: &str = "fswap_jobs_running";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn job_queued() {
    gauge!(names::JOBS_WAITING).increment(1.0);
}

pub fn job_dequeued() {
    gauge!(names::JOBS_WAITING).decrement(1.0);
}

pub fn job_started() {
    gauge!(names::JOBS_RUNNING).increment(1.0);
}

pub fn job_finished() {
    gauge!(names::JOBS_RUNNING).decrement(1.0);
}

/// Collapse unknown paths so scanners cannot blow up label cardinality.
fn sanitize_path(path: &str) -> String {
    match path {
        "/ping" | "/health" | "/healthz" | "/ready" | "/metrics" | "/process"
        | "/process/async" => path.to_string(),
        _ => "/:other".to_string(),
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/process/async"), "/process/async");
        assert_eq!(sanitize_path("/wp-admin/setup.php"), "/:other");
    }
}
