//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use fswap_media::{check_environment, HealthReport};

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Bridge status with its storage locations.
#[derive(Serialize)]
pub struct PingResponse {
    pub status: String,
    pub version: String,
    pub dirs: PingDirs,
    pub available_slots: usize,
}

#[derive(Serialize)]
pub struct PingDirs {
    pub templates: String,
    pub work: String,
}

pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    let config = state.pipeline.config();
    Json(PingResponse {
        status: "online".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dirs: PingDirs {
            templates: config.shared_dir.display().to_string(),
            work: config.work_dir.display().to_string(),
        },
        available_slots: state.job_permits.available_permits(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    #[serde(flatten)]
    pub report: HealthReport,
}

/// Readiness check endpoint (readiness probe).
/// Inspects the tool installation and provisioned models.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let report = check_environment(&state.pipeline.config().tool).await;
    let healthy = report.is_healthy();

    let response = ReadinessResponse {
        status: if healthy { "ready" } else { "degraded" }.to_string(),
        report,
    };

    if healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
