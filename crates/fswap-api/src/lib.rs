//! Axum HTTP bridge for the face-swap pipeline.
//!
//! This crate provides:
//! - Synchronous and callback-driven job submission
//! - Liveness, readiness and tool environment probes
//! - Job serialization through a bounded permit pool
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
