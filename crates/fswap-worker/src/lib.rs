//! Face-swap job pipeline.
//!
//! This crate provides:
//! - Input resolution from untyped job records
//! - Asset materialization with a shared template cache
//! - Tool invocation and result classification
//! - Inline or callback delivery of the result record
//! - Scope-exit cleanup of transient files

pub mod cleanup;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod materializer;
pub mod metrics;
pub mod paths;
pub mod pipeline;
pub mod resolver;

pub use cleanup::Cleanup;
pub use config::WorkerConfig;
pub use dispatcher::ResultDispatcher;
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use materializer::AssetMaterializer;
pub use pipeline::JobPipeline;
pub use resolver::{callback_url, correlation_ids, resolve_job};
