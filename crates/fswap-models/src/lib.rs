//! Shared data models for the face-swap bridge.
//!
//! This crate provides:
//! - The resolved job and its asset sources
//! - Materialized asset paths with their retain flag
//! - The result record returned inline or posted to a callback

pub mod asset;
pub mod job;
pub mod result;

// Re-export common types
pub use asset::{Asset, ResolvedAssets};
pub use job::{FaceSource, Job, JobId, TargetSource};
pub use result::{CallbackStatus, JobResult};
