#![deny(unreachable_patterns)]
//! FaceFusion CLI wrapper and asset I/O.
//!
//! This crate provides:
//! - Type-safe FaceFusion command building with the mandatory offline flag
//! - A child-process runner with hard timeout and captured output
//! - Base64 payload decoding and encoding
//! - Streaming HTTP downloads with atomic placement
//! - An explicit environment health check

pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod health;
pub mod payload;
pub mod runner;

pub use command::{FaceSwapCommand, OFFLINE_FLAG};
pub use config::ToolConfig;
pub use download::download_to_file;
pub use error::{MediaError, MediaResult};
pub use health::{check_environment, HealthCheck, HealthReport};
pub use payload::{decode_base64, decode_to_file, encode_file, strip_data_uri};
pub use runner::{ExecutionResult, ToolRunner};
