//! Materialized assets.

use std::path::{Path, PathBuf};

/// A local file produced or located by the materializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    /// Shared or cached file that must survive per-job cleanup
    pub retain: bool,
}

impl Asset {
    /// A file private to one job.
    pub fn transient(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retain: false,
        }
    }

    /// A shared file that cleanup must leave alone.
    pub fn retained(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            retain: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Face image and target video, ready for the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAssets {
    pub face: Asset,
    pub target: Asset,
}
