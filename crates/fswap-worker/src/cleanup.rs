//! Scope-exit cleanup of transient job files.
//!
//! A [`Cleanup`] guard collects every transient path a job creates. Call
//! [`Cleanup::finish`] once the result has been dispatched; if the guard is
//! dropped without it (panic, cancelled request) the same removal runs
//! synchronously from `Drop`.

use std::path::{Path, PathBuf};

use fswap_models::Asset;
use tracing::{debug, warn};

use crate::metrics;
use crate::paths::is_within;

/// RAII guard for a job's transient files.
#[derive(Debug)]
pub struct Cleanup {
    /// Only paths strictly inside this root are ever removed
    root: PathBuf,
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    retained: Vec<PathBuf>,
    finished: bool,
}

impl Cleanup {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Vec::new(),
            dirs: Vec::new(),
            retained: Vec::new(),
            finished: false,
        }
    }

    /// Track a materialized asset. Retained assets are recorded so that
    /// nothing containing them is removed.
    pub fn track_asset(&mut self, asset: &Asset) {
        if asset.retain {
            self.retained.push(asset.path.clone());
        } else {
            self.track_file(&asset.path);
        }
    }

    pub fn track_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }

    /// Track a directory removed recursively at the end.
    pub fn track_dir(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        if !self.dirs.contains(&path) {
            self.dirs.push(path);
        }
    }

    pub fn tracked_files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn retained(&self) -> &[PathBuf] {
        &self.retained
    }

    /// Whether `path` may be removed.
    fn removable(&self, path: &Path) -> bool {
        if !is_within(&self.root, path) {
            return false;
        }
        !self
            .retained
            .iter()
            .any(|kept| kept == path || kept.starts_with(path))
    }

    /// Remove everything tracked. Failures are logged and counted, never
    /// returned. Returns the number of paths removed.
    pub async fn finish(mut self) -> usize {
        self.finished = true;
        let mut removed = 0;

        for file in &self.files {
            if !self.removable(file) {
                debug!("Skipping cleanup of {}", file.display());
                continue;
            }
            match tokio::fs::remove_file(file).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove {}: {}", file.display(), e);
                    metrics::record_cleanup_failure();
                }
            }
        }

        for dir in &self.dirs {
            if !self.removable(dir) {
                debug!("Skipping cleanup of {}", dir.display());
                continue;
            }
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!("Failed to remove directory {}: {}", dir.display(), e);
                    metrics::record_cleanup_failure();
                }
            }
        }

        removed
    }

    fn remove_blocking(&self) {
        for file in self.files.iter().filter(|f| self.removable(f)) {
            if let Err(e) = std::fs::remove_file(file) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", file.display(), e);
                    metrics::record_cleanup_failure();
                }
            }
        }
        for dir in self.dirs.iter().filter(|d| self.removable(d)) {
            if let Err(e) = std::fs::remove_dir_all(dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove directory {}: {}", dir.display(), e);
                    metrics::record_cleanup_failure();
                }
            }
        }
    }
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Cleanup dropped without finish(), removing job files synchronously");
            self.remove_blocking();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_removes_transient_keeps_retained() {
        let root = TempDir::new().unwrap();
        let job_dir = root.path().join("job");
        let shared = root.path().join("shared");
        std::fs::create_dir_all(&job_dir).unwrap();
        std::fs::create_dir_all(&shared).unwrap();

        let face = job_dir.join("source.jpg");
        let template = shared.join("intro.mp4");
        std::fs::write(&face, b"face").unwrap();
        std::fs::write(&template, b"video").unwrap();

        let mut cleanup = Cleanup::new(root.path());
        cleanup.track_asset(&Asset::transient(&face));
        cleanup.track_asset(&Asset::retained(&template));
        cleanup.track_dir(&job_dir);
        assert_eq!(cleanup.retained(), &[template.clone()]);

        cleanup.finish().await;

        assert!(!face.exists());
        assert!(!job_dir.exists());
        assert!(template.exists());
    }

    #[tokio::test]
    async fn test_never_removes_dir_holding_retained_file() {
        let root = TempDir::new().unwrap();
        let job_dir = root.path().join("job");
        std::fs::create_dir_all(&job_dir).unwrap();
        let kept = job_dir.join("target.mp4");
        std::fs::write(&kept, b"video").unwrap();

        let mut cleanup = Cleanup::new(root.path());
        cleanup.track_asset(&Asset::retained(&kept));
        cleanup.track_file(&kept);
        cleanup.track_dir(&job_dir);
        cleanup.finish().await;

        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_outside_root_is_left_alone() {
        let root = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let stray = other.path().join("stray.txt");
        std::fs::write(&stray, b"x").unwrap();

        let mut cleanup = Cleanup::new(root.path());
        cleanup.track_file(&stray);
        assert_eq!(cleanup.finish().await, 0);
        assert!(stray.exists());
    }

    #[tokio::test]
    async fn test_missing_paths_are_not_errors() {
        let root = TempDir::new().unwrap();
        let mut cleanup = Cleanup::new(root.path());
        cleanup.track_file(root.path().join("never-created.mp4"));
        cleanup.track_dir(root.path().join("never-created"));
        assert_eq!(cleanup.finish().await, 0);
    }

    #[test]
    fn test_drop_without_finish_removes() {
        let root = TempDir::new().unwrap();
        let job_dir = root.path().join("job");
        std::fs::create_dir_all(&job_dir).unwrap();
        std::fs::write(job_dir.join("output.mp4"), b"x").unwrap();

        {
            let mut cleanup = Cleanup::new(root.path());
            cleanup.track_dir(&job_dir);
        }

        assert!(!job_dir.exists());
    }
}
