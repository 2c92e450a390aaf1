//! Asset materialization.
//!
//! Places the face image and target video on local disk, reusing the shared
//! template cache where possible.
//!
//! Concurrent jobs may miss the cache for the same key and download it
//! twice. Each download goes to its own `.part` file and is renamed into
//! place, so the last writer wins with identical bytes.

use std::path::{Path, PathBuf};
use std::time::Instant;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use fswap_media::fs_utils::is_nonempty_file;
use fswap_media::{decode_to_file, download_to_file};
use fswap_models::{Asset, FaceSource, Job, ResolvedAssets, TargetSource};

use crate::cleanup::Cleanup;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

pub const FACE_FILE_NAME: &str = "source.jpg";
pub const TARGET_FILE_NAME: &str = "target.mp4";

/// Fetches and decodes job assets.
#[derive(Clone)]
pub struct AssetMaterializer {
    client: Client,
    config: WorkerConfig,
}

impl AssetMaterializer {
    pub fn new(client: Client, config: WorkerConfig) -> Self {
        Self { client, config }
    }

    /// Materialize both assets for `job`, registering transient files with
    /// `cleanup` as soon as they are created.
    pub async fn materialize(&self, job: &Job, cleanup: &mut Cleanup) -> WorkerResult<ResolvedAssets> {
        let face = self.materialize_face(job).await?;
        cleanup.track_asset(&face);

        let target = self.materialize_target(job).await?;
        cleanup.track_asset(&target);

        Ok(ResolvedAssets { face, target })
    }

    async fn materialize_face(&self, job: &Job) -> WorkerResult<Asset> {
        let dest = job.job_dir.join(FACE_FILE_NAME);
        match &job.face {
            FaceSource::Inline(b64) => {
                let bytes = decode_to_file(b64, &dest).await?;
                debug!(bytes, "Decoded face image");
            }
            FaceSource::Url(url) => {
                self.download("face", url, &dest).await?;
            }
        }
        Ok(Asset::transient(dest))
    }

    async fn materialize_target(&self, job: &Job) -> WorkerResult<Asset> {
        match &job.target {
            TargetSource::Inline(b64) => {
                let dest = job.job_dir.join(TARGET_FILE_NAME);
                let bytes = decode_to_file(b64, &dest).await?;
                debug!(bytes, "Decoded target video");
                Ok(Asset::transient(dest))
            }
            TargetSource::Url { url, cache_key } => {
                let key = cache_key.clone().unwrap_or_else(|| url_cache_key(url));
                let dest = self.cache_path(&key);
                if self.cache_lookup(&dest).await {
                    return Ok(Asset::retained(dest));
                }
                self.download("template", url, &dest).await?;
                Ok(Asset::retained(dest))
            }
            TargetSource::Existing(path) => {
                if tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false) {
                    Ok(Asset::retained(path.clone()))
                } else {
                    Err(WorkerError::asset(format!("target not found: {}", path.display())))
                }
            }
            TargetSource::Template { template_id } => {
                let dest = self.cache_path(template_id);
                if self.cache_lookup(&dest).await {
                    return Ok(Asset::retained(dest));
                }
                let host = self.config.template_host.as_deref().ok_or_else(|| {
                    WorkerError::asset(format!("template not cached: {}", template_id))
                })?;
                let url = template_url(host, template_id)?;
                self.download("template", &url, &dest).await?;
                Ok(Asset::retained(dest))
            }
        }
    }

    fn cache_path(&self, key: &str) -> PathBuf {
        self.config.shared_dir.join(format!("{}.mp4", key))
    }

    async fn cache_lookup(&self, path: &Path) -> bool {
        let hit = is_nonempty_file(path).await;
        metrics::record_template_cache(hit);
        if hit {
            info!("Template cache hit: {}", path.display());
        }
        hit
    }

    async fn download(&self, asset: &str, url: &Url, dest: &Path) -> WorkerResult<u64> {
        let start = Instant::now();
        let bytes = download_to_file(&self.client, url, dest, self.config.download_timeout).await?;
        metrics::record_download(asset, start.elapsed().as_secs_f64());
        Ok(bytes)
    }
}

/// Cache key for a template URL without an explicit id: the first 16 hex
/// characters of its SHA-256.
pub fn url_cache_key(url: &Url) -> String {
    let digest = Sha256::digest(url.as_str().as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn template_url(host: &str, template_id: &str) -> WorkerResult<Url> {
    let raw = format!("{}/templates/{}.mp4", host.trim_end_matches('/'), template_id);
    Url::parse(&raw).map_err(|e| WorkerError::config_error(format!("invalid template host {}: {}", host, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fswap_models::JobId;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Sandbox {
        _root: TempDir,
        config: WorkerConfig,
    }

    fn sandbox() -> Sandbox {
        let root = TempDir::new().unwrap();
        let mut config = WorkerConfig::default();
        config.work_dir = root.path().join("work");
        config.shared_dir = root.path().join("shared");
        config.template_roots = vec![config.shared_dir.clone()];
        Sandbox { _root: root, config }
    }

    fn job(config: &WorkerConfig, face: FaceSource, target: TargetSource) -> Job {
        let id = JobId::new();
        let job_dir = config.work_dir.join(id.as_str());
        Job {
            output_path: job_dir.join("output.mp4"),
            id,
            request_id: None,
            user_id: None,
            callback_url: None,
            face,
            target,
            job_dir,
            override_args: None,
        }
    }

    #[test]
    fn test_url_cache_key_is_stable() {
        let url = Url::parse("https://host/video.mp4").unwrap();
        let key = url_cache_key(&url);
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, url_cache_key(&url));
        assert_ne!(key, url_cache_key(&Url::parse("https://host/other.mp4").unwrap()));
    }

    #[tokio::test]
    async fn test_inline_assets_are_transient() {
        let sb = sandbox();
        let job = job(
            &sb.config,
            FaceSource::Inline("aGVsbG8=".to_string()),
            TargetSource::Inline("AAAAIGZ0eXBpc29t".to_string()),
        );
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let assets = materializer.materialize(&job, &mut cleanup).await.unwrap();

        assert_eq!(assets.face.path, job.job_dir.join(FACE_FILE_NAME));
        assert!(!assets.face.retain);
        assert!(!assets.target.retain);
        assert_eq!(std::fs::read(&assets.face.path).unwrap(), b"hello");
        assert_eq!(cleanup.tracked_files().len(), 2);
        cleanup.finish().await;
    }

    #[tokio::test]
    async fn test_cache_hit_issues_no_request() {
        let sb = sandbox();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .expect(0)
            .mount(&server)
            .await;

        std::fs::create_dir_all(&sb.config.shared_dir).unwrap();
        let cached = sb.config.shared_dir.join("intro.mp4");
        std::fs::write(&cached, b"cached video").unwrap();

        let url = Url::parse(&format!("{}/video.mp4", server.uri())).unwrap();
        let job = job(
            &sb.config,
            FaceSource::Inline("aGVsbG8=".to_string()),
            TargetSource::Url { url, cache_key: Some("intro".to_string()) },
        );
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let assets = materializer.materialize(&job, &mut cleanup).await.unwrap();

        assert_eq!(assets.target, Asset::retained(cached.clone()));
        assert_eq!(std::fs::read(&cached).unwrap(), b"cached video");
        cleanup.finish().await;
    }

    #[tokio::test]
    async fn test_cache_miss_downloads_and_retains() {
        let sb = sandbox();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"remote video".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/video.mp4", server.uri())).unwrap();
        let key = url_cache_key(&url);
        let job = job(
            &sb.config,
            FaceSource::Inline("aGVsbG8=".to_string()),
            TargetSource::Url { url, cache_key: None },
        );
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let assets = materializer.materialize(&job, &mut cleanup).await.unwrap();
        let expected = sb.config.shared_dir.join(format!("{}.mp4", key));

        assert_eq!(assets.target, Asset::retained(expected.clone()));
        cleanup.finish().await;
        assert_eq!(std::fs::read(&expected).unwrap(), b"remote video");
    }

    #[tokio::test]
    async fn test_template_id_uses_host_when_not_cached() {
        let mut sb = sandbox();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/templates/dance.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"dance".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        sb.config.template_host = Some(server.uri());

        let job = job(
            &sb.config,
            FaceSource::Inline("aGVsbG8=".to_string()),
            TargetSource::Template { template_id: "dance".to_string() },
        );
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let assets = materializer.materialize(&job, &mut cleanup).await.unwrap();
        assert_eq!(assets.target.path, sb.config.shared_dir.join("dance.mp4"));
        assert!(assets.target.retain);
        cleanup.finish().await;
    }

    #[tokio::test]
    async fn test_template_id_without_host_or_cache() {
        let sb = sandbox();
        let job = job(
            &sb.config,
            FaceSource::Inline("aGVsbG8=".to_string()),
            TargetSource::Template { template_id: "dance".to_string() },
        );
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let err = materializer.materialize(&job, &mut cleanup).await.unwrap_err();
        assert_eq!(err.kind(), "asset");
        assert_eq!(err.to_string(), "template not cached: dance");
        cleanup.finish().await;
    }

    #[tokio::test]
    async fn test_missing_existing_target() {
        let sb = sandbox();
        let missing = sb.config.shared_dir.join("gone.mp4");
        let job = job(
            &sb.config,
            FaceSource::Inline("aGVsbG8=".to_string()),
            TargetSource::Existing(missing.clone()),
        );
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let err = materializer.materialize(&job, &mut cleanup).await.unwrap_err();
        assert_eq!(err.to_string(), format!("target not found: {}", missing.display()));
        assert_eq!(cleanup.tracked_files().len(), 1);
        cleanup.finish().await;
    }

    #[tokio::test]
    async fn test_bad_base64_is_asset_error() {
        let sb = sandbox();
        let job = job(
            &sb.config,
            FaceSource::Inline("!!not base64!!".to_string()),
            TargetSource::Inline("AAAA".to_string()),
        );
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let err = materializer.materialize(&job, &mut cleanup).await.unwrap_err();
        assert_eq!(err.kind(), "asset");
        assert_eq!(err.to_string(), "decode failed");
        cleanup.finish().await;
    }

    #[tokio::test]
    async fn test_face_download_failure() {
        let sb = sandbox();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/face.jpg", server.uri())).unwrap();
        let job = job(&sb.config, FaceSource::Url(url), TargetSource::Inline("AAAA".to_string()));
        let materializer = AssetMaterializer::new(Client::new(), sb.config.clone());
        let mut cleanup = Cleanup::new(&sb.config.work_dir);

        let err = materializer.materialize(&job, &mut cleanup).await.unwrap_err();
        assert!(err.to_string().starts_with("download failed: "));
        assert!(!job.job_dir.join(FACE_FILE_NAME).exists());
        cleanup.finish().await;
    }
}
