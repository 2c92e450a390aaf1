//! HTTP downloads for face images and target videos.

use std::path::Path;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_parent, part_path};

/// Default timeout for one download (large templates included).
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Download `url` to `dest`, returning the number of bytes written.
///
/// The body is streamed to a unique `.part` sibling and renamed into place,
/// so a reader never observes a half-written `dest`. The partial file is
/// removed on any failure.
pub async fn download_to_file(
    client: &Client,
    url: &Url,
    dest: &Path,
    timeout: Duration,
) -> MediaResult<u64> {
    ensure_parent(dest).await?;

    let part = part_path(dest);
    let start = Instant::now();
    info!("Downloading: {} -> {}", url, dest.display());

    match stream_to(client, url, &part, timeout).await {
        Ok(bytes) => {
            if let Err(e) = fs::rename(&part, dest).await {
                let _ = fs::remove_file(&part).await;
                return Err(MediaError::from(e));
            }
            debug!(
                bytes,
                duration_ms = start.elapsed().as_millis() as u64,
                "Download complete: {}",
                dest.display()
            );
            Ok(bytes)
        }
        Err(e) => {
            if let Err(rm) = fs::remove_file(&part).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial download {}: {}", part.display(), rm);
                }
            }
            Err(e)
        }
    }
}

async fn stream_to(client: &Client, url: &Url, part: &Path, timeout: Duration) -> MediaResult<u64> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| MediaError::download_failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(MediaError::download_failed(format!(
            "{} returned {}",
            url, status
        )));
    }

    let mut file = fs::File::create(part).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| MediaError::download_failed(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}
