//! Serverless face-swap handler binary.
//!
//! Reads one job record (JSON) from the file named by the first argument, or
//! from stdin, and prints the result record to stdout. Exits 0 whenever a
//! result record was printed, failures included.

use anyhow::Context;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use fswap_media::check_environment;
use fswap_models::JobResult;
use fswap_worker::{init_tracing, JobPipeline, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting fswap-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let report = check_environment(&config.tool).await;
    report.log();
    if !report.is_healthy() {
        warn!("Tool environment is degraded, jobs may fail");
    }

    let raw = read_input(std::env::args().nth(1)).await?;
    let pipeline = JobPipeline::new(config)?;

    let result = match serde_json::from_str::<Value>(&raw) {
        Ok(record) => pipeline.handle(&record).await,
        Err(e) => {
            warn!("Job record is not valid JSON: {}", e);
            JobResult::failure(format!("invalid job JSON: {}", e)).with_message("invalid job input")
        }
    };

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

async fn read_input(path: Option<String>) -> anyhow::Result<String> {
    match path.as_deref() {
        Some(path) if path != "-" => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read job file {}", path)),
        _ => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .context("failed to read job from stdin")?;
            Ok(raw)
        }
    }
}
