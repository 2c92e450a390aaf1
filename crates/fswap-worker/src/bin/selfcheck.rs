use std::path::Path;

use fswap_media::check_environment;
use fswap_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "fswap-selfcheck: starting with work_dir={} tool_root={}",
        config.work_dir.display(),
        config.tool.root.display()
    );
    ensure_dir(&config.work_dir).await?;
    ensure_dir(&config.shared_dir).await?;

    let report = check_environment(&config.tool).await;
    for check in &report.checks {
        let status = match (check.ok, check.required) {
            (true, _) => "ok",
            (false, true) => "FAIL",
            (false, false) => "skip",
        };
        println!("fswap-selfcheck: {:<13} {:<4} {}", check.name, status, check.detail);
    }

    if !report.is_healthy() {
        let failed: Vec<_> = report.failures().map(|c| c.name).collect();
        return Err(anyhow::anyhow!("failed checks: {}", failed.join(", ")));
    }

    println!("fswap-selfcheck: ok");
    Ok(())
}

async fn ensure_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))?;
    Ok(())
}
