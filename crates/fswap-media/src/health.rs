//! Tool environment health check.
//!
//! Run explicitly at startup, by the selfcheck binary and by readiness
//! probes. Nothing here runs as a side effect of loading the crate.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::ToolConfig;

/// Result of one check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub ok: bool,
    /// Optional checks do not affect overall health
    pub required: bool,
    pub detail: String,
}

impl HealthCheck {
    fn required(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            required: true,
            detail: detail.into(),
        }
    }

    fn optional(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            required: false,
            detail: detail.into(),
        }
    }
}

/// All checks for one tool installation.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    /// Every required check passed.
    pub fn is_healthy(&self) -> bool {
        self.checks.iter().all(|c| c.ok || !c.required)
    }

    pub fn failures(&self) -> impl Iterator<Item = &HealthCheck> {
        self.checks.iter().filter(|c| c.required && !c.ok)
    }

    /// Log every check once.
    pub fn log(&self) {
        for check in &self.checks {
            if check.ok {
                info!(check = check.name, "Health check passed: {}", check.detail);
            } else if check.required {
                warn!(check = check.name, "Health check failed: {}", check.detail);
            } else {
                info!(check = check.name, "Optional check unavailable: {}", check.detail);
            }
        }
    }
}

/// Inspect the tool installation.
///
/// The models directory must be provisioned ahead of time because every run
/// passes the offline flag.
pub async fn check_environment(config: &ToolConfig) -> HealthReport {
    let mut checks = Vec::new();

    checks.push(HealthCheck::required(
        "tool_root",
        config.root.is_dir(),
        config.root.display().to_string(),
    ));

    let script = config.script_path();
    checks.push(HealthCheck::required(
        "entry_script",
        script.is_file(),
        script.display().to_string(),
    ));

    checks.push(match which::which(&config.program) {
        Ok(path) => HealthCheck::required("interpreter", true, path.display().to_string()),
        Err(e) => HealthCheck::required("interpreter", false, format!("{}: {}", config.program, e)),
    });

    checks.push(check_models_dir(&config.models_dir).await);
    checks.push(check_gpu().await);

    HealthReport { checks }
}

async fn check_models_dir(dir: &Path) -> HealthCheck {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            return HealthCheck::required("models", false, format!("{}: {}", dir.display(), e))
        }
    };

    let mut count = 0usize;
    while let Ok(Some(_)) = entries.next_entry().await {
        count += 1;
    }

    HealthCheck::required(
        "models",
        count > 0,
        format!("{} ({} artifacts)", dir.display(), count),
    )
}

/// List GPUs through `nvidia-smi` when present.
async fn check_gpu() -> HealthCheck {
    if which::which("nvidia-smi").is_err() {
        return HealthCheck::optional("gpu", false, "nvidia-smi not found");
    }

    let output = Command::new("nvidia-smi")
        .args(["--query-gpu=name,memory.total", "--format=csv,noheader"])
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(Duration::from_secs(10), output).await {
        Ok(Ok(out)) if out.status.success() => {
            let gpus = String::from_utf8_lossy(&out.stdout).trim().replace('\n', "; ");
            HealthCheck::optional("gpu", !gpus.is_empty(), gpus)
        }
        Ok(Ok(out)) => HealthCheck::optional(
            "gpu",
            false,
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        ),
        Ok(Err(e)) => HealthCheck::optional("gpu", false, e.to_string()),
        Err(_) => HealthCheck::optional("gpu", false, "nvidia-smi timed out"),
    }
}
