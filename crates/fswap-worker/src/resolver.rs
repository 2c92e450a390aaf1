//! Input resolution.
//!
//! Turns the untyped job record handed over by the runtime into a [`Job`].
//! Every check here happens before any file or network I/O.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use url::Url;

use fswap_models::{FaceSource, Job, JobId, TargetSource};
use fswap_media::strip_data_uri;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::materializer::{FACE_FILE_NAME, TARGET_FILE_NAME};
use crate::paths::{confine, confine_any};

/// Default output file name inside the job directory.
pub const DEFAULT_OUTPUT_NAME: &str = "output.mp4";

/// The job fields, unwrapping a runtime envelope `{ "input": { ... } }`.
pub fn job_input(record: &Value) -> &Value {
    match record.get("input") {
        Some(input) if input.is_object() => input,
        _ => record,
    }
}

/// Best-effort `(requestId, userId)` for echoing on any result, including
/// records that fail validation.
pub fn correlation_ids(record: &Value) -> (Option<String>, Option<String>) {
    let input = job_input(record);
    let get = |key: &str| {
        input
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    (get("requestId"), get("userId"))
}

/// Callback URL of a record, read without validating anything else, so a
/// rejected record can still be reported to its caller.
pub fn callback_url(record: &Value) -> Option<String> {
    job_input(record)
        .get("callbackUrl")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve a job record.
pub fn resolve_job(record: &Value, config: &WorkerConfig) -> WorkerResult<Job> {
    let input = job_input(record)
        .as_object()
        .ok_or_else(|| WorkerError::validation("job input must be an object"))?;

    let request_id = string_field(input, &["requestId"])?;
    let user_id = string_field(input, &["userId"])?;
    let callback_url = string_field(input, &["callbackUrl"])?;

    let face = resolve_face(input)?;

    let id = JobId::new();
    let job_dir = config.work_dir.join(id.as_str());
    let target = resolve_target(input, config)?;

    let output_path = match string_field(input, &["outputPath"])? {
        Some(candidate) => output_path(&job_dir, &candidate)?,
        None => job_dir.join(DEFAULT_OUTPUT_NAME),
    };

    let override_args = args_field(input)?;

    Ok(Job {
        id,
        request_id,
        user_id,
        callback_url,
        face,
        target,
        job_dir,
        output_path,
        override_args,
    })
}

/// The output lives in the job directory, so stale-output removal and
/// cleanup never reach past this job, and never lands on a job input.
fn output_path(job_dir: &Path, candidate: &str) -> WorkerResult<PathBuf> {
    let resolved = confine(job_dir, job_dir, candidate).ok_or_else(|| {
        WorkerError::validation("outputPath must stay inside the job directory")
    })?;
    if resolved == job_dir.join(FACE_FILE_NAME) || resolved == job_dir.join(TARGET_FILE_NAME) {
        return Err(WorkerError::validation(format!(
            "outputPath must not replace a job input: {}",
            candidate
        )));
    }
    Ok(resolved)
}

fn resolve_face(input: &Map<String, Value>) -> WorkerResult<FaceSource> {
    let inline = inline_field(input, &["faceBase64"])?;
    let url = string_field(input, &["faceUrl"])?;

    match (inline, url) {
        (Some(_), Some(_)) => Err(WorkerError::validation("conflicting face sources")),
        (Some(b64), None) => Ok(FaceSource::Inline(b64)),
        (None, Some(url)) => Ok(FaceSource::Url(remote_url("faceUrl", &url)?)),
        (None, None) => Err(WorkerError::validation("missing face source")),
    }
}

fn resolve_target(input: &Map<String, Value>, config: &WorkerConfig) -> WorkerResult<TargetSource> {
    let url = string_field(input, &["templateUrl", "targetUrl"])?;
    let inline = inline_field(input, &["templateBase64", "targetBase64"])?;
    let path = string_field(input, &["templatePath", "targetPath"])?;
    let template_id = string_field(input, &["templateId"])?
        .map(|id| validate_template_id(&id))
        .transpose()?;

    let given = [url.is_some(), inline.is_some(), path.is_some()]
        .iter()
        .filter(|g| **g)
        .count();
    if given > 1 {
        return Err(WorkerError::validation("conflicting target sources"));
    }

    if let Some(url) = url {
        return Ok(TargetSource::Url {
            url: remote_url("templateUrl", &url)?,
            cache_key: template_id,
        });
    }
    if let Some(b64) = inline {
        return Ok(TargetSource::Inline(b64));
    }
    if let Some(path) = path {
        let resolved = confine_any(&config.template_roots, &config.shared_dir, &path)
            .ok_or_else(|| {
                WorkerError::validation(format!(
                    "templatePath must be under one of: {}",
                    config
                        .template_roots
                        .iter()
                        .map(|r| r.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;
        return Ok(TargetSource::Existing(resolved));
    }
    if let Some(template_id) = template_id {
        return Ok(TargetSource::Template { template_id });
    }

    Err(WorkerError::validation("missing target source"))
}

/// Read a string field under any of `names`, first match wins.
///
/// Null and blank values count as absent; other non-strings are rejected.
fn string_field(input: &Map<String, Value>, names: &[&str]) -> WorkerResult<Option<String>> {
    for name in names {
        match input.get(*name) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    return Ok(Some(trimmed.to_string()));
                }
            }
            Some(_) => {
                return Err(WorkerError::validation(format!("{} must be a string", name)));
            }
        }
    }
    Ok(None)
}

/// Read a base64 field with any data-URI header dropped. A header with no
/// payload counts as absent.
fn inline_field(input: &Map<String, Value>, names: &[&str]) -> WorkerResult<Option<String>> {
    Ok(string_field(input, names)?
        .map(|b64| strip_data_uri(&b64).trim().to_string())
        .filter(|body| !body.is_empty()))
}

/// Read the override argument list. An empty list counts as absent.
fn args_field(input: &Map<String, Value>) -> WorkerResult<Option<Vec<String>>> {
    let items = match input.get("args") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(WorkerError::validation("args must be an array of strings")),
    };

    let args = items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| WorkerError::validation("args must be an array of strings"))
        })
        .collect::<WorkerResult<Vec<_>>>()?;

    Ok(if args.is_empty() { None } else { Some(args) })
}

fn remote_url(field: &str, value: &str) -> WorkerResult<Url> {
    let url = Url::parse(value)
        .map_err(|e| WorkerError::validation(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(WorkerError::validation(format!(
            "{} must use http or https, got {}",
            field, scheme
        ))),
    }
}

/// Template ids become file names in the shared cache.
fn validate_template_id(id: &str) -> WorkerResult<String> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(id.to_string())
    } else {
        Err(WorkerError::validation(format!("invalid templateId: {}", id)))
    }
}
