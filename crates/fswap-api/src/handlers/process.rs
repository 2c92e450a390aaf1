//! Job submission handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, Instrument};
use uuid::Uuid;

use fswap_models::JobResult;
use fswap_worker::{callback_url, correlation_ids};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Run a job and answer with its result record.
///
/// Pipeline failures are still a 200 with `success: false`; only requests
/// that are not JSON objects are rejected.
pub async fn process(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<JobResult>> {
    let Json(record) = body?;
    if !record.is_object() {
        return Err(ApiError::bad_request("job record must be a JSON object"));
    }

    Ok(Json(state.run_job(record).await))
}

/// Acknowledgement for a job accepted for background processing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedResponse {
    pub status: String,
    pub request_id: String,
}

/// Accept a job and deliver its result to `callbackUrl` later.
///
/// A missing `requestId` is generated so the callback can be correlated.
pub async fn process_async(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let Json(mut record) = body?;
    if !record.is_object() {
        return Err(ApiError::bad_request("job record must be a JSON object"));
    }
    if callback_url(&record).is_none() {
        return Err(ApiError::bad_request(
            "callbackUrl is required for asynchronous processing",
        ));
    }

    let request_id = match correlation_ids(&record).0 {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4().to_string();
            set_request_id(&mut record, &id);
            id
        }
    };

    info!(request_id = %request_id, "Accepted job for background processing");
    let span = tracing::info_span!("async_job", request_id = %request_id);
    let jobs = state.background_jobs.clone();
    jobs.spawn(
        async move {
            let result = state.run_job(record).await;
            info!(success = result.success, callback = ?result.callback, "Background job finished");
        }
        .instrument(span),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "processing".to_string(),
            request_id,
        }),
    ))
}

fn set_request_id(record: &mut Value, id: &str) {
    let has_envelope = record.get("input").map(Value::is_object).unwrap_or(false);
    let target = if has_envelope {
        &mut record["input"]
    } else {
        record
    };
    if let Some(fields) = target.as_object_mut() {
        fields.insert("requestId".to_string(), Value::String(id.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_request_id_respects_envelope() {
        let mut wrapped = json!({ "input": { "faceBase64": "AAAA" } });
        set_request_id(&mut wrapped, "gen-1");
        assert_eq!(wrapped["input"]["requestId"], "gen-1");
        assert!(wrapped.get("requestId").is_none());

        let mut bare = json!({ "faceBase64": "AAAA" });
        set_request_id(&mut bare, "gen-2");
        assert_eq!(bare["requestId"], "gen-2");
    }
}
