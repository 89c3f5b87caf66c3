//! Job planning, confirmation and status.

use axum::extract::{Json, Path, State};
use protflow_common::instruction::ParsedInstruction;
use protflow_jobs::JobView;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct CreateJobsRequest {
    #[serde(flatten)]
    pub instruction: ParsedInstruction,
    #[serde(default)]
    pub block_id: Option<String>,
}

/// POST /jobs: plan a batch from an already-parsed instruction.
pub async fn create_jobs(
    State(state): State<SharedState>,
    Json(payload): Json<CreateJobsRequest>,
) -> Result<Json<Value>, ApiError> {
    let batch = protflow_jobs::plan(&state.registry, &payload.instruction, payload.block_id.as_deref()).await?;
    Ok(Json(json!({
        "success": true,
        "explanation": batch.explanation,
        "jobs": batch.jobs,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmJobRequest {
    #[serde(default)]
    pub job_id: Option<String>,
}

/// POST /confirm-job: queue the job and start it in the background.
pub async fn confirm_job(
    State(state): State<SharedState>,
    Json(payload): Json<ConfirmJobRequest>,
) -> Result<Json<Value>, ApiError> {
    let job_id = payload
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Job ID is required.".to_string()))?;
    if state.registry.get_job(&job_id).await.is_none() {
        return Err(ApiError::NotFound("Job not found.".to_string()));
    }

    // The handle is dropped; progress is observed through /job-status and /api/events.
    state.executor.submit(&job_id).await?;
    info!(job_id = %job_id, "Job confirmed");

    let job = state
        .registry
        .get_job(&job_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Job not found.".to_string()))?;
    Ok(Json(json!({ "success": true, "job": job.view() })))
}

/// GET /job-status/{id}
pub async fn job_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<JobView>, ApiError> {
    state
        .registry
        .get_job(&id)
        .await
        .map(|job| Json(job.view()))
        .ok_or_else(|| ApiError::NotFound("Job not found.".to_string()))
}

/// GET /jobs
pub async fn list_jobs(State(state): State<SharedState>) -> Json<Value> {
    let jobs = state.registry.get_all_jobs().await;
    Json(json!({ "success": true, "jobs": jobs }))
}
