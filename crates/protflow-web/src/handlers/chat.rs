//! Natural-language entry point: message in, planned (unconfirmed) jobs out.

use axum::extract::{Json, State};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use super::ApiError;
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub block_id: Option<String>,
}

/// POST /chat
pub async fn chat(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required.".to_string()));
    }

    let instruction = state.parser.parse(&payload.message).await.map_err(|e| {
        error!(error = %e, "Instruction parsing failed");
        ApiError::BadRequest(format!("{e:#}"))
    })?;

    let batch = protflow_jobs::plan(&state.registry, &instruction, payload.block_id.as_deref()).await?;
    info!(jobs = batch.jobs.len(), "Chat message planned");
    Ok(Json(json!({
        "success": true,
        "explanation": batch.explanation,
        "jobs": batch.jobs,
    })))
}
