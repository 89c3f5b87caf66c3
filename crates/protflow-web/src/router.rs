//! Axum router: maps all URL paths to handlers.

use axum::routing::{get, post};
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::chat::chat;
use crate::handlers::jobs::{confirm_job, create_jobs, job_status, list_jobs};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

/// Build the full router. Files under `static_dir` are served at `/static`,
/// predicted structures at `/pdb`.
pub fn build_router(state: AppState, static_dir: &Path, structures_dir: &Path) -> Router {
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/chat",             post(chat))
        .route("/jobs",             get(list_jobs).post(create_jobs))
        .route("/confirm-job",      post(confirm_job))
        .route("/job-status/{id}",  get(job_status))

        // SSE streaming
        .route("/api/events", get(sse_handler))

        // Static files
        .nest_service("/static", ServeDir::new(static_dir))
        .nest_service("/pdb", ServeDir::new(structures_dir))

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
