//! protflow-web: HTTP surface for the job orchestrator.
//!   - `POST /chat`, `POST /jobs`: plan job batches
//!   - `POST /confirm-job`: start a planned job
//!   - `GET /job-status/{id}`, `GET /jobs`: job views
//!   - `GET /api/events`: lifecycle events over SSE

pub mod handlers;
pub mod router;
pub mod sse;
pub mod state;
