//! HTTP surface against an in-memory registry, a canned parser and a stub adapter.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use protflow_common::instruction::{FunctionCall, InstructionParser, ParsedInstruction};
use protflow_common::outcome::{Parameters, ToolOutcome};
use protflow_config::ExecutorConfig;
use protflow_jobs::{AdapterKey, AdapterRegistry, Dispatcher, JobExecutor, JobRegistry, JobStatus, ToolAdapter};
use protflow_web::router::build_router;
use protflow_web::state::AppState;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tower::ServiceExt;

struct CannedParser;

#[async_trait]
impl InstructionParser for CannedParser {
    async fn parse(&self, text: &str) -> anyhow::Result<ParsedInstruction> {
        if text.contains("nonsense") {
            anyhow::bail!("Unknown operation: dance");
        }
        Ok(ParsedInstruction {
            functions: vec![
                FunctionCall {
                    name: "generate_protein".to_string(),
                    parameters: json!({ "prompt": text }).as_object().cloned().unwrap(),
                },
                FunctionCall {
                    name: "predict_structure".to_string(),
                    parameters: json!({ "model_type": "esmfold_predict" }).as_object().cloned().unwrap(),
                },
            ],
            explanation: "Generate a protein, then predict its structure.".to_string(),
        })
    }
}

struct StubGenerator;

#[async_trait]
impl ToolAdapter for StubGenerator {
    fn key(&self) -> AdapterKey {
        AdapterKey::GenerateProtein
    }

    async fn execute(&self, _params: &Parameters) -> anyhow::Result<ToolOutcome> {
        Ok(ToolOutcome::success(json!({ "sequence": "ACDEFG" })))
    }
}

fn app() -> (Router, Arc<JobRegistry>) {
    let mut adapters = AdapterRegistry::new();
    adapters.register(StubGenerator);
    let registry = Arc::new(JobRegistry::new());
    let executor = JobExecutor::new(
        Arc::clone(&registry),
        Arc::new(Dispatcher::new(adapters)),
        &ExecutorConfig::default(),
    );
    let state = AppState::new(executor, Arc::new(CannedParser));
    (build_router(state, Path::new("static"), Path::new("static/pdb_files")), registry)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn chat_plans_linked_jobs() {
    let (app, registry) = app();
    let (status, body) = send(&app, "POST", "/chat", Some(json!({ "message": "a GFP variant" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["explanation"], "Generate a protein, then predict its structure.");
    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["status"], "pending");
    assert_eq!(jobs[0]["function_name"], "generate_protein");
    assert_eq!(jobs[1]["depends_on"], jobs[0]["id"]);
    assert_eq!(registry.len().await, 2);
}

#[tokio::test]
async fn chat_parse_failure_is_reported() {
    let (app, registry) = app();
    let (status, body) = send(&app, "POST", "/chat", Some(json!({ "message": "nonsense" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Unknown operation"));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn create_jobs_rejects_unknown_operation() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        "POST",
        "/jobs",
        Some(json!({ "functions": [{ "name": "fold_origami" }], "explanation": "" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unknown operation: fold_origami");
}

#[tokio::test]
async fn confirm_runs_job_to_completion() {
    let (app, registry) = app();
    let (_, planned) = send(
        &app,
        "POST",
        "/jobs",
        Some(json!({ "functions": [{ "name": "generate_protein", "parameters": { "prompt": "x" } }] })),
    )
    .await;
    let job_id = planned["jobs"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/confirm-job", Some(json!({ "job_id": job_id }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let done = registry.wait_for_terminal(&job_id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    let (status, view) = send(&app, "GET", &format!("/job-status/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "completed");
    assert_eq!(view["result"], json!({ "success": true, "sequence": "ACDEFG" }));

    let (status, _) = send(&app, "POST", "/confirm-job", Some(json!({ "job_id": job_id }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_jobs_are_404() {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/job-status/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Job not found.");

    let (status, _) = send(&app, "POST", "/confirm-job", Some(json!({ "job_id": "nope" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "POST", "/confirm-job", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Job ID is required.");
}

#[tokio::test]
async fn list_jobs_returns_every_job() {
    let (app, _) = app();
    send(&app, "POST", "/chat", Some(json!({ "message": "two jobs" }))).await;
    let (status, body) = send(&app, "GET", "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 2);
}
