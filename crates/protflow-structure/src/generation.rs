//! Client for the protein language model generation server.
//!
//! `POST /generate` returns a job id; `GET /status/{job_id}` is polled until the
//! server reports a terminal status.

use anyhow::{bail, Context, Result};
use protflow_common::sandbox::SandboxClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub max_new_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_model_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobHandle {
    job_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedProtein {
    pub sequence: String,
    pub model_used: Option<String>,
    pub confidence: Option<f64>,
}

impl GeneratedProtein {
    fn from_output(output: &Value) -> Option<Self> {
        let sequence = output.get("generated_sequence")?.as_str()?.trim().to_string();
        if sequence.is_empty() {
            return None;
        }
        Some(Self {
            sequence,
            model_used: output.get("model_used").and_then(Value::as_str).map(str::to_string),
            confidence: output.get("confidence").and_then(Value::as_f64),
        })
    }
}

pub struct GenerationClient {
    http: SandboxClient,
    base_url: String,
    max_new_tokens: u32,
    base_model_key: Option<String>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl GenerationClient {
    pub fn new(http: SandboxClient, base_url: impl Into<String>, max_new_tokens: u32) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_new_tokens,
            base_model_key: None,
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(300),
        }
    }

    pub fn with_model(mut self, base_model_key: impl Into<String>) -> Self {
        self.base_model_key = Some(base_model_key.into());
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    pub fn request(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: prompt.to_string(),
            max_new_tokens: self.max_new_tokens,
            base_model_key: self.base_model_key.clone(),
        }
    }

    #[instrument(skip(self))]
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedProtein> {
        let handle: JobHandle = self
            .http
            .post(&format!("{}/generate", self.base_url))?
            .json(&self.request(prompt))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("Generation server did not return a job id")?;
        info!(remote_job = %handle.job_id, "Generation job started");

        let url = format!("{}/status/{}", self.base_url, handle.job_id);
        let deadline = Instant::now() + self.max_wait;
        loop {
            let status: StatusResponse = self.http.get(&url)?.send().await?.error_for_status()?.json().await?;
            match status.status.to_ascii_uppercase().as_str() {
                "COMPLETED" => {
                    return status
                        .output
                        .as_ref()
                        .and_then(GeneratedProtein::from_output)
                        .context("Generation finished without a sequence");
                }
                "FAILED" | "CANCELLED" | "TIMED_OUT" => {
                    bail!(
                        "Generation failed: {}",
                        status.error.unwrap_or_else(|| status.status.clone())
                    );
                }
                other => debug!(status = other, "Generation still running"),
            }
            if Instant::now() + self.poll_interval > deadline {
                bail!("Timed out waiting for generation job {}", handle.job_id);
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_absent_model() {
        let client = GenerationClient::new(SandboxClient::new().unwrap(), "http://localhost:8000/", 150);
        let body = serde_json::to_value(client.request("a stable enzyme")).unwrap();
        assert_eq!(body, json!({ "prompt": "a stable enzyme", "max_new_tokens": 150 }));

        let client = client.with_model("protgpt2");
        assert_eq!(client.request("x").base_model_key.as_deref(), Some("protgpt2"));
    }

    #[test]
    fn test_output_parsing() {
        let protein = GeneratedProtein::from_output(&json!({
            "generated_sequence": " MKTAYIAK ",
            "model_used": "protgpt2",
            "confidence": 0.87
        }))
        .unwrap();
        assert_eq!(protein.sequence, "MKTAYIAK");
        assert_eq!(protein.confidence, Some(0.87));
        assert!(GeneratedProtein::from_output(&json!({ "generated_sequence": "" })).is_none());
        assert!(GeneratedProtein::from_output(&json!({})).is_none());
    }
}
