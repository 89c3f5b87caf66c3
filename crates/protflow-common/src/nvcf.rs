//! NVIDIA cloud function (NVCF) client shared by the AlphaFold2, OpenFold2 and
//! ColabFold MSA adapters.
//!
//! A request either completes inline (HTTP 200) or is accepted (HTTP 202) with an
//! `nvcf-reqid` header; accepted requests are long-polled on the status endpoint
//! until it stops answering 202.

use anyhow::{bail, Context};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info};

use crate::sandbox::SandboxClient;

pub const NVCF_STATUS_URL: &str = "https://api.nvcf.nvidia.com/v2/nvcf/pexec/status";

#[derive(Clone)]
pub struct NvcfClient {
    http: SandboxClient,
    run_key: SecretString,
    poll_seconds: u32,
    max_polls: u32,
}

impl NvcfClient {
    pub fn new(http: SandboxClient, run_key: SecretString) -> Self {
        Self {
            http,
            run_key,
            poll_seconds: 10,
            max_polls: 120,
        }
    }

    /// Server-side long-poll window and the number of status polls before giving up.
    pub fn with_polling(mut self, poll_seconds: u32, max_polls: u32) -> Self {
        self.poll_seconds = poll_seconds;
        self.max_polls = max_polls.max(1);
        self
    }

    pub async fn call(&self, url: &str, body: &Value) -> anyhow::Result<Value> {
        debug!(url, "Submitting NVCF request");
        let resp = self
            .http
            .post(url)?
            .bearer_auth(self.run_key.expose_secret())
            .header("NVCF-POLL-SECONDS", self.poll_seconds.to_string())
            .json(body)
            .send()
            .await?;

        match resp.status().as_u16() {
            200 => Ok(resp.json().await?),
            202 => {
                let req_id = resp
                    .headers()
                    .get("nvcf-reqid")
                    .and_then(|v| v.to_str().ok())
                    .context("NVCF accepted the request without an nvcf-reqid header")?
                    .to_string();
                info!(req_id = %req_id, "NVCF request accepted, polling for result");
                self.poll(&req_id).await
            }
            code => {
                let text = resp.text().await.unwrap_or_default();
                bail!("NVCF request failed with status {code}: {text}")
            }
        }
    }

    async fn poll(&self, req_id: &str) -> anyhow::Result<Value> {
        let url = format!("{}/{}", NVCF_STATUS_URL, req_id);
        for attempt in 1..=self.max_polls {
            let resp = self
                .http
                .get(&url)?
                .bearer_auth(self.run_key.expose_secret())
                .header("NVCF-POLL-SECONDS", self.poll_seconds.to_string())
                .send()
                .await?;
            match resp.status().as_u16() {
                200 => return Ok(resp.json().await?),
                202 => debug!(req_id, attempt, "NVCF result not ready"),
                code => {
                    let text = resp.text().await.unwrap_or_default();
                    bail!("Error while waiting for NVCF function (status {code}): {text}")
                }
            }
        }
        bail!("NVCF request {req_id} still pending after {} polls", self.max_polls)
    }
}
