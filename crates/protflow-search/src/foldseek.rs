//! Foldseek web search: ticket submission, status polling, result download.

use anyhow::{bail, Context, Result};
use protflow_common::sandbox::SandboxClient;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use crate::normalizer::{normalize_foldseek, FoldseekResults};
use crate::schema::UnifiedSearchResult;

pub const DEFAULT_DATABASES: [&str; 3] = ["afdb50", "afdb-swissprot", "pdb100"];

#[derive(Debug, Deserialize)]
struct Ticket {
    id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub struct FoldseekClient {
    http: SandboxClient,
    base_url: String,
    databases: Vec<String>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl FoldseekClient {
    pub fn new(http: SandboxClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            databases: DEFAULT_DATABASES.iter().map(|d| d.to_string()).collect(),
            poll_interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(300),
        }
    }

    pub fn with_databases(mut self, databases: Vec<String>) -> Self {
        if !databases.is_empty() {
            self.databases = databases;
        }
        self
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    async fn submit(&self, pdb: Vec<u8>) -> Result<String> {
        let mut form = Form::new()
            .part("q", Part::bytes(pdb).file_name("query.pdb"))
            .text("mode", "3diaa");
        for db in &self.databases {
            form = form.text("database[]", db.clone());
        }

        let ticket: Ticket = self
            .http
            .post(&format!("{}/ticket", self.base_url))?
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        ticket.id.context("Failed to get ticket ID.")
    }

    async fn wait_for_completion(&self, ticket_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.max_wait;
        let url = format!("{}/ticket/{}", self.base_url, ticket_id);
        loop {
            let ticket: Ticket = self.http.get(&url)?.send().await?.error_for_status()?.json().await?;
            match ticket.status.as_deref() {
                Some("COMPLETE") => return Ok(()),
                Some("RUNNING") | Some("PENDING") => debug!(ticket_id, "Foldseek search running"),
                other => bail!("Unexpected status: {}", other.unwrap_or("none")),
            }
            if Instant::now() + self.poll_interval > deadline {
                bail!("Timeout waiting for results.");
            }
            sleep(self.poll_interval).await;
        }
    }

    #[instrument(skip(self), fields(pdb = %pdb_file.display()))]
    pub async fn fetch(&self, pdb_file: &Path) -> Result<FoldseekResults> {
        let pdb = tokio::fs::read(pdb_file)
            .await
            .with_context(|| format!("PDB file not found: {}", pdb_file.display()))?;

        let ticket_id = self.submit(pdb).await?;
        info!(ticket_id = %ticket_id, "Foldseek ticket submitted");
        self.wait_for_completion(&ticket_id).await?;

        let raw: FoldseekResults = self
            .http
            .get(&format!("{}/result/{}/0", self.base_url, ticket_id))?
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(raw)
    }

    pub async fn search(&self, pdb_file: &Path) -> Result<UnifiedSearchResult> {
        Ok(normalize_foldseek(&self.fetch(pdb_file).await?, ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_defaults_for_empty_list() {
        let client = FoldseekClient::new(SandboxClient::new().unwrap(), "https://search.foldseek.com/api/")
            .with_databases(Vec::new());
        assert_eq!(client.base_url, "https://search.foldseek.com/api");
        assert_eq!(client.databases, vec!["afdb50", "afdb-swissprot", "pdb100"]);
    }

    #[tokio::test]
    async fn test_missing_pdb_file() {
        let client = FoldseekClient::new(SandboxClient::new().unwrap(), "https://search.foldseek.com/api");
        let err = client.search(Path::new("/nonexistent/query.pdb")).await.unwrap_err();
        assert!(err.to_string().contains("PDB file not found"));
    }
}
