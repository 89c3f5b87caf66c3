//! NCBI BLAST over the public URL API (Put, SearchInfo polling, JSON2_S fetch).

use anyhow::{bail, Context, Result};
use protflow_common::sandbox::SandboxClient;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument};

use crate::normalizer::{normalize_blast, BlastHit, BlastHsp, BlastResults};
use crate::numeric::{lenient_f64, lenient_string, lenient_u64};
use crate::schema::UnifiedSearchResult;

pub const NCBI_BLAST_URL: &str = "https://blast.ncbi.nlm.nih.gov/Blast.cgi";

fn rid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"RID = (\S+)").expect("valid regex"))
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Status=(\w+)").expect("valid regex"))
}

/// Extract the request id from the Put response page.
pub fn parse_rid(page: &str) -> Option<String> {
    rid_regex().captures(page).map(|c| c[1].to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Waiting,
    Ready,
    Failed,
    Unknown,
}

pub fn parse_status(page: &str) -> SearchStatus {
    match status_regex().captures(page).map(|c| c[1].to_string()).as_deref() {
        Some("WAITING") => SearchStatus::Waiting,
        Some("READY") => SearchStatus::Ready,
        Some("FAILED") => SearchStatus::Failed,
        _ => SearchStatus::Unknown,
    }
}

// ── JSON2_S report ────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct Json2Report {
    #[serde(default, rename = "BlastOutput2")]
    pub outputs: Vec<Json2Output>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Json2Output {
    #[serde(default)]
    pub report: Json2Inner,
}

#[derive(Debug, Default, Deserialize)]
pub struct Json2Inner {
    #[serde(default)]
    pub results: Json2Results,
}

#[derive(Debug, Default, Deserialize)]
pub struct Json2Results {
    #[serde(default)]
    pub search: Json2Search,
}

#[derive(Debug, Default, Deserialize)]
pub struct Json2Search {
    #[serde(default)]
    pub hits: Vec<Json2Hit>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Json2Hit {
    #[serde(default)]
    pub description: Vec<Json2Description>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub len: u64,
    #[serde(default)]
    pub hsps: Vec<Json2Hsp>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Json2Description {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub accession: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Json2Hsp {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bit_score: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub evalue: f64,
    /// Count of identical positions, not a percentage.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub identity: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub align_len: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub query_from: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub query_to: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub hit_from: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub hit_to: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub qseq: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hseq: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub midline: String,
}

impl Json2Report {
    /// Convert into BLAST-family hits; identity counts become percentages of the alignment length.
    pub fn into_blast_results(self) -> BlastResults {
        let hits = self
            .outputs
            .into_iter()
            .flat_map(|o| o.report.results.search.hits)
            .map(|hit| {
                let desc = hit.description.into_iter().next().unwrap_or_default();
                BlastHit {
                    id: desc.id,
                    accession: desc.accession,
                    def: desc.title,
                    len: hit.len,
                    hsps: hit
                        .hsps
                        .into_iter()
                        .map(|h| BlastHsp {
                            score: h.bit_score,
                            evalue: h.evalue,
                            identity: if h.align_len > 0 {
                                h.identity as f64 / h.align_len as f64 * 100.0
                            } else {
                                0.0
                            },
                            qseq: h.qseq,
                            hseq: h.hseq,
                            midline: h.midline,
                            query_from: h.query_from,
                            query_to: h.query_to,
                            hit_from: h.hit_from,
                            hit_to: h.hit_to,
                        })
                        .collect(),
                }
            })
            .collect();
        BlastResults { hits }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct NcbiBlastClient {
    http: SandboxClient,
    base_url: String,
    poll_interval: Duration,
    max_wait: Duration,
}

impl NcbiBlastClient {
    pub fn new(http: SandboxClient, base_url: impl Into<String>, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            poll_interval,
            max_wait,
        }
    }

    async fn submit(&self, sequence: &str) -> Result<String> {
        let page = self
            .http
            .post(&self.base_url)?
            .form(&[
                ("CMD", "Put"),
                ("PROGRAM", "blastp"),
                ("DATABASE", "nr"),
                ("QUERY", sequence),
            ])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_rid(&page).context("NCBI BLAST did not return a request id")
    }

    async fn wait_until_ready(&self, rid: &str) -> Result<()> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let page = self
                .http
                .get(&self.base_url)?
                .query(&[("CMD", "Get"), ("FORMAT_OBJECT", "SearchInfo"), ("RID", rid)])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            match parse_status(&page) {
                SearchStatus::Ready => return Ok(()),
                SearchStatus::Failed => bail!("NCBI BLAST search {rid} failed"),
                SearchStatus::Unknown => bail!("NCBI BLAST search {rid} expired or unknown"),
                SearchStatus::Waiting => debug!(rid, "NCBI BLAST still running"),
            }
            if Instant::now() + self.poll_interval > deadline {
                bail!("Timed out waiting for NCBI BLAST search {rid}");
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Submit, wait and download the hits in the BLAST-family shape.
    #[instrument(skip(self, sequence), fields(len = sequence.len()))]
    pub async fn fetch(&self, sequence: &str) -> Result<BlastResults> {
        let rid = self.submit(sequence).await?;
        info!(rid = %rid, "NCBI BLAST search submitted");
        self.wait_until_ready(&rid).await?;

        let report: Json2Report = self
            .http
            .get(&self.base_url)?
            .query(&[("CMD", "Get"), ("FORMAT_TYPE", "JSON2_S"), ("RID", rid.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(report.into_blast_results())
    }

    pub async fn search(&self, sequence: &str) -> Result<UnifiedSearchResult> {
        Ok(normalize_blast(&self.fetch(sequence).await?, sequence))
    }
}
