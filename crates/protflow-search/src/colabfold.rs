//! ColabFold MSA search on NVIDIA cloud functions.

use anyhow::Result;
use protflow_common::nvcf::NvcfClient;
use serde::Serialize;
use tracing::{info, instrument};

use crate::normalizer::{normalize_colabfold, ColabFoldResults};
use crate::schema::UnifiedSearchResult;

pub const DEFAULT_DATABASE: &str = "Uniref30_2302";

#[derive(Debug, Clone, Serialize)]
pub struct MsaSearchRequest {
    pub sequence: String,
    pub e_value: f64,
    pub iterations: u32,
    pub databases: Vec<String>,
    pub output_alignment_formats: Vec<String>,
}

impl MsaSearchRequest {
    pub fn new(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            e_value: 1e-4,
            iterations: 1,
            databases: vec![DEFAULT_DATABASE.to_string()],
            output_alignment_formats: vec!["fasta".to_string()],
        }
    }
}

pub struct ColabFoldSearcher {
    nvcf: NvcfClient,
    url: String,
}

impl ColabFoldSearcher {
    pub fn new(nvcf: NvcfClient, url: impl Into<String>) -> Self {
        Self { nvcf, url: url.into() }
    }

    #[instrument(skip(self, sequence), fields(len = sequence.len()))]
    pub async fn fetch(&self, sequence: &str) -> Result<ColabFoldResults> {
        let request = serde_json::to_value(MsaSearchRequest::new(sequence))?;
        let response = self.nvcf.call(&self.url, &request).await?;
        let raw: ColabFoldResults = serde_json::from_value(response)?;
        info!(databases = raw.alignments.len(), "ColabFold MSA search finished");
        Ok(raw)
    }

    pub async fn search(&self, sequence: &str) -> Result<UnifiedSearchResult> {
        Ok(normalize_colabfold(&self.fetch(sequence).await?, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let value = serde_json::to_value(MsaSearchRequest::new("MKV")).unwrap();
        assert_eq!(value["databases"][0], "Uniref30_2302");
        assert_eq!(value["e_value"], 1e-4);
        assert_eq!(value["iterations"], 1);
        assert_eq!(value["output_alignment_formats"][0], "fasta");
    }
}
