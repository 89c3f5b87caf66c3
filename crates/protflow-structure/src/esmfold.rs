//! ESMFold through the ESM Atlas fold endpoint.

use anyhow::{bail, Result};
use async_trait::async_trait;
use protflow_common::sandbox::SandboxClient;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::pdb::{is_valid_sequence, save_structure, StructureMetrics};
use crate::{Prediction, StructurePredictor};

pub struct EsmFoldPredictor {
    http: SandboxClient,
    url: String,
    output_dir: PathBuf,
}

impl EsmFoldPredictor {
    pub fn new<P: AsRef<Path>>(http: SandboxClient, url: impl Into<String>, output_dir: P) -> Self {
        Self {
            http,
            url: url.into(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl StructurePredictor for EsmFoldPredictor {
    fn name(&self) -> &'static str {
        "esmfold"
    }

    #[instrument(skip(self, sequence), fields(len = sequence.len()))]
    async fn predict(&self, sequence: &str) -> Result<Prediction> {
        if !is_valid_sequence(sequence) {
            bail!("Invalid protein sequence");
        }

        let resp = self
            .http
            .post(&self.url)?
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(sequence.to_string())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("API request failed with status code {}", status.as_u16());
        }
        let pdb = resp.text().await?;

        let metrics = StructureMetrics::from_pdb(&pdb);
        let pdb_file = save_structure(&self.output_dir, &pdb).await?;
        info!(plddt = metrics.plddt, path = %pdb_file.display(), "ESMFold prediction saved");

        Ok(Prediction {
            pdb_file,
            metrics,
            sequence: sequence.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_invalid_sequence_rejected_before_request() {
        let dir = tempdir().unwrap();
        let predictor = EsmFoldPredictor::new(
            SandboxClient::new().unwrap(),
            "https://api.esmatlas.com/foldSequence/v1/pdb/",
            dir.path(),
        );
        let err = predictor.predict("MKT*Z").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid protein sequence");
    }

    #[tokio::test]
    #[ignore] // requires network access
    async fn test_predict_small_peptide() {
        let dir = tempdir().unwrap();
        let predictor = EsmFoldPredictor::new(
            SandboxClient::new().unwrap(),
            "https://api.esmatlas.com/foldSequence/v1/pdb/",
            dir.path(),
        );
        let prediction = predictor.predict("GSHMKTAYIAKQRQISFVKSHFSRQ").await.unwrap();
        assert!(prediction.pdb_file.exists());
        assert!(prediction.metrics.plddt > 0.0);
    }
}
