//! AlphaFold2 and OpenFold2 hosted as NVIDIA cloud functions.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use protflow_common::nvcf::NvcfClient;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::pdb::{find_pdb_text, is_valid_sequence, save_structure, StructureMetrics};
use crate::{Prediction, StructurePredictor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvcfModel {
    AlphaFold2,
    OpenFold2,
}

impl NvcfModel {
    pub fn request_body(&self, sequence: &str) -> Value {
        match self {
            NvcfModel::AlphaFold2 => json!({
                "sequence": sequence,
                "algorithm": "mmseqs2",
                "e_value": 0.0001,
                "iterations": 1,
                "databases": ["small_bfd"],
                "relax_prediction": false,
                "skip_template_search": true,
            }),
            NvcfModel::OpenFold2 => json!({
                "sequence": sequence,
                "selected_models": [1, 2, 3, 4, 5],
                "relax_prediction": false,
            }),
        }
    }
}

pub struct NvcfFoldPredictor {
    nvcf: NvcfClient,
    model: NvcfModel,
    url: String,
    output_dir: PathBuf,
}

impl NvcfFoldPredictor {
    pub fn new<P: AsRef<Path>>(nvcf: NvcfClient, model: NvcfModel, url: impl Into<String>, output_dir: P) -> Self {
        Self {
            nvcf,
            model,
            url: url.into(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl StructurePredictor for NvcfFoldPredictor {
    fn name(&self) -> &'static str {
        match self.model {
            NvcfModel::AlphaFold2 => "alphafold2",
            NvcfModel::OpenFold2 => "openfold2",
        }
    }

    #[instrument(skip(self, sequence), fields(model = self.name(), len = sequence.len()))]
    async fn predict(&self, sequence: &str) -> Result<Prediction> {
        if !is_valid_sequence(sequence) {
            bail!("Invalid protein sequence");
        }
        let response = self.nvcf.call(&self.url, &self.model.request_body(sequence)).await?;
        let pdb = find_pdb_text(&response)
            .with_context(|| format!("{} response did not contain a PDB structure", self.name()))?;

        let metrics = StructureMetrics::from_pdb(pdb);
        let pdb_file = save_structure(&self.output_dir, pdb).await?;
        info!(plddt = metrics.plddt, path = %pdb_file.display(), "Prediction saved");

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

    #[test]
    fn test_request_bodies() {
        let af2 = NvcfModel::AlphaFold2.request_body("MKV");
        assert_eq!(af2["algorithm"], "mmseqs2");
        assert_eq!(af2["databases"][0], "small_bfd");

        let of2 = NvcfModel::OpenFold2.request_body("MKV");
        assert_eq!(of2["selected_models"].as_array().unwrap().len(), 5);
        assert_eq!(of2["relax_prediction"], false);
    }
}
