//! The closed set of operations and their backend sub-selectors.

use protflow_common::outcome::{param_str, Parameters};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation tag of a job (`function_name` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    GenerateProtein,
    PredictStructure,
    SearchStructure,
    EvaluateStructure,
    SearchSimilarity,
    BuildDatabase,
    PerformDocking,
    FileUpload,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::GenerateProtein,
        Operation::PredictStructure,
        Operation::SearchStructure,
        Operation::EvaluateStructure,
        Operation::SearchSimilarity,
        Operation::BuildDatabase,
        Operation::PerformDocking,
        Operation::FileUpload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::GenerateProtein => "generate_protein",
            Operation::PredictStructure => "predict_structure",
            Operation::SearchStructure => "search_structure",
            Operation::EvaluateStructure => "evaluate_structure",
            Operation::SearchSimilarity => "search_similarity",
            Operation::BuildDatabase => "build_database",
            Operation::PerformDocking => "perform_docking",
            Operation::FileUpload => "file_upload",
        }
    }

    /// Human-readable job title.
    pub fn title(&self) -> &'static str {
        match self {
            Operation::GenerateProtein => "Generate Protein Sequence",
            Operation::PredictStructure => "Predict 3D Structure",
            Operation::SearchStructure => "Search Similar Structures",
            Operation::EvaluateStructure => "Evaluate Structure",
            Operation::SearchSimilarity => "Search Similar Sequences",
            Operation::BuildDatabase => "Build BLAST Database",
            Operation::PerformDocking => "Molecular Docking",
            Operation::FileUpload => "File Upload",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("Unknown operation: {s}"))
    }
}

// ── Backend selectors ─────────────────────────────────────────────────────────

/// `model_type` for `predict_structure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureModel {
    Esmfold,
    Alphafold2,
    Openfold,
}

impl StructureModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StructureModel::Esmfold => "esmfold_predict",
            StructureModel::Alphafold2 => "alphafold2_predict",
            StructureModel::Openfold => "openfold_predict",
        }
    }

    /// Reads `model_type`. There is no implicit backend: a missing value is an error.
    pub fn from_params(params: &Parameters) -> Result<Self, String> {
        match param_str(params, "model_type") {
            Some(tag) => tag.parse(),
            None => Err(
                "No model selected: set model_type to esmfold_predict, alphafold2_predict or openfold_predict"
                    .to_string(),
            ),
        }
    }
}

impl FromStr for StructureModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "esmfold_predict" => Ok(StructureModel::Esmfold),
            "alphafold2_predict" => Ok(StructureModel::Alphafold2),
            "openfold_predict" => Ok(StructureModel::Openfold),
            other => Err(format!("Unknown model: {other}")),
        }
    }
}

impl fmt::Display for StructureModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `model_type` for `search_similarity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimilarityBackend {
    NcbiBlast,
    Colabfold,
    LocalBlast,
}

impl SimilarityBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityBackend::NcbiBlast => "ncbi_blast_search",
            SimilarityBackend::Colabfold => "colabfold_search",
            SimilarityBackend::LocalBlast => "local_blast_search",
        }
    }

    pub fn from_params(params: &Parameters) -> Result<Self, String> {
        match param_str(params, "model_type") {
            Some(tag) => tag.parse(),
            None => Err(
                "No search type selected: set model_type to ncbi_blast_search, colabfold_search or local_blast_search"
                    .to_string(),
            ),
        }
    }
}

impl FromStr for SimilarityBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ncbi_blast_search" => Ok(SimilarityBackend::NcbiBlast),
            "colabfold_search" => Ok(SimilarityBackend::Colabfold),
            "local_blast_search" => Ok(SimilarityBackend::LocalBlast),
            other => Err(format!("Unknown search type: {other}")),
        }
    }
}

impl fmt::Display for SimilarityBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_operation_tags_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>(), Ok(op));
            assert_eq!(serde_json::to_value(op).unwrap(), json!(op.as_str()));
        }
        assert_eq!("fold_protein".parse::<Operation>().unwrap_err(), "Unknown operation: fold_protein");
    }

    #[test]
    fn test_structure_model_selection() {
        let missing = StructureModel::from_params(&params(json!({}))).unwrap_err();
        assert!(missing.starts_with("No model selected"));
        assert!(StructureModel::from_params(&params(json!({ "model_type": "  " }))).is_err());
        assert_eq!(
            StructureModel::from_params(&params(json!({ "model_type": "esmfold_predict" }))),
            Ok(StructureModel::Esmfold)
        );
        assert_eq!(
            StructureModel::from_params(&params(json!({ "model_type": "rosetta" }))),
            Err("Unknown model: rosetta".to_string())
        );
    }

    #[test]
    fn test_similarity_backend_selection() {
        let missing = SimilarityBackend::from_params(&params(json!({}))).unwrap_err();
        assert!(missing.starts_with("No search type selected"));
        assert_eq!(
            SimilarityBackend::from_params(&params(json!({ "model_type": "local_blast_search" }))),
            Ok(SimilarityBackend::LocalBlast)
        );
        assert_eq!(
            SimilarityBackend::from_params(&params(json!({ "model_type": "hmmer" }))),
            Err("Unknown search type: hmmer".to_string())
        );
    }
}
