//! Turn a parsed instruction into a batch of linked PENDING jobs.

use protflow_common::error::{ProtflowError, Result};
use protflow_common::instruction::ParsedInstruction;
use protflow_common::outcome::{param_str, Parameters};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::dependency::resolve_edges;
use crate::job::JobView;
use crate::operation::{Operation, SimilarityBackend, StructureModel};
use crate::registry::{JobRegistry, NewJob};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedBatch {
    pub explanation: String,
    pub jobs: Vec<JobView>,
}

/// Create one job per function call, in order, and link each to its nearest
/// preceding predecessor. Nothing is created if any tag is unknown.
#[instrument(skip_all, fields(functions = instruction.functions.len()))]
pub async fn plan(
    registry: &JobRegistry,
    instruction: &ParsedInstruction,
    block_id: Option<&str>,
) -> Result<PlannedBatch> {
    let ops = instruction
        .functions
        .iter()
        .map(|call| call.name.parse::<Operation>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(ProtflowError::Validation)?;
    let edges = resolve_edges(&ops);

    let mut created: Vec<JobView> = Vec::with_capacity(ops.len());
    for ((call, op), edge) in instruction.functions.iter().zip(&ops).zip(&edges) {
        let mut new = NewJob::new(*op, call.parameters.clone())
            .description(describe(*op, &call.parameters));
        if let Some(pred) = edge {
            new = new.depends_on(created[*pred].id.clone());
        }
        if let Some(block) = block_id {
            new = new.block_id(block);
        }
        created.push(registry.create(new).await.view());
    }

    info!(jobs = created.len(), "Planned job batch");
    Ok(PlannedBatch {
        explanation: instruction.explanation.clone(),
        jobs: created,
    })
}

/// One-paragraph summary shown on the job card.
pub fn describe(op: Operation, params: &Parameters) -> String {
    match op {
        Operation::GenerateProtein => {
            format!("Target: {}", param_str(params, "prompt").unwrap_or_default())
        }
        Operation::PredictStructure => {
            let length = param_str(params, "sequence")
                .map(|s| s.len().to_string())
                .unwrap_or_else(|| "N/A".to_string());
            let model = match StructureModel::from_params(params) {
                Ok(model) => model.as_str().to_string(),
                _ => "To be selected".to_string(),
            };
            format!(
                "Sequence length: {length} amino acids\nModel: {model}\nOutput: 3D structure prediction in PDB format"
            )
        }
        Operation::SearchStructure => "Search for similar structures in the database".to_string(),
        Operation::EvaluateStructure => "Evaluate the 3D structure quality and properties".to_string(),
        Operation::SearchSimilarity => match SimilarityBackend::from_params(params) {
            Ok(SimilarityBackend::Colabfold) => "Search for similar protein sequences using ColabFold MSA".to_string(),
            Ok(SimilarityBackend::LocalBlast) => "Run a BLAST search against a local database".to_string(),
            Ok(SimilarityBackend::NcbiBlast) => {
                "Run a BLAST search on NCBI server in the nr database to find similar sequences".to_string()
            }
            Err(_) => "Search for similar protein sequences (search type to be selected)".to_string(),
        },
        Operation::BuildDatabase => "Build a BLAST database from a FASTA file or Pfam families".to_string(),
        Operation::PerformDocking => "Dock a ligand into the receptor structure with AutoDock Vina".to_string(),
        Operation::FileUpload => "Use an uploaded file as pipeline input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protflow_common::instruction::FunctionCall;
    use serde_json::json;

    fn call(name: &str, params: serde_json::Value) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            parameters: params.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn test_plan_links_nearest_predecessor() {
        let registry = JobRegistry::new();
        let instruction = ParsedInstruction {
            functions: vec![
                call("generate_protein", json!({ "prompt": "binder" })),
                call("predict_structure", json!({ "model_type": "esmfold_predict" })),
                call("search_structure", json!({})),
            ],
            explanation: "Generate, fold, search".to_string(),
        };

        let batch = plan(&registry, &instruction, Some("block-1")).await.unwrap();
        assert_eq!(batch.explanation, "Generate, fold, search");
        assert_eq!(batch.jobs.len(), 3);
        assert_eq!(batch.jobs[0].depends_on, None);
        assert_eq!(batch.jobs[1].depends_on.as_deref(), Some(batch.jobs[0].id.as_str()));
        assert_eq!(batch.jobs[2].depends_on.as_deref(), Some(batch.jobs[1].id.as_str()));
        assert!(batch.jobs.iter().all(|j| j.block_id.as_deref() == Some("block-1")));
        assert_eq!(batch.jobs[0].title, "Generate Protein Sequence");
        assert_eq!(batch.jobs[0].description, "Target: binder");
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn test_unknown_tag_creates_nothing() {
        let registry = JobRegistry::new();
        let instruction = ParsedInstruction {
            functions: vec![call("generate_protein", json!({})), call("fold_it", json!({}))],
            explanation: String::new(),
        };

        let err = plan(&registry, &instruction, None).await.unwrap_err();
        assert!(err.to_string().contains("Unknown operation: fold_it"));
        assert!(registry.is_empty().await);
    }

    #[test]
    fn test_describe_prediction() {
        let params = json!({ "sequence": "MKV", "model_type": "alphafold2_predict" });
        let text = describe(Operation::PredictStructure, params.as_object().unwrap());
        assert!(text.starts_with("Sequence length: 3 amino acids\nModel: alphafold2"));
        let text = describe(Operation::PredictStructure, &Parameters::new());
        assert!(text.contains("N/A") && text.contains("To be selected"));
    }
}
