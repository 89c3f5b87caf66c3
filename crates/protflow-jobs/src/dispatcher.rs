//! Routes a job to its adapter, short-circuiting invalid requests.
//!
//! The dispatcher never returns an error: every problem becomes a
//! [`ToolOutcome::Failure`] carrying a message for the job record.

use protflow_common::outcome::{param_f64, param_str, Parameters, ToolOutcome};
use protflow_search::normalizer::normalize_value;
use protflow_search::SearchType;
use protflow_structure::is_valid_sequence;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::adapter::{AdapterKey, AdapterRegistry};
use crate::job::Job;
use crate::operation::{Operation, SimilarityBackend};

pub const NO_DATABASE: &str = "No database provided. Please connect a BLAST Database Builder block.";

const DOCKING_BOX: [&str; 6] = ["center_x", "center_y", "center_z", "size_x", "size_y", "size_z"];

pub struct Dispatcher {
    adapters: AdapterRegistry,
}

impl Dispatcher {
    pub fn new(adapters: AdapterRegistry) -> Self {
        Self { adapters }
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    #[instrument(skip_all, fields(job_id = %job.id, op = %job.function_name))]
    pub async fn execute_job(&self, job: &Job) -> ToolOutcome {
        self.dispatch(job.function_name, &job.parameters).await
    }

    pub async fn dispatch(&self, op: Operation, params: &Parameters) -> ToolOutcome {
        let key = match AdapterKey::resolve(op, params) {
            Ok(key) => key,
            Err(msg) => return ToolOutcome::failure(msg),
        };
        let params = match prepare(key, params) {
            Ok(params) => params,
            Err(msg) => {
                debug!(adapter = %key, reason = %msg, "Rejected before adapter call");
                return ToolOutcome::failure(msg);
            }
        };
        let Some(adapter) = self.adapters.get(key) else {
            return ToolOutcome::failure(format!("No adapter available for {key}"));
        };
        if let Err(msg) = adapter.validate(&params) {
            return ToolOutcome::failure(msg);
        }

        match adapter.execute(&params).await {
            Ok(outcome) => match key.search_type() {
                Some(search_type) => normalize_search_outcome(search_type, outcome, &params),
                None => outcome,
            },
            Err(e) => {
                warn!(adapter = %key, error = %e, "Adapter failed");
                ToolOutcome::failure(format!("{e:#}"))
            }
        }
    }
}

/// Operation-level validation and parameter normalization.
fn prepare(key: AdapterKey, params: &Parameters) -> Result<Parameters, String> {
    let mut params = params.clone();
    match key {
        AdapterKey::GenerateProtein => {
            param_str(&params, "prompt").ok_or("No prompt provided")?;
        }
        AdapterKey::Predict(_) => {
            let sequence = param_str(&params, "sequence").ok_or("No sequence provided")?;
            if !is_valid_sequence(sequence) {
                return Err("Invalid protein sequence".to_string());
            }
        }
        AdapterKey::Similarity(backend) => {
            param_str(&params, "sequence").ok_or("No sequence provided")?;
            if backend == SimilarityBackend::LocalBlast {
                let database = unwrap_database(params.get("database")).ok_or(NO_DATABASE)?;
                params.insert("database".to_string(), database);
            }
        }
        AdapterKey::Foldseek => {
            param_str(&params, "pdb_file").ok_or("No PDB file provided")?;
        }
        AdapterKey::UsAlign => {
            if param_str(&params, "pdb_file1").is_none() {
                if let Some(chained) = params.get("pdb_file").cloned() {
                    params.insert("pdb_file1".to_string(), chained);
                }
            }
            if param_str(&params, "pdb_file1").is_none() || param_str(&params, "pdb_file2").is_none() {
                return Err("No PDB file provided".to_string());
            }
        }
        AdapterKey::BuildDatabase => {
            let has_fasta = param_str(&params, "fasta_file").is_some();
            let has_pfam = !pfam_ids(&params).is_empty();
            if !has_fasta && !has_pfam {
                return Err("Provide a FASTA file or Pfam IDs to build a database".to_string());
            }
        }
        AdapterKey::Docking => {
            let molecule = params
                .get("molecule")
                .and_then(|m| m.get("molecule_file"))
                .and_then(Value::as_str)
                .or_else(|| param_str(&params, "molecule_file"))
                .map(str::to_string);
            let complete = param_str(&params, "pdb_file").is_some()
                && molecule.is_some()
                && DOCKING_BOX.iter().all(|k| param_f64(&params, k).is_some());
            match molecule {
                Some(file) if complete => {
                    params.insert("molecule_file".to_string(), Value::String(file));
                }
                _ => return Err("Missing required docking parameters".to_string()),
            }
        }
        AdapterKey::FileUpload => {
            if param_str(&params, "filePath").is_none() || param_str(&params, "outputType").is_none() {
                return Err("Missing file path or output type".to_string());
            }
        }
    }
    Ok(params)
}

/// Accepts `{path}`, the builder's `{database: {path, name}}` output, or a bare path.
fn unwrap_database(value: Option<&Value>) -> Option<Value> {
    let mut value = value?;
    if let Some(inner) = value.get("database") {
        value = inner;
    }
    match value {
        Value::String(path) if !path.trim().is_empty() => Some(json!({ "path": path.trim() })),
        Value::Object(map) => {
            let path = map.get("path").and_then(Value::as_str).filter(|p| !p.trim().is_empty())?;
            let mut db = map.clone();
            db.insert("path".to_string(), Value::String(path.trim().to_string()));
            Some(Value::Object(db))
        }
        _ => None,
    }
}

/// `pfam_ids` as a list or a comma-separated string.
pub fn pfam_ids(params: &Parameters) -> Vec<String> {
    match params.get("pfam_ids") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Replace `raw_results` with the unified search result under `results`.
fn normalize_search_outcome(search_type: SearchType, outcome: ToolOutcome, params: &Parameters) -> ToolOutcome {
    let ToolOutcome::Success(mut payload) = outcome else {
        return outcome;
    };
    let Some(raw) = payload.remove("raw_results") else {
        return ToolOutcome::Success(payload);
    };
    let query = payload
        .get("query")
        .and_then(Value::as_str)
        .or_else(|| param_str(params, "sequence"))
        .unwrap_or_default()
        .to_string();

    match normalize_value(search_type, raw, &query) {
        Ok(unified) => {
            let stats = unified.identity_stats();
            let mut out = Map::with_capacity(payload.len() + 2);
            out.extend(payload);
            match serde_json::to_value(&unified) {
                Ok(results) => {
                    out.insert("results".to_string(), results);
                }
                Err(e) => return ToolOutcome::failure(format!("Failed to encode search results: {e}")),
            }
            if !out.contains_key("statistics") {
                if let Some(stats) = stats.and_then(|s| serde_json::to_value(s).ok()) {
                    out.insert("statistics".to_string(), stats);
                }
            }
            ToolOutcome::Success(out)
        }
        Err(e) => ToolOutcome::failure(format!("Failed to normalize {} results: {e}", search_type.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unwrap_database_shapes() {
        let nested = json!({ "database": { "path": "/db/custom_db", "name": "custom_db" } });
        assert_eq!(unwrap_database(Some(&nested)).unwrap()["path"], "/db/custom_db");
        assert_eq!(unwrap_database(Some(&json!("/db/x"))).unwrap(), json!({ "path": "/db/x" }));
        assert!(unwrap_database(Some(&json!({ "name": "no path" }))).is_none());
        assert!(unwrap_database(Some(&json!({ "database": {} }))).is_none());
        assert!(unwrap_database(None).is_none());
    }

    #[test]
    fn test_local_blast_requires_database() {
        let key = AdapterKey::Similarity(SimilarityBackend::LocalBlast);
        let err = prepare(key, &params(json!({ "sequence": "MKV" }))).unwrap_err();
        assert_eq!(err, NO_DATABASE);

        let ok = prepare(
            key,
            &params(json!({ "sequence": "MKV", "database": { "database": { "path": "/db/p" } } })),
        )
        .unwrap();
        assert_eq!(ok["database"]["path"], "/db/p");
    }

    #[test]
    fn test_evaluation_falls_back_to_chained_pdb() {
        let ok = prepare(AdapterKey::UsAlign, &params(json!({ "pdb_file": "a.pdb", "pdb_file2": "b.pdb" }))).unwrap();
        assert_eq!(ok["pdb_file1"], "a.pdb");
        let err = prepare(AdapterKey::UsAlign, &params(json!({ "pdb_file": "a.pdb" }))).unwrap_err();
        assert_eq!(err, "No PDB file provided");
    }

    #[test]
    fn test_docking_requires_box_and_inputs() {
        let full = json!({
            "pdb_file": "r.pdb",
            "molecule": { "molecule_file": "l.sdf" },
            "center_x": 1, "center_y": "2", "center_z": 3,
            "size_x": 20, "size_y": 20, "size_z": 20
        });
        let ok = prepare(AdapterKey::Docking, &params(full.clone())).unwrap();
        assert_eq!(ok["molecule_file"], "l.sdf");

        let mut partial = full;
        partial.as_object_mut().unwrap().remove("size_z");
        assert_eq!(
            prepare(AdapterKey::Docking, &params(partial)).unwrap_err(),
            "Missing required docking parameters"
        );
    }

    #[test]
    fn test_prediction_sequence_checks() {
        let key = AdapterKey::Predict(crate::operation::StructureModel::Esmfold);
        assert_eq!(prepare(key, &Parameters::new()).unwrap_err(), "No sequence provided");
        assert_eq!(
            prepare(key, &params(json!({ "sequence": "MK1" }))).unwrap_err(),
            "Invalid protein sequence"
        );
    }

    #[test]
    fn test_pfam_ids_forms() {
        assert_eq!(pfam_ids(&params(json!({ "pfam_ids": "PF00001, PF00002" }))), vec!["PF00001", "PF00002"]);
        assert_eq!(pfam_ids(&params(json!({ "pfam_ids": ["PF1", ""] }))), vec!["PF1"]);
        assert!(pfam_ids(&Parameters::new()).is_empty());
    }

    #[test]
    fn test_normalize_search_outcome() {
        let outcome = ToolOutcome::success(json!({
            "raw_results": { "hits": [{ "id": "h1", "hsps": [{ "identity": "77.5" }] }] },
            "query": "MKV"
        }));
        let normalized = normalize_search_outcome(SearchType::Blast, outcome, &Parameters::new());
        let value = normalized.to_value();
        assert_eq!(value["success"], true);
        assert!(value.get("raw_results").is_none());
        assert_eq!(value["results"]["metadata"]["search_type"], "blast");
        assert_eq!(value["results"]["alignments"]["databases"]["blast"]["hits"][0]["identity"], 77.5);
        assert_eq!(value["statistics"]["total_hits"], 1);

        let bad = ToolOutcome::success(json!({ "raw_results": { "hits": 3 } }));
        assert!(!normalize_search_outcome(SearchType::Blast, bad, &Parameters::new()).is_success());
    }
}
