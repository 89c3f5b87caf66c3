//! Data-flow dependencies between jobs of one batch.
//!
//! Edges are inferred once, at planning time, from a fixed predecessor table using
//! a nearest-preceding-match rule. At execution time the predecessor's result is
//! projected onto the dependent's parameters through a per-operation output table.

use protflow_common::outcome::Parameters;
use serde_json::Value;

use crate::operation::Operation;

/// The operation whose output `op` consumes, if any.
pub fn dependency_for(op: Operation) -> Option<Operation> {
    match op {
        Operation::PredictStructure => Some(Operation::GenerateProtein),
        Operation::SearchStructure => Some(Operation::PredictStructure),
        Operation::EvaluateStructure => Some(Operation::PredictStructure),
        Operation::SearchSimilarity => Some(Operation::GenerateProtein),
        _ => None,
    }
}

/// Result fields of `op` that flow into same-named parameters of its dependents.
pub fn output_fields(op: Operation) -> &'static [&'static str] {
    match op {
        Operation::GenerateProtein => &["sequence"],
        Operation::PredictStructure => &["pdb_file", "sequence"],
        _ => &[],
    }
}

/// For each position, the index of the nearest earlier job of the required
/// predecessor type.
pub fn resolve_edges(ops: &[Operation]) -> Vec<Option<usize>> {
    ops.iter()
        .enumerate()
        .map(|(i, op)| {
            let wanted = dependency_for(*op)?;
            ops[..i].iter().rposition(|prev| *prev == wanted)
        })
        .collect()
}

/// Overwrite the parameters named in the predecessor's output table with the
/// values found in its result. Other keys are left alone; nothing is removed.
pub fn chain_parameters(predecessor: Operation, predecessor_result: &Value, params: &Parameters) -> Parameters {
    let mut chained = params.clone();
    for field in output_fields(predecessor) {
        if let Some(value) = predecessor_result.get(*field) {
            chained.insert((*field).to_string(), value.clone());
        }
    }
    chained
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use Operation::*;

    #[test]
    fn test_linear_chain() {
        let ops = [GenerateProtein, PredictStructure, SearchStructure];
        assert_eq!(resolve_edges(&ops), vec![None, Some(0), Some(1)]);
        assert_eq!(resolve_edges(&ops), resolve_edges(&ops));
    }

    #[test]
    fn test_nearest_predecessor_wins() {
        let ops = [GenerateProtein, PredictStructure, GenerateProtein, PredictStructure];
        assert_eq!(resolve_edges(&ops), vec![None, Some(0), None, Some(2)]);
    }

    #[test]
    fn test_missing_predecessor_and_fan_out() {
        let ops = [PredictStructure, EvaluateStructure, SearchStructure, SearchSimilarity, PerformDocking];
        assert_eq!(resolve_edges(&ops), vec![None, Some(0), Some(0), None, None]);
    }

    #[test]
    fn test_chaining_is_field_scoped() {
        let params = json!({ "model_type": "esmfold_predict" }).as_object().cloned().unwrap();
        let result = json!({ "success": true, "sequence": "MKV", "model_used": "protgpt2" });
        let chained = chain_parameters(GenerateProtein, &result, &params);
        assert_eq!(
            serde_json::Value::Object(chained),
            json!({ "model_type": "esmfold_predict", "sequence": "MKV" })
        );
    }

    #[test]
    fn test_chaining_overwrites_and_keeps_caller_keys() {
        let params = json!({ "pdb_file": "old.pdb", "pdb_file2": "ref.pdb" }).as_object().cloned().unwrap();
        let result = json!({ "pdb_file": "new.pdb", "metrics": { "plddt": 80.0 } });
        let chained = chain_parameters(PredictStructure, &result, &params);
        assert_eq!(chained["pdb_file"], "new.pdb");
        assert_eq!(chained["pdb_file2"], "ref.pdb");
        assert!(!chained.contains_key("sequence"));
        assert!(!chained.contains_key("metrics"));
    }

    #[test]
    fn test_operations_without_outputs_chain_nothing() {
        let params = Parameters::new();
        let chained = chain_parameters(SearchStructure, &json!({ "pdb_file": "x.pdb" }), &params);
        assert!(chained.is_empty());
    }
}
