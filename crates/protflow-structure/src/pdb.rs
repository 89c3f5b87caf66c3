//! PDB text helpers: residue validation, pLDDT extraction, saving predictions.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const VALID_RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWY";

/// True for a non-empty sequence of the 20 standard residues (case-insensitive).
pub fn is_valid_sequence(sequence: &str) -> bool {
    !sequence.is_empty()
        && sequence
            .chars()
            .all(|c| VALID_RESIDUES.contains(c.to_ascii_uppercase()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StructureMetrics {
    /// Mean per-atom confidence, 0-100.
    pub plddt: f64,
}

impl StructureMetrics {
    pub fn from_pdb(pdb: &str) -> Self {
        Self { plddt: mean_plddt(pdb) }
    }
}

/// Mean B-factor (columns 61-66) over ATOM records. Predictors store pLDDT there.
pub fn mean_plddt(pdb: &str) -> f64 {
    let scores: Vec<f64> = pdb
        .lines()
        .filter(|l| l.starts_with("ATOM"))
        .filter_map(|l| l.get(60..66))
        .filter_map(|field| field.trim().parse::<f64>().ok())
        .collect();
    if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn looks_like_pdb(text: &str) -> bool {
    text.lines().any(|l| l.starts_with("ATOM") || l.starts_with("HETATM"))
}

/// First string anywhere in a JSON response that holds PDB records.
pub fn find_pdb_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if looks_like_pdb(s) => Some(s),
        Value::Array(items) => items.iter().find_map(find_pdb_text),
        Value::Object(map) => map.values().find_map(find_pdb_text),
        _ => None,
    }
}

/// Write `pdb` as `protein_<timestamp>.pdb` under `dir`.
pub async fn save_structure(dir: &Path, pdb: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
    let path = dir.join(format!("protein_{stamp}.pdb"));
    tokio::fs::write(&path, pdb).await?;
    debug!(path = %path.display(), "Saved predicted structure");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    const PDB: &str = "\
HEADER    PREDICTED
ATOM      1  N   MET A   1      11.104   6.134  -6.504  1.00 80.00           N
ATOM      2  CA  MET A   1      11.639   6.071  -5.147  1.00 90.00           C
HETATM    3  O   HOH A   2      10.000   1.000   1.000  1.00 10.00           O
ATOM      4  C   MET A   1      12.000   6.000  -5.000  1.00
END";

    #[test]
    fn test_mean_plddt_uses_atom_b_factors() {
        assert_eq!(mean_plddt(PDB), 85.0);
        assert_eq!(mean_plddt("no records"), 0.0);
    }

    #[test]
    fn test_sequence_validation() {
        assert!(is_valid_sequence("MKTAYIAKQR"));
        assert!(is_valid_sequence("mktayiakqr"));
        assert!(!is_valid_sequence("MKTXB"));
        assert!(!is_valid_sequence(""));
    }

    #[test]
    fn test_find_pdb_text_in_nested_response() {
        let response = json!({
            "structures_in_ranked_order": [{ "format": "pdb", "structure": PDB }]
        });
        assert_eq!(find_pdb_text(&response), Some(PDB));
        assert_eq!(find_pdb_text(&json!(["just text"])), None);
    }

    #[tokio::test]
    async fn test_save_structure_names_file() {
        let dir = tempdir().unwrap();
        let path = save_structure(dir.path(), PDB).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("protein_") && name.ends_with(".pdb"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), PDB);
    }
}
