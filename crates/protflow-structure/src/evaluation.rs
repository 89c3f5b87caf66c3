//! Pairwise structure comparison with USalign.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, instrument};

/// One row of `USalign -outfmt 2`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureComparison {
    pub chain_1: String,
    pub chain_2: String,
    /// TM-score normalized by the length of the first structure.
    pub tm_score_1: f64,
    /// TM-score normalized by the length of the second structure.
    pub tm_score_2: f64,
    pub rmsd: f64,
    pub seq_identity: f64,
    pub length_1: u64,
    pub length_2: u64,
    pub aligned_length: u64,
}

/// Parse the tab-separated `-outfmt 2` report; the `#` header line is skipped.
pub fn parse_outfmt2(text: &str) -> Result<StructureComparison> {
    let line = text
        .lines()
        .find(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .context("USalign produced no comparison row")?;
    let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
    if cols.len() < 11 {
        bail!("Unexpected USalign output: {line}");
    }
    let f = |i: usize| -> Result<f64> {
        cols[i].parse().with_context(|| format!("Bad USalign value {:?}", cols[i]))
    };
    let u = |i: usize| -> Result<u64> {
        cols[i].parse().with_context(|| format!("Bad USalign value {:?}", cols[i]))
    };
    Ok(StructureComparison {
        chain_1: cols[0].to_string(),
        chain_2: cols[1].to_string(),
        tm_score_1: f(2)?,
        tm_score_2: f(3)?,
        rmsd: f(4)?,
        seq_identity: f(7)?,
        length_1: u(8)?,
        length_2: u(9)?,
        aligned_length: u(10)?,
    })
}

pub struct UsAlign {
    executable_path: PathBuf,
}

impl UsAlign {
    pub fn new<P: AsRef<Path>>(executable_path: P) -> Self {
        Self { executable_path: executable_path.as_ref().to_path_buf() }
    }

    #[instrument(skip(self), fields(pdb1 = %pdb1.display(), pdb2 = %pdb2.display()))]
    pub async fn compare(&self, pdb1: &Path, pdb2: &Path) -> Result<StructureComparison> {
        for pdb in [pdb1, pdb2] {
            if !pdb.is_file() {
                bail!("PDB file not found: {}", pdb.display());
            }
        }

        let output = Command::new(&self.executable_path)
            .arg(pdb1)
            .arg(pdb2)
            .arg("-outfmt")
            .arg("2")
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.executable_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("USalign failed: {}", stderr.trim());
        }
        let comparison = parse_outfmt2(&String::from_utf8_lossy(&output.stdout))?;
        info!(tm_score = comparison.tm_score_1, rmsd = comparison.rmsd, "Structures compared");
        Ok(comparison)
    }
}
