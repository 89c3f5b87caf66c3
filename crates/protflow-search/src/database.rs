//! BLAST protein database construction with `makeblastdb`.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use protflow_common::sandbox::SandboxClient;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, instrument, warn};

use crate::fasta::parse_fasta;

const UNIPROT_STREAM_URL: &str = "https://rest.uniprot.org/uniprotkb/stream";

/// Where the sequences for a new database come from.
#[derive(Debug, Clone)]
pub enum DatabaseSource {
    FastaFile(PathBuf),
    PfamIds(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct BlastDatabase {
    /// Path prefix passed to `blastp -db`.
    pub path: PathBuf,
    pub name: String,
    pub fasta_file: PathBuf,
    pub sequences: usize,
}

pub struct DatabaseBuilder {
    http: SandboxClient,
    makeblastdb: PathBuf,
    databases_dir: PathBuf,
}

impl DatabaseBuilder {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(http: SandboxClient, makeblastdb: P, databases_dir: Q) -> Self {
        Self {
            http,
            makeblastdb: makeblastdb.as_ref().to_path_buf(),
            databases_dir: databases_dir.as_ref().to_path_buf(),
        }
    }

    /// Fresh `<dir>/<name>_<timestamp>/<name>` prefix.
    fn db_prefix(&self, name: &str) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        self.databases_dir.join(format!("{name}_{stamp}")).join(name)
    }

    async fn fetch_pfam_fasta(&self, pfam_ids: &[String]) -> Result<String> {
        let mut fasta = String::new();
        for id in pfam_ids {
            let query = format!("xref:pfam-{}", id.trim());
            let text = self
                .http
                .get(UNIPROT_STREAM_URL)?
                .query(&[("format", "fasta"), ("query", query.as_str())])
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            let count = parse_fasta(&text).len();
            if count == 0 {
                warn!(pfam_id = %id, "UniProt returned no sequences");
            }
            info!(pfam_id = %id, count, "Fetched Pfam family sequences");
            fasta.push_str(&text);
        }
        if parse_fasta(&fasta).is_empty() {
            bail!("No sequences retrieved for Pfam IDs {}", pfam_ids.join(", "));
        }
        Ok(fasta)
    }

    #[instrument(skip(self, source))]
    pub async fn build(&self, source: DatabaseSource, name: &str) -> Result<BlastDatabase> {
        let prefix = self.db_prefix(name);
        let dir = prefix.parent().unwrap_or(&self.databases_dir).to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        let fasta_file = match source {
            DatabaseSource::FastaFile(path) => {
                if !path.is_file() {
                    bail!("FASTA file not found at {}", path.display());
                }
                path
            }
            DatabaseSource::PfamIds(ids) => {
                let fasta = self.fetch_pfam_fasta(&ids).await?;
                let path = dir.join(format!("{name}.fasta"));
                tokio::fs::write(&path, fasta).await?;
                path
            }
        };
        let sequences = parse_fasta(&tokio::fs::read_to_string(&fasta_file).await?).len();

        let output = Command::new(&self.makeblastdb)
            .arg("-in")
            .arg(&fasta_file)
            .arg("-dbtype")
            .arg("prot")
            .arg("-out")
            .arg(&prefix)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.makeblastdb.display()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Error creating BLAST database: {}", stderr.trim());
        }

        info!(db = %prefix.display(), sequences, "BLAST database created");
        Ok(BlastDatabase {
            path: prefix,
            name: name.to_string(),
            fasta_file,
            sequences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_fasta_rejected() {
        let dir = tempdir().unwrap();
        let builder = DatabaseBuilder::new(SandboxClient::new().unwrap(), "makeblastdb", dir.path());
        let err = builder
            .build(DatabaseSource::FastaFile(dir.path().join("absent.fasta")), "custom_db")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("FASTA file not found"));
    }

    #[test]
    fn test_prefix_layout() {
        let builder = DatabaseBuilder::new(SandboxClient::new().unwrap(), "makeblastdb", "/data/dbs");
        let prefix = builder.db_prefix("pfam_db");
        assert_eq!(prefix.file_name().unwrap(), "pfam_db");
        let folder = prefix.parent().unwrap().file_name().unwrap().to_string_lossy().to_string();
        assert!(folder.starts_with("pfam_db_"));
        assert!(prefix.starts_with("/data/dbs"));
    }
}
