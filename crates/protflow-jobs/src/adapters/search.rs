//! Adapters over `protflow-search`. Search adapters hand back the raw source
//! payload under `raw_results`; normalization happens in the dispatcher.

use anyhow::Context;
use async_trait::async_trait;
use protflow_common::outcome::{param_str, Parameters, ToolOutcome};
use protflow_search::colabfold::ColabFoldSearcher;
use protflow_search::database::{DatabaseBuilder, DatabaseSource};
use protflow_search::foldseek::FoldseekClient;
use protflow_search::local_blast::{build_report, check_database_files, LocalBlastRunner};
use protflow_search::ncbi::NcbiBlastClient;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::adapter::{AdapterKey, ToolAdapter};
use crate::dispatcher::pfam_ids;
use crate::operation::SimilarityBackend;

fn raw(results: impl serde::Serialize, query: &str) -> anyhow::Result<ToolOutcome> {
    Ok(ToolOutcome::success(json!({
        "raw_results": serde_json::to_value(results)?,
        "query": query,
    })))
}

pub struct NcbiBlastAdapter {
    client: NcbiBlastClient,
}

impl NcbiBlastAdapter {
    pub fn new(client: NcbiBlastClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolAdapter for NcbiBlastAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::Similarity(SimilarityBackend::NcbiBlast)
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let sequence = param_str(params, "sequence").unwrap_or_default();
        let hits = self.client.fetch(sequence).await?;
        raw(hits, sequence)
    }
}

pub struct ColabFoldAdapter {
    searcher: ColabFoldSearcher,
}

impl ColabFoldAdapter {
    pub fn new(searcher: ColabFoldSearcher) -> Self {
        Self { searcher }
    }
}

#[async_trait]
impl ToolAdapter for ColabFoldAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::Similarity(SimilarityBackend::Colabfold)
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let sequence = param_str(params, "sequence").unwrap_or_default();
        let alignments = self.searcher.fetch(sequence).await?;
        raw(alignments, sequence)
    }
}

pub struct LocalBlastAdapter {
    runner: LocalBlastRunner,
}

impl LocalBlastAdapter {
    pub fn new(runner: LocalBlastRunner) -> Self {
        Self { runner }
    }
}

fn database_path(params: &Parameters) -> Option<PathBuf> {
    params
        .get("database")
        .and_then(|db| db.get("path"))
        .and_then(Value::as_str)
        .map(PathBuf::from)
}

#[async_trait]
impl ToolAdapter for LocalBlastAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::Similarity(SimilarityBackend::LocalBlast)
    }

    fn validate(&self, params: &Parameters) -> Result<(), String> {
        let path = database_path(params).ok_or("No database provided")?;
        check_database_files(&path).map_err(|e| e.to_string())
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let sequence = param_str(params, "sequence").unwrap_or_default();
        let db_path = database_path(params).context("No database provided")?;
        let rows = self.runner.run(sequence, &db_path).await?;
        let Some(report) = build_report(sequence, rows) else {
            return Ok(ToolOutcome::failure("No significant hits found"));
        };
        Ok(ToolOutcome::success(json!({
            "raw_results": serde_json::to_value(&report.hits)?,
            "query": sequence,
            "statistics": report.statistics,
            "msa_text": report.msa,
        })))
    }
}

pub struct FoldseekAdapter {
    client: FoldseekClient,
}

impl FoldseekAdapter {
    pub fn new(client: FoldseekClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolAdapter for FoldseekAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::Foldseek
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let pdb_file = param_str(params, "pdb_file").unwrap_or_default();
        let results = self.client.fetch(Path::new(pdb_file)).await?;
        Ok(ToolOutcome::success(json!({
            "raw_results": serde_json::to_value(results)?,
            "query": param_str(params, "sequence").unwrap_or_default(),
            "pdb_file": pdb_file,
        })))
    }
}

pub struct DatabaseAdapter {
    builder: DatabaseBuilder,
}

impl DatabaseAdapter {
    pub fn new(builder: DatabaseBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl ToolAdapter for DatabaseAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::BuildDatabase
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let (source, default_name) = match param_str(params, "fasta_file") {
            Some(fasta) => (DatabaseSource::FastaFile(PathBuf::from(fasta)), "custom_db"),
            None => (DatabaseSource::PfamIds(pfam_ids(params)), "pfam_db"),
        };
        let name = param_str(params, "db_name").unwrap_or(default_name);
        let db = self.builder.build(source, name).await?;
        Ok(ToolOutcome::success(json!({
            "database": { "path": db.path, "name": db.name },
            "fasta_file": db.fasta_file,
            "sequences": db.sequences,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_blast_validates_database_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("custom_db");
        let adapter = LocalBlastAdapter::new(LocalBlastRunner::new("blastp"));
        let params = json!({ "sequence": "MKV", "database": { "path": prefix } });
        let params = params.as_object().unwrap();

        assert!(adapter.validate(params).is_err());
        for ext in ["phr", "pin", "psq"] {
            std::fs::write(prefix.with_extension(ext), b"").unwrap();
        }
        assert!(adapter.validate(params).is_ok());
        assert!(adapter.validate(&Parameters::new()).is_err());
    }
}
