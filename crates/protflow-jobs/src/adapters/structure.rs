//! Adapters over `protflow-structure`: generation, prediction, evaluation,
//! docking and file intake.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use protflow_common::outcome::{param_f64, param_str, param_u64, Parameters, ToolOutcome};
use protflow_structure::docking::{DockingConfig, VinaRunner};
use protflow_structure::evaluation::UsAlign;
use protflow_structure::generation::GenerationClient;
use protflow_structure::upload::{resolve_upload, UploadKind};
use protflow_structure::StructurePredictor;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapter::{AdapterKey, ToolAdapter};
use crate::operation::StructureModel;

// ── Generation ──────────────────────────────────────────────────────────────

pub struct GenerationAdapter {
    client: GenerationClient,
}

impl GenerationAdapter {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolAdapter for GenerationAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::GenerateProtein
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let prompt = param_str(params, "prompt").unwrap_or_default();
        let protein = self.client.generate(prompt).await?;
        Ok(ToolOutcome::success(serde_json::to_value(protein)?))
    }
}

// ── Prediction ──────────────────────────────────────────────────────────────

/// One structure predictor behind one `model_type`.
pub struct PredictionAdapter {
    model: StructureModel,
    predictor: Arc<dyn StructurePredictor>,
}

impl PredictionAdapter {
    pub fn new(model: StructureModel, predictor: Arc<dyn StructurePredictor>) -> Self {
        Self { model, predictor }
    }
}

#[async_trait]
impl ToolAdapter for PredictionAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::Predict(self.model)
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let sequence = param_str(params, "sequence").unwrap_or_default();
        let prediction = self
            .predictor
            .predict(sequence)
            .await
            .with_context(|| format!("{} prediction failed", self.predictor.name()))?;
        Ok(ToolOutcome::success(serde_json::to_value(prediction)?))
    }
}

// ── Evaluation ──────────────────────────────────────────────────────────────

pub struct EvaluationAdapter {
    usalign: UsAlign,
}

impl EvaluationAdapter {
    pub fn new(usalign: UsAlign) -> Self {
        Self { usalign }
    }
}

#[async_trait]
impl ToolAdapter for EvaluationAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::UsAlign
    }

    fn validate(&self, params: &Parameters) -> Result<(), String> {
        for field in ["pdb_file1", "pdb_file2"] {
            let path = param_str(params, field).unwrap_or_default();
            if !Path::new(path).is_file() {
                return Err(format!("PDB file not found: {path}"));
            }
        }
        Ok(())
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let pdb1 = param_str(params, "pdb_file1").unwrap_or_default();
        let pdb2 = param_str(params, "pdb_file2").unwrap_or_default();
        let comparison = self.usalign.compare(Path::new(pdb1), Path::new(pdb2)).await?;
        Ok(ToolOutcome::success(serde_json::to_value(comparison)?))
    }
}

// ── Docking ─────────────────────────────────────────────────────────────────

pub struct DockingAdapter {
    runner: VinaRunner,
    output_root: PathBuf,
}

impl DockingAdapter {
    pub fn new<P: AsRef<Path>>(runner: VinaRunner, output_root: P) -> Self {
        Self {
            runner,
            output_root: output_root.as_ref().to_path_buf(),
        }
    }
}

/// Build a Vina run from job parameters; `None` if a required value is missing.
pub fn docking_config(params: &Parameters) -> Option<DockingConfig> {
    // out-of-range values fall back to the default rather than wrapping
    let u32_or = |key: &str, default: u32| {
        param_u64(params, key)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    };
    Some(DockingConfig {
        receptor: PathBuf::from(param_str(params, "pdb_file")?),
        ligand: PathBuf::from(param_str(params, "molecule_file")?),
        center_x: param_f64(params, "center_x")?,
        center_y: param_f64(params, "center_y")?,
        center_z: param_f64(params, "center_z")?,
        size_x: param_f64(params, "size_x")?,
        size_y: param_f64(params, "size_y")?,
        size_z: param_f64(params, "size_z")?,
        exhaustiveness: u32_or("exhaustiveness", 16),
        num_modes: u32_or("num_modes", 10),
        energy_range: u32_or("energy_range", 3),
        cpu: u32_or("cpu", 4),
        seed: param_u64(params, "seed"),
    })
}

#[async_trait]
impl ToolAdapter for DockingAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::Docking
    }

    fn validate(&self, params: &Parameters) -> Result<(), String> {
        docking_config(params)
            .map(|_| ())
            .ok_or_else(|| "Missing required docking parameters".to_string())
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let config = docking_config(params).context("Missing required docking parameters")?;
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let dir = self
            .output_root
            .join(format!("docking_{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &run_id[..8]));
        let output = self.runner.run(&config, &dir).await?;

        let mut payload = serde_json::to_value(&output)?;
        if let Value::Object(map) = &mut payload {
            map.insert("output_dir".to_string(), json!(dir));
            map.insert(
                "best_affinity".to_string(),
                json!(output.binding_modes.first().map(|m| m.affinity)),
            );
        }
        Ok(ToolOutcome::success(payload))
    }
}

// ── File intake ─────────────────────────────────────────────────────────────

pub struct UploadAdapter {
    uploads_dir: PathBuf,
}

impl UploadAdapter {
    pub fn new<P: AsRef<Path>>(uploads_dir: P) -> Self {
        Self {
            uploads_dir: uploads_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ToolAdapter for UploadAdapter {
    fn key(&self) -> AdapterKey {
        AdapterKey::FileUpload
    }

    fn validate(&self, params: &Parameters) -> Result<(), String> {
        param_str(params, "outputType")
            .unwrap_or_default()
            .parse::<UploadKind>()
            .map(|_| ())
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome> {
        let file_path = param_str(params, "filePath").unwrap_or_default();
        let kind = match param_str(params, "outputType").unwrap_or_default().parse::<UploadKind>() {
            Ok(kind) => kind,
            Err(msg) => return Ok(ToolOutcome::failure(msg)),
        };
        let Some(full_path) = resolve_upload(&self.uploads_dir, file_path) else {
            return Ok(ToolOutcome::failure("File not found"));
        };
        if !tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
            return Ok(ToolOutcome::failure("File not found"));
        }

        let mut payload = Parameters::new();
        payload.insert(kind.output_field().to_string(), json!(full_path));
        payload.insert("outputType".to_string(), json!(kind.as_str()));
        payload.insert("filePath".to_string(), json!(file_path));
        Ok(ToolOutcome::Success(payload))
    }
}
