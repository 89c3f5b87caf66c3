//! Protflow Structure - everything that produces or consumes a 3D structure.
//!
//! - [`generation`]: de novo sequence generation server client
//! - [`esmfold`], [`nvcf_fold`]: structure predictors behind [`StructurePredictor`]
//! - [`evaluation`]: pairwise structure comparison with USalign
//! - [`docking`]: AutoDock Vina with Open Babel preparation
//! - [`upload`]: user file intake

pub mod docking;
pub mod esmfold;
pub mod evaluation;
pub mod generation;
pub mod nvcf_fold;
pub mod pdb;
pub mod upload;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

pub use pdb::{is_valid_sequence, StructureMetrics};

/// A predicted structure saved to disk.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub pdb_file: PathBuf,
    pub metrics: StructureMetrics,
    pub sequence: String,
}

#[async_trait]
pub trait StructurePredictor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn predict(&self, sequence: &str) -> Result<Prediction>;
}
