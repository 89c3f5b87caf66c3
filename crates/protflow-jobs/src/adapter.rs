//! Tool adapter capability trait and the table the dispatcher routes through.

use async_trait::async_trait;
use protflow_common::outcome::{Parameters, ToolOutcome};
use protflow_search::SearchType;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::operation::{Operation, SimilarityBackend, StructureModel};

/// Every concrete backend the dispatcher can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKey {
    GenerateProtein,
    Predict(StructureModel),
    Foldseek,
    UsAlign,
    Similarity(SimilarityBackend),
    BuildDatabase,
    Docking,
    FileUpload,
}

impl AdapterKey {
    /// Route an operation plus its `model_type` selector. Unknown selectors are
    /// reported with the message callers see.
    pub fn resolve(op: Operation, params: &Parameters) -> Result<Self, String> {
        Ok(match op {
            Operation::GenerateProtein => AdapterKey::GenerateProtein,
            Operation::PredictStructure => AdapterKey::Predict(StructureModel::from_params(params)?),
            Operation::SearchStructure => AdapterKey::Foldseek,
            Operation::EvaluateStructure => AdapterKey::UsAlign,
            Operation::SearchSimilarity => AdapterKey::Similarity(SimilarityBackend::from_params(params)?),
            Operation::BuildDatabase => AdapterKey::BuildDatabase,
            Operation::PerformDocking => AdapterKey::Docking,
            Operation::FileUpload => AdapterKey::FileUpload,
        })
    }

    /// Source schema of the raw results this adapter returns, for search adapters.
    pub fn search_type(&self) -> Option<SearchType> {
        match self {
            AdapterKey::Foldseek => Some(SearchType::Foldseek),
            AdapterKey::Similarity(SimilarityBackend::Colabfold) => Some(SearchType::Colabfold),
            AdapterKey::Similarity(_) => Some(SearchType::Blast),
            _ => None,
        }
    }
}

impl fmt::Display for AdapterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterKey::GenerateProtein => f.write_str("generate_protein"),
            AdapterKey::Predict(model) => write!(f, "{model}"),
            AdapterKey::Foldseek => f.write_str("foldseek_search"),
            AdapterKey::UsAlign => f.write_str("usalign_evaluate"),
            AdapterKey::Similarity(backend) => write!(f, "{backend}"),
            AdapterKey::BuildDatabase => f.write_str("build_database"),
            AdapterKey::Docking => f.write_str("perform_docking"),
            AdapterKey::FileUpload => f.write_str("file_upload"),
        }
    }
}

/// A concrete tool integration.
///
/// Search adapters return their source's raw payload under `raw_results`; the
/// dispatcher normalizes it into `results`.
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn key(&self) -> AdapterKey;

    /// Adapter-specific checks run before [`ToolAdapter::execute`].
    fn validate(&self, _params: &Parameters) -> Result<(), String> {
        Ok(())
    }

    async fn execute(&self, params: &Parameters) -> anyhow::Result<ToolOutcome>;
}

/// Adapters keyed by [`AdapterKey`]. Build once at startup, then share via Arc.
pub struct AdapterRegistry {
    adapters: HashMap<AdapterKey, Arc<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self { adapters: HashMap::new() }
    }

    /// Register an adapter. Panics if its key is already taken.
    pub fn register<T: ToolAdapter + 'static>(&mut self, adapter: T) {
        self.register_arc(Arc::new(adapter));
    }

    pub fn register_arc(&mut self, adapter: Arc<dyn ToolAdapter>) {
        let key = adapter.key();
        assert!(!self.adapters.contains_key(&key), "Duplicate adapter: {key}");
        self.adapters.insert(key, adapter);
    }

    pub fn get(&self, key: AdapterKey) -> Option<&Arc<dyn ToolAdapter>> {
        self.adapters.get(&key)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
