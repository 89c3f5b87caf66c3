//! Concrete tool adapters and the default adapter table.
//!
//! Each adapter wraps one client from `protflow-search` or `protflow-structure`
//! and translates between job parameters and that client's typed API.
//! Adapters that need an NVIDIA cloud function key are only registered when one
//! is configured; jobs routed to them fail with "No adapter available".

pub mod search;
pub mod structure;

use protflow_common::error::Result;
use protflow_common::nvcf::NvcfClient;
use protflow_common::sandbox::SandboxClient;
use protflow_config::ToolsConfig;
use protflow_search::colabfold::ColabFoldSearcher;
use protflow_search::database::DatabaseBuilder;
use protflow_search::foldseek::FoldseekClient;
use protflow_search::local_blast::LocalBlastRunner;
use protflow_search::ncbi::NcbiBlastClient;
use protflow_structure::docking::VinaRunner;
use protflow_structure::esmfold::EsmFoldPredictor;
use protflow_structure::evaluation::UsAlign;
use protflow_structure::generation::GenerationClient;
use protflow_structure::nvcf_fold::{NvcfFoldPredictor, NvcfModel};
use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::adapter::AdapterRegistry;
use crate::operation::StructureModel;
use search::{ColabFoldAdapter, DatabaseAdapter, FoldseekAdapter, LocalBlastAdapter, NcbiBlastAdapter};
use structure::{DockingAdapter, EvaluationAdapter, GenerationAdapter, PredictionAdapter, UploadAdapter};

/// Status polls before an NVCF request is abandoned.
const NVCF_MAX_POLLS: u32 = 12;

/// Sandboxed client that also admits the hosts of every configured endpoint.
fn sandbox_for(tools: &ToolsConfig, timeout: Duration) -> Result<SandboxClient> {
    let mut http = SandboxClient::with_timeout(timeout)?;
    for url in [
        &tools.generation_url,
        &tools.esmfold_url,
        &tools.alphafold_url,
        &tools.openfold_url,
        &tools.colabfold_url,
        &tools.foldseek_url,
        &tools.ncbi_blast_url,
    ] {
        http.allow_url_host(url)?;
    }
    Ok(http)
}

/// Build every adapter the configuration supports.
pub fn build_default_adapters(tools: &ToolsConfig, nvcf_run_key: Option<SecretString>) -> Result<AdapterRegistry> {
    let http = sandbox_for(tools, tools.request_timeout())?;
    let mut reg = AdapterRegistry::new();

    let mut generation = GenerationClient::new(http.clone(), &tools.generation_url, tools.generation_max_new_tokens)
        .with_polling(tools.poll_interval(), tools.max_wait());
    if let Some(model) = &tools.generation_model {
        generation = generation.with_model(model);
    }
    reg.register(GenerationAdapter::new(generation));

    reg.register(PredictionAdapter::new(
        StructureModel::Esmfold,
        Arc::new(EsmFoldPredictor::new(http.clone(), &tools.esmfold_url, &tools.structures_dir)),
    ));

    reg.register(FoldseekAdapter::new(
        FoldseekClient::new(http.clone(), &tools.foldseek_url)
            .with_databases(tools.foldseek_databases.clone())
            .with_polling(tools.poll_interval(), tools.max_wait()),
    ));
    reg.register(NcbiBlastAdapter::new(NcbiBlastClient::new(
        http.clone(),
        &tools.ncbi_blast_url,
        tools.poll_interval(),
        tools.max_wait(),
    )));
    reg.register(LocalBlastAdapter::new(LocalBlastRunner::new(&tools.blastp_path)));
    reg.register(DatabaseAdapter::new(DatabaseBuilder::new(
        http,
        &tools.makeblastdb_path,
        &tools.databases_dir,
    )));
    reg.register(EvaluationAdapter::new(UsAlign::new(&tools.usalign_path)));
    reg.register(DockingAdapter::new(
        VinaRunner::new(&tools.vina_path, &tools.obabel_path),
        &tools.docking_dir,
    ));
    reg.register(UploadAdapter::new(&tools.uploads_dir));

    match nvcf_run_key {
        Some(key) => {
            // The status endpoint holds each request open for up to `nvcf_poll_seconds`.
            let nvcf_timeout = Duration::from_secs(u64::from(tools.nvcf_poll_seconds) + 30);
            let nvcf = NvcfClient::new(sandbox_for(tools, nvcf_timeout)?, key)
                .with_polling(tools.nvcf_poll_seconds, NVCF_MAX_POLLS);
            reg.register(PredictionAdapter::new(
                StructureModel::Alphafold2,
                Arc::new(NvcfFoldPredictor::new(
                    nvcf.clone(),
                    NvcfModel::AlphaFold2,
                    &tools.alphafold_url,
                    &tools.structures_dir,
                )),
            ));
            reg.register(PredictionAdapter::new(
                StructureModel::Openfold,
                Arc::new(NvcfFoldPredictor::new(
                    nvcf.clone(),
                    NvcfModel::OpenFold2,
                    &tools.openfold_url,
                    &tools.structures_dir,
                )),
            ));
            reg.register(ColabFoldAdapter::new(ColabFoldSearcher::new(nvcf, &tools.colabfold_url)));
        }
        None => warn!("NVCF_RUN_KEY not set; AlphaFold2, OpenFold2 and ColabFold adapters disabled"),
    }

    info!("AdapterRegistry ready with {} adapters", reg.len());
    Ok(reg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterKey;
    use crate::operation::SimilarityBackend;

    #[test]
    fn test_default_adapters_without_nvcf_key() {
        let reg = build_default_adapters(&ToolsConfig::default(), None).unwrap();
        assert_eq!(reg.len(), 9);
        assert!(reg.get(AdapterKey::Predict(StructureModel::Esmfold)).is_some());
        assert!(reg.get(AdapterKey::Similarity(SimilarityBackend::LocalBlast)).is_some());
        assert!(reg.get(AdapterKey::Predict(StructureModel::Openfold)).is_none());
        assert!(reg.get(AdapterKey::Similarity(SimilarityBackend::Colabfold)).is_none());
    }

    #[test]
    fn test_default_adapters_with_nvcf_key() {
        let key = SecretString::from("nvapi-test".to_string());
        let reg = build_default_adapters(&ToolsConfig::default(), Some(key)).unwrap();
        assert_eq!(reg.len(), 12);
        assert!(reg.get(AdapterKey::Predict(StructureModel::Alphafold2)).is_some());
        assert!(reg.get(AdapterKey::Similarity(SimilarityBackend::Colabfold)).is_some());
    }
}
