//! Shared application state for the web server.

use protflow_common::instruction::InstructionParser;
use protflow_config::Config;
use protflow_jobs::adapters::build_default_adapters;
use protflow_jobs::{Dispatcher, JobEvent, JobExecutor, JobRegistry};
use protflow_llm::{LlmInstructionParser, OpenAiCompatibleBackend};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared state injected into every Axum handler.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub executor: JobExecutor,
    pub parser: Arc<dyn InstructionParser>,
}

impl AppState {
    pub fn new(executor: JobExecutor, parser: Arc<dyn InstructionParser>) -> Self {
        Self {
            registry: Arc::clone(executor.registry()),
            executor,
            parser,
        }
    }

    /// Wire registry, adapters, executor and parser from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let adapters = build_default_adapters(&config.tools, protflow_config::nvcf_run_key())?;
        let registry = Arc::new(JobRegistry::new());
        let executor = JobExecutor::new(registry, Arc::new(Dispatcher::new(adapters)), &config.executor);

        let backend = OpenAiCompatibleBackend::from_config(&config.llm, protflow_config::llm_api_key())?;
        let parser = LlmInstructionParser::new(Arc::new(backend), &config.llm);
        Ok(Self::new(executor, Arc::new(parser)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.registry.subscribe()
    }
}

pub type SharedState = Arc<AppState>;
