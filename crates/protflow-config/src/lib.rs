//! Configuration loading for Protflow.
//! Reads protflow.toml from the current directory or the path in PROTFLOW_CONFIG.
//! Secrets never live in the file: the NVCF run key and the LLM API key come from
//! the environment (a `.env` file is honoured).

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

fn default_bind()       -> String { "0.0.0.0:5000".to_string() }
fn default_static_dir() -> String { "static".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind(), static_dir: default_static_dir() }
    }
}

/// What a dependent job does when its predecessor has not produced a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// Run with the job's own parameters; chain only what is available.
    #[default]
    BestEffort,
    /// Wait for the predecessor to finish; fail if it failed.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,
}

fn default_max_concurrent_jobs() -> usize { 4 }
fn default_job_timeout_secs()    -> u64   { 3600 }

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_timeout_secs: default_job_timeout_secs(),
            dependency_policy: DependencyPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Terminal jobs older than this are evicted.
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_job_ttl_secs()        -> u64 { 86_400 }
fn default_sweep_interval_secs() -> u64 { 300 }

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            job_ttl_secs: default_job_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl RegistryConfig {
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_structures_dir")]
    pub structures_dir: PathBuf,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_docking_dir")]
    pub docking_dir: PathBuf,
    #[serde(default = "default_databases_dir")]
    pub databases_dir: PathBuf,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_generation_url")]
    pub generation_url: String,
    #[serde(default = "default_generation_max_tokens")]
    pub generation_max_new_tokens: u32,
    /// `base_model_key` sent to the generation server; the server's default when unset.
    #[serde(default)]
    pub generation_model: Option<String>,
    #[serde(default = "default_esmfold_url")]
    pub esmfold_url: String,
    #[serde(default = "default_alphafold_url")]
    pub alphafold_url: String,
    #[serde(default = "default_openfold_url")]
    pub openfold_url: String,
    #[serde(default = "default_colabfold_url")]
    pub colabfold_url: String,
    #[serde(default = "default_nvcf_poll_secs")]
    pub nvcf_poll_seconds: u32,

    #[serde(default = "default_foldseek_url")]
    pub foldseek_url: String,
    #[serde(default = "default_foldseek_databases")]
    pub foldseek_databases: Vec<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    #[serde(default = "default_ncbi_blast_url")]
    pub ncbi_blast_url: String,

    #[serde(default = "default_blastp")]
    pub blastp_path: PathBuf,
    #[serde(default = "default_makeblastdb")]
    pub makeblastdb_path: PathBuf,
    #[serde(default = "default_usalign")]
    pub usalign_path: PathBuf,
    #[serde(default = "default_vina")]
    pub vina_path: PathBuf,
    #[serde(default = "default_obabel")]
    pub obabel_path: PathBuf,
}

fn default_structures_dir() -> PathBuf { PathBuf::from("static/pdb_files") }
fn default_uploads_dir()    -> PathBuf { PathBuf::from("static/uploads") }
fn default_docking_dir()    -> PathBuf { PathBuf::from("static/docking") }
fn default_databases_dir()  -> PathBuf { PathBuf::from("blast_databases") }
fn default_request_timeout_secs() -> u64 { 120 }
fn default_generation_url() -> String { "http://localhost:8000".to_string() }
fn default_generation_max_tokens() -> u32 { 150 }
fn default_esmfold_url()    -> String { "https://api.esmatlas.com/foldSequence/v1/pdb/".to_string() }
fn default_alphafold_url()  -> String { "https://health.api.nvidia.com/v1/biology/deepmind/alphafold2".to_string() }
fn default_openfold_url()   -> String {
    "https://health.api.nvidia.com/v1/biology/openfold/openfold2/predict-structure-from-msa-and-template".to_string()
}
fn default_colabfold_url()  -> String { "https://health.api.nvidia.com/v1/biology/colabfold/msa-search/predict".to_string() }
fn default_nvcf_poll_secs() -> u32 { 300 }
fn default_foldseek_url()   -> String { "https://search.foldseek.com/api".to_string() }
fn default_foldseek_databases() -> Vec<String> {
    vec!["afdb50".to_string(), "afdb-swissprot".to_string(), "pdb100".to_string()]
}
fn default_poll_interval_secs() -> u64 { 10 }
fn default_max_wait_secs()  -> u64 { 300 }
fn default_ncbi_blast_url() -> String { "https://blast.ncbi.nlm.nih.gov/Blast.cgi".to_string() }
fn default_blastp()         -> PathBuf { PathBuf::from("blastp") }
fn default_makeblastdb()    -> PathBuf { PathBuf::from("makeblastdb") }
fn default_usalign()        -> PathBuf { PathBuf::from("USalign") }
fn default_vina()           -> PathBuf { PathBuf::from("vina") }
fn default_obabel()         -> PathBuf { PathBuf::from("obabel") }

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            structures_dir: default_structures_dir(),
            uploads_dir: default_uploads_dir(),
            docking_dir: default_docking_dir(),
            databases_dir: default_databases_dir(),
            request_timeout_secs: default_request_timeout_secs(),
            generation_url: default_generation_url(),
            generation_max_new_tokens: default_generation_max_tokens(),
            generation_model: None,
            esmfold_url: default_esmfold_url(),
            alphafold_url: default_alphafold_url(),
            openfold_url: default_openfold_url(),
            colabfold_url: default_colabfold_url(),
            nvcf_poll_seconds: default_nvcf_poll_secs(),
            foldseek_url: default_foldseek_url(),
            foldseek_databases: default_foldseek_databases(),
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
            ncbi_blast_url: default_ncbi_blast_url(),
            blastp_path: default_blastp(),
            makeblastdb_path: default_makeblastdb(),
            usalign_path: default_usalign(),
            vina_path: default_vina(),
            obabel_path: default_obabel(),
        }
    }
}

impl ToolsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_base_url()    -> String { "https://api.groq.com/openai".to_string() }
fn default_llm_model()       -> String { "llama-3.3-70b-versatile".to_string() }
fn default_llm_temperature() -> f32    { 0.1 }
fn default_llm_max_tokens()  -> u32    { 1024 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

#[cfg(test)]
mod tests;

impl Config {
    /// Load configuration from protflow.toml.
    /// Checks PROTFLOW_CONFIG env var first, then the current directory.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let path = std::env::var("PROTFLOW_CONFIG")
            .unwrap_or_else(|_| "protflow.toml".to_string());
        Self::from_path(&path)
    }

    /// Like [`Config::load`], but falls back to defaults when no file exists.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::load() {
            Err(ConfigError::NotFound(path)) => {
                tracing::warn!("Config file {} not found, using defaults", path);
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// NVIDIA cloud function run key (`NVCF_RUN_KEY`).
pub fn nvcf_run_key() -> Option<SecretString> {
    secret_from_env("NVCF_RUN_KEY")
}

/// API key for the instruction parser's LLM endpoint (`PROTFLOW_LLM_API_KEY`).
pub fn llm_api_key() -> Option<SecretString> {
    secret_from_env("PROTFLOW_LLM_API_KEY")
}

fn secret_from_env(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}
