use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::error::ProtflowError;

/// Hosts every Protflow tool adapter talks to.
const DEFAULT_ALLOWLIST: &[&str] = &[
    "api.esmatlas.com",      // ESMFold
    "health.api.nvidia.com", // AlphaFold2, OpenFold2, ColabFold MSA
    "api.nvcf.nvidia.com",   // NVCF status polling
    "search.foldseek.com",   // Foldseek
    "blast.ncbi.nlm.nih.gov", // NCBI BLAST URL API
    "rest.uniprot.org",      // Pfam FASTA exports
    "files.rcsb.org",        // PDB downloads
    "alphafold.ebi.ac.uk",   // AlphaFold DB downloads
    "api.groq.com",          // Instruction parser
    "api.openai.com",        // Instruction parser
    "localhost",             // Generation server, local LLMs
    "127.0.0.1",
];

/// An HTTP client that only allows requests to approved domains.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist and a 30 second request timeout.
    pub fn new() -> Result<Self, ProtflowError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ProtflowError> {
        let client = ClientBuilder::new().timeout(timeout).build()?;
        let allowlist = DEFAULT_ALLOWLIST.iter().map(|d| d.to_string()).collect();
        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Allows the host of `url`, e.g. a self-hosted service from configuration.
    pub fn allow_url_host(&mut self, url: &str) -> Result<(), ProtflowError> {
        let parsed = Url::parse(url)
            .map_err(|e| ProtflowError::Config(format!("Invalid URL {url}: {e}")))?;
        match parsed.host_str() {
            Some(host) => {
                self.allow_domain(host);
                Ok(())
            }
            None => Err(ProtflowError::Config(format!("URL has no host: {url}"))),
        }
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or a subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn check(&self, url: &str) -> Result<(), ProtflowError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(ProtflowError::Security(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )))
        }
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, ProtflowError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, ProtflowError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allowlist() {
        let client = SandboxClient::new().unwrap();
        assert!(client.is_allowed("https://search.foldseek.com/api/ticket"));
        assert!(client.is_allowed("https://health.api.nvidia.com/v1/biology/deepmind/alphafold2"));
        assert!(!client.is_allowed("https://example.com/upload"));
        assert!(!client.is_allowed("not a url"));
    }

    #[test]
    fn test_allow_url_host() {
        let mut client = SandboxClient::new().unwrap();
        client.allow_url_host("http://gen.internal:8000/generate").unwrap();
        assert!(client.is_allowed("http://gen.internal:8000/status/1"));
        assert!(client.allow_url_host("::::").is_err());
    }

    #[test]
    fn test_blocked_request_is_security_error() {
        let client = SandboxClient::new().unwrap();
        let err = client.get("https://evil.example.org").unwrap_err();
        assert!(matches!(err, ProtflowError::Security(_)));
    }
}
