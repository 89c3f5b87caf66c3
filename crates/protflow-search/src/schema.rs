//! Unified search result schema.
//!
//! Every search job stores the same top-level shape regardless of which tool
//! produced it: `metadata`, `alignments.databases` and `msa.sequences`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Blast,
    Colabfold,
    Foldseek,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Blast => "blast",
            SearchType::Colabfold => "colabfold",
            SearchType::Foldseek => "foldseek",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    pub id: String,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub search_type: SearchType,
    pub timestamp: DateTime<Utc>,
    pub query_info: QueryInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub query_seq: String,
    pub target_seq: String,
    pub midline: String,
    pub query_start: u64,
    pub query_end: u64,
    pub target_start: u64,
    pub target_end: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: String,
    pub accession: String,
    pub description: String,
    pub length: u64,
    pub score: f64,
    pub evalue: f64,
    /// Percent identity in [0, 100].
    pub identity: f64,
    /// Query coverage in [0, 100]; 0 when the tool does not report it.
    pub coverage: f64,
    pub alignments: Vec<AlignmentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseHits {
    pub hits: Vec<Hit>,
    pub total_hits: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignments {
    pub databases: BTreeMap<String, DatabaseHits>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsaSequence {
    pub id: String,
    pub name: String,
    pub sequence: String,
    pub identity: f64,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Msa {
    pub format: String,
    pub sequences: Vec<MsaSequence>,
}

impl Default for Msa {
    fn default() -> Self {
        Self { format: "fasta".to_string(), sequences: Vec::new() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedSearchResult {
    pub metadata: SearchMetadata,
    pub alignments: Alignments,
    pub msa: Msa,
}

/// Identity statistics over every hit of a result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IdentityStats {
    pub total_hits: usize,
    pub min_identity: f64,
    pub max_identity: f64,
    pub avg_identity: f64,
}

impl UnifiedSearchResult {
    /// An empty result for `query`, stamped with the current time.
    pub fn empty(search_type: SearchType, query: &str) -> Self {
        Self {
            metadata: SearchMetadata {
                search_type,
                timestamp: Utc::now(),
                query_info: QueryInfo {
                    id: "query".to_string(),
                    length: query.chars().count(),
                },
            },
            alignments: Alignments::default(),
            msa: Msa::default(),
        }
    }

    /// Adds the query as the first MSA row at 100% identity.
    pub(crate) fn push_query(&mut self, query: &str, database: &str) {
        self.msa.sequences.push(MsaSequence {
            id: "query".to_string(),
            name: "Query".to_string(),
            sequence: query.to_string(),
            identity: 100.0,
            database: database.to_string(),
        });
    }

    pub fn hits(&self) -> impl Iterator<Item = &Hit> {
        self.alignments.databases.values().flat_map(|db| db.hits.iter())
    }

    pub fn identity_stats(&self) -> Option<IdentityStats> {
        let identities: Vec<f64> = self.hits().map(|h| h.identity).collect();
        if identities.is_empty() {
            return None;
        }
        let min = identities.iter().copied().fold(f64::INFINITY, f64::min);
        let max = identities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = identities.iter().sum::<f64>() / identities.len() as f64;
        Some(IdentityStats {
            total_hits: identities.len(),
            min_identity: min,
            max_identity: max,
            avg_identity: avg,
        })
    }
}
