//! Result schema normalizer.
//!
//! One pure mapping per source format into [`UnifiedSearchResult`]. The raw input
//! types are deliberately permissive: unknown fields are ignored, absent fields
//! default, and numbers may arrive as strings or nulls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::fasta::{aligned_identity, parse_fasta};
use crate::numeric::{clamp_identity, lenient_f64, lenient_string, lenient_u64};
use crate::schema::{AlignmentRecord, DatabaseHits, Hit, MsaSequence, SearchType, UnifiedSearchResult};

// ── BLAST family ──────────────────────────────────────────────────────────────

/// Hits as reported by NCBI BLAST and local `blastp` after conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlastResults {
    #[serde(default)]
    pub hits: Vec<BlastHit>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlastHit {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub accession: String,
    #[serde(default, alias = "description", deserialize_with = "lenient_string")]
    pub def: String,
    #[serde(default, alias = "length", deserialize_with = "lenient_u64")]
    pub len: u64,
    #[serde(default)]
    pub hsps: Vec<BlastHsp>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlastHsp {
    #[serde(default, alias = "bit_score", deserialize_with = "lenient_f64")]
    pub score: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub evalue: f64,
    /// Percent identity.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub identity: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub qseq: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub hseq: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub midline: String,
    #[serde(default, alias = "qstart", deserialize_with = "lenient_u64")]
    pub query_from: u64,
    #[serde(default, alias = "qend", deserialize_with = "lenient_u64")]
    pub query_to: u64,
    #[serde(default, alias = "sstart", deserialize_with = "lenient_u64")]
    pub hit_from: u64,
    #[serde(default, alias = "send", deserialize_with = "lenient_u64")]
    pub hit_to: u64,
}

pub fn normalize_blast(raw: &BlastResults, query: &str) -> UnifiedSearchResult {
    const DB: &str = "blast";
    let mut out = UnifiedSearchResult::empty(SearchType::Blast, query);
    out.push_query(query, DB);

    let mut hits = Vec::with_capacity(raw.hits.len());
    for hit in &raw.hits {
        let Some(hsp) = hit.hsps.first() else {
            continue;
        };
        let identity = clamp_identity(hsp.identity);
        hits.push(Hit {
            id: hit.id.clone(),
            accession: hit.accession.clone(),
            description: hit.def.clone(),
            length: hit.len,
            score: hsp.score,
            evalue: hsp.evalue,
            identity,
            coverage: 0.0,
            alignments: vec![AlignmentRecord {
                query_seq: hsp.qseq.clone(),
                target_seq: hsp.hseq.clone(),
                midline: hsp.midline.clone(),
                query_start: hsp.query_from,
                query_end: hsp.query_to,
                target_start: hsp.hit_from,
                target_end: hsp.hit_to,
            }],
        });
        out.msa.sequences.push(MsaSequence {
            id: hit.id.clone(),
            name: hit.def.clone(),
            sequence: hsp.hseq.clone(),
            identity,
            database: DB.to_string(),
        });
    }

    out.alignments.databases.insert(
        DB.to_string(),
        DatabaseHits { total_hits: raw.hits.len(), hits },
    );
    out
}

// ── ColabFold MSA search ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColabFoldResults {
    #[serde(default)]
    pub alignments: BTreeMap<String, ColabFoldDatabase>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColabFoldDatabase {
    #[serde(default)]
    pub fasta: Option<FastaBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FastaBlock {
    #[serde(default, deserialize_with = "lenient_string")]
    pub alignment: String,
}

pub fn normalize_colabfold(raw: &ColabFoldResults, query: &str) -> UnifiedSearchResult {
    let mut out = UnifiedSearchResult::empty(SearchType::Colabfold, query);

    for (db_name, db) in &raw.alignments {
        let Some(block) = db.fasta.as_ref().filter(|f| !f.alignment.trim().is_empty()) else {
            continue;
        };
        let records = parse_fasta(&block.alignment);
        let reference = records.first().map(|r| r.sequence.clone()).unwrap_or_default();

        for record in &records {
            out.msa.sequences.push(MsaSequence {
                id: record.id().to_string(),
                name: record.header.clone(),
                identity: aligned_identity(&reference, &record.sequence),
                sequence: record.sequence.clone(),
                database: db_name.clone(),
            });
        }
        out.alignments.databases.insert(
            db_name.clone(),
            DatabaseHits { hits: Vec::new(), total_hits: records.len() },
        );
    }
    out
}

// ── Foldseek ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldseekResults {
    #[serde(default)]
    pub queries: Vec<FoldseekQuery>,
    #[serde(default)]
    pub results: Vec<FoldseekDatabaseResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldseekQuery {
    #[serde(default, deserialize_with = "lenient_string")]
    pub header: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sequence: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldseekDatabaseResult {
    #[serde(default, deserialize_with = "lenient_string")]
    pub db: String,
    /// The server groups alignments per query chain; older responses are flat.
    #[serde(default)]
    pub alignments: Option<FoldseekAlignments>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FoldseekAlignments {
    Grouped(Vec<Vec<FoldseekHit>>),
    Flat(Vec<FoldseekHit>),
}

impl FoldseekAlignments {
    fn into_hits(self) -> Vec<FoldseekHit> {
        match self {
            FoldseekAlignments::Grouped(groups) => groups.into_iter().flatten().collect(),
            FoldseekAlignments::Flat(hits) => hits,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FoldseekHit {
    #[serde(default, deserialize_with = "lenient_string")]
    pub target: String,
    #[serde(default, rename = "seqId", alias = "identity", deserialize_with = "lenient_f64")]
    pub seq_id: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub score: f64,
    #[serde(default, rename = "eval", alias = "evalue", deserialize_with = "lenient_f64")]
    pub eval: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub coverage: f64,
    #[serde(default, rename = "qAln", deserialize_with = "lenient_string")]
    pub q_aln: String,
    #[serde(default, rename = "dbAln", deserialize_with = "lenient_string")]
    pub db_aln: String,
    #[serde(default, rename = "tSeq", deserialize_with = "lenient_string")]
    pub t_seq: String,
    #[serde(default, rename = "qStartPos", deserialize_with = "lenient_u64")]
    pub q_start: u64,
    #[serde(default, rename = "qEndPos", deserialize_with = "lenient_u64")]
    pub q_end: u64,
    #[serde(default, rename = "dbStartPos", deserialize_with = "lenient_u64")]
    pub db_start: u64,
    #[serde(default, rename = "dbEndPos", deserialize_with = "lenient_u64")]
    pub db_end: u64,
    #[serde(default, rename = "dbLen", deserialize_with = "lenient_u64")]
    pub db_len: u64,
}

impl FoldseekHit {
    /// Foldseek targets read "<accession> <free-text description>".
    fn split_target(&self) -> (&str, &str) {
        match self.target.split_once(char::is_whitespace) {
            Some((id, rest)) => (id, rest.trim()),
            None => (self.target.as_str(), ""),
        }
    }
}

fn foldseek_midline(query: &str, target: &str) -> String {
    query
        .chars()
        .zip(target.chars())
        .map(|(q, t)| if q == t && q != '-' { '|' } else { ' ' })
        .collect()
}

pub fn normalize_foldseek(raw: &FoldseekResults, query: &str) -> UnifiedSearchResult {
    let query = if query.is_empty() {
        raw.queries.first().map(|q| q.sequence.as_str()).unwrap_or_default()
    } else {
        query
    };
    let mut out = UnifiedSearchResult::empty(SearchType::Foldseek, query);
    out.push_query(query, "foldseek");

    for db_result in &raw.results {
        let hits_raw = db_result.alignments.clone().map(FoldseekAlignments::into_hits).unwrap_or_default();
        let mut hits = Vec::with_capacity(hits_raw.len());

        for hit in &hits_raw {
            let (id, description) = hit.split_target();
            let identity = clamp_identity(hit.seq_id);
            let target_seq = if hit.db_aln.is_empty() { hit.t_seq.clone() } else { hit.db_aln.clone() };

            hits.push(Hit {
                id: id.to_string(),
                accession: id.to_string(),
                description: description.to_string(),
                length: hit.db_len,
                score: hit.score,
                evalue: hit.eval,
                identity,
                coverage: hit.coverage,
                alignments: vec![AlignmentRecord {
                    midline: foldseek_midline(&hit.q_aln, &target_seq),
                    query_seq: hit.q_aln.clone(),
                    target_seq: target_seq.clone(),
                    query_start: hit.q_start,
                    query_end: hit.q_end,
                    target_start: hit.db_start,
                    target_end: hit.db_end,
                }],
            });
            out.msa.sequences.push(MsaSequence {
                id: id.to_string(),
                name: description.to_string(),
                sequence: target_seq,
                identity,
                database: db_result.db.clone(),
            });
        }

        out.alignments.databases.insert(
            db_result.db.clone(),
            DatabaseHits { total_hits: hits.len(), hits },
        );
    }
    out
}

// ── Dispatch helper ───────────────────────────────────────────────────────────

/// Decode `raw` as the wire format of `search_type` and normalize it.
pub fn normalize_value(
    search_type: SearchType,
    raw: Value,
    query: &str,
) -> Result<UnifiedSearchResult, serde_json::Error> {
    Ok(match search_type {
        SearchType::Blast => normalize_blast(&serde_json::from_value(raw)?, query),
        SearchType::Colabfold => normalize_colabfold(&serde_json::from_value(raw)?, query),
        SearchType::Foldseek => normalize_foldseek(&serde_json::from_value(raw)?, query),
    })
}
