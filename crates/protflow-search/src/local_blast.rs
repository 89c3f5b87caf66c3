//! Local `blastp` against a database built by [`crate::database`].

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::normalizer::{normalize_blast, BlastHit, BlastHsp, BlastResults};
use crate::schema::{IdentityStats, UnifiedSearchResult};

/// Columns requested from `blastp -outfmt 6`, in order.
pub const OUTFMT_COLUMNS: &str =
    "6 qseqid sseqid pident length mismatch gapopen qstart qend sstart send evalue bitscore qseq sseq";

const MAX_HITS: usize = 40;
const MIN_IDENTITY: f64 = 40.0;
const DB_EXTENSIONS: [&str; 3] = ["phr", "pin", "psq"];

/// One row of tabular BLAST output.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularHit {
    pub qseqid: String,
    pub sseqid: String,
    pub pident: f64,
    pub length: u64,
    pub mismatch: u64,
    pub gapopen: u64,
    pub qstart: u64,
    pub qend: u64,
    pub sstart: u64,
    pub send: u64,
    pub evalue: f64,
    pub bitscore: f64,
    pub qseq: String,
    pub sseq: String,
}

impl TabularHit {
    fn parse(line: &str) -> Option<Self> {
        let cols: Vec<&str> = line.split('\t').map(str::trim).collect();
        if cols.len() < 14 {
            return None;
        }
        let f = |i: usize| cols[i].parse::<f64>().ok();
        let u = |i: usize| cols[i].parse::<u64>().ok();
        Some(Self {
            qseqid: cols[0].to_string(),
            sseqid: cols[1].to_string(),
            pident: f(2)?,
            length: u(3)?,
            mismatch: u(4)?,
            gapopen: u(5)?,
            qstart: u(6)?,
            qend: u(7)?,
            sstart: u(8)?,
            send: u(9)?,
            evalue: f(10)?,
            bitscore: f(11)?,
            qseq: cols[12].to_string(),
            sseq: cols[13].to_string(),
        })
    }

    fn midline(&self) -> String {
        self.qseq
            .chars()
            .zip(self.sseq.chars())
            .map(|(q, s)| if q == s { '|' } else { ' ' })
            .collect()
    }

    fn into_blast_hit(self) -> BlastHit {
        let accession = self.sseqid.split('|').next().unwrap_or_default().to_string();
        let midline = self.midline();
        BlastHit {
            id: self.sseqid.clone(),
            accession,
            def: self.sseqid,
            len: self.length,
            hsps: vec![BlastHsp {
                score: self.bitscore,
                evalue: self.evalue,
                identity: self.pident,
                qseq: self.qseq,
                hseq: self.sseq,
                midline,
                query_from: self.qstart,
                query_to: self.qend,
                hit_from: self.sstart,
                hit_to: self.send,
            }],
        }
    }
}

/// Parse `-outfmt 6` text with the [`OUTFMT_COLUMNS`] layout. Malformed lines are skipped.
pub fn parse_tabular(text: &str) -> Vec<TabularHit> {
    text.lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let parsed = TabularHit::parse(line);
            if parsed.is_none() {
                warn!(line, "Skipping malformed BLAST row");
            }
            parsed
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct LocalBlastReport {
    pub hits: BlastResults,
    /// Over every returned row, before the identity filter.
    pub statistics: IdentityStats,
    /// Gapped FASTA of the query and the kept hits.
    pub msa: String,
}

/// Rank rows by identity, keep the best [`MAX_HITS`] above [`MIN_IDENTITY`].
/// `None` when BLAST returned nothing.
pub fn build_report(query: &str, mut rows: Vec<TabularHit>) -> Option<LocalBlastReport> {
    if rows.is_empty() {
        return None;
    }
    let identities: Vec<f64> = rows.iter().map(|r| r.pident).collect();
    let statistics = IdentityStats {
        total_hits: rows.len(),
        min_identity: identities.iter().copied().fold(f64::INFINITY, f64::min),
        max_identity: identities.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        avg_identity: identities.iter().sum::<f64>() / identities.len() as f64,
    };

    rows.sort_by(|a, b| b.pident.total_cmp(&a.pident));
    let hits: Vec<BlastHit> = rows
        .into_iter()
        .take(MAX_HITS)
        .filter(|r| r.pident >= MIN_IDENTITY)
        .map(TabularHit::into_blast_hit)
        .collect();

    let mut msa = format!(">Query (100.00%)\n{query}\n");
    for hit in &hits {
        if let Some(hsp) = hit.hsps.first() {
            msa.push_str(&format!(">{} ({:.2}%)\n{}\n", hit.accession, hsp.identity, hsp.hseq));
        }
    }

    Some(LocalBlastReport { hits: BlastResults { hits }, statistics, msa })
}

/// Fails unless the protein database index files exist next to `db_path`.
pub fn check_database_files(db_path: &Path) -> Result<()> {
    for ext in DB_EXTENSIONS {
        let file = PathBuf::from(format!("{}.{ext}", db_path.display()));
        if !file.is_file() {
            bail!("Database file not found: {}", file.display());
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LocalBlastSearch {
    pub results: UnifiedSearchResult,
    pub statistics: IdentityStats,
    pub msa: String,
}

pub struct LocalBlastRunner {
    blastp: PathBuf,
}

impl LocalBlastRunner {
    pub fn new<P: AsRef<Path>>(blastp: P) -> Self {
        Self { blastp: blastp.as_ref().to_path_buf() }
    }

    /// Run `blastp` and return the raw tabular rows.
    pub async fn run(&self, sequence: &str, db_path: &Path) -> Result<Vec<TabularHit>> {
        check_database_files(db_path)?;

        let mut query = tempfile::Builder::new().suffix(".fasta").tempfile()?;
        write!(query, ">query\n{sequence}\n")?;
        query.flush()?;

        info!(db = %db_path.display(), "Running local blastp");
        let output = Command::new(&self.blastp)
            .arg("-db")
            .arg(db_path)
            .arg("-query")
            .arg(query.path())
            .arg("-outfmt")
            .arg(OUTFMT_COLUMNS)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to start {}", self.blastp.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("BLAST search failed: {}", stderr.trim());
        }
        let rows = parse_tabular(&String::from_utf8_lossy(&output.stdout));
        debug!(rows = rows.len(), "blastp finished");
        Ok(rows)
    }

    pub async fn search(&self, sequence: &str, db_path: &Path) -> Result<LocalBlastSearch> {
        let rows = self.run(sequence, db_path).await?;
        let report = build_report(sequence, rows).context("No significant hits found")?;
        Ok(LocalBlastSearch {
            results: normalize_blast(&report.hits, sequence),
            statistics: report.statistics,
            msa: report.msa,
        })
    }
}
