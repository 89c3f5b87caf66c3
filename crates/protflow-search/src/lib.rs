//! Protflow Search - similarity and structure search.
//!
//! Three families of search tools report hits in unrelated wire formats:
//! 1. BLAST-family (NCBI BLAST, local `blastp`): hits with HSPs
//! 2. MSA search (ColabFold via NVCF): per-database FASTA alignment blocks
//! 3. Fold search (Foldseek): per-database structural hits
//!
//! [`normalizer`] maps each of them into one [`schema::UnifiedSearchResult`].

pub mod colabfold;
pub mod database;
pub mod fasta;
pub mod foldseek;
pub mod local_blast;
pub mod ncbi;
pub mod normalizer;
pub mod numeric;
pub mod schema;

pub use normalizer::{normalize_blast, normalize_colabfold, normalize_foldseek};
pub use schema::{SearchType, UnifiedSearchResult};

pub type Result<T> = anyhow::Result<T>;
