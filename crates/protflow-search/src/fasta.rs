//! Minimal FASTA reading and writing.

#[derive(Debug, Clone, PartialEq)]
pub struct FastaRecord {
    /// Header line without the leading `>`.
    pub header: String,
    pub sequence: String,
}

impl FastaRecord {
    /// Identifier: the header up to the first `|`, tab or space.
    pub fn id(&self) -> &str {
        self.header
            .split(['|', '\t', ' '])
            .next()
            .unwrap_or_default()
    }
}

/// Parse FASTA text. Lines before the first header are ignored; sequence lines
/// are concatenated with surrounding whitespace removed.
pub fn parse_fasta(text: &str) -> Vec<FastaRecord> {
    let mut records = Vec::new();
    let mut current: Option<FastaRecord> = None;

    for line in text.lines() {
        if let Some(header) = line.strip_prefix('>') {
            if let Some(done) = current.take() {
                records.push(done);
            }
            current = Some(FastaRecord {
                header: header.trim().to_string(),
                sequence: String::new(),
            });
        } else if let Some(record) = current.as_mut() {
            record.sequence.push_str(line.trim());
        }
    }
    if let Some(done) = current {
        records.push(done);
    }
    records.retain(|r| !r.header.is_empty());
    records
}

pub fn write_fasta<'a>(records: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (header, sequence) in records {
        out.push('>');
        out.push_str(header);
        out.push('\n');
        out.push_str(sequence);
        out.push('\n');
    }
    out
}

/// Percent identity of `target` against an aligned `query` row.
///
/// Lower-case letters in `target` are a3m insertions and are dropped first. Rows of
/// different aligned length cannot be compared and score 0. Columns where either
/// row has a gap are not counted.
pub fn aligned_identity(query: &str, target: &str) -> f64 {
    let target: Vec<char> = target.chars().filter(|c| !c.is_ascii_lowercase()).collect();
    let query: Vec<char> = query.chars().collect();
    if query.len() != target.len() || query.is_empty() {
        return 0.0;
    }

    let (mut compared, mut matches) = (0usize, 0usize);
    for (q, t) in query.iter().zip(target.iter()) {
        if *q == '-' || *t == '-' {
            continue;
        }
        compared += 1;
        if q.eq_ignore_ascii_case(t) {
            matches += 1;
        }
    }
    if compared == 0 {
        0.0
    } else {
        matches as f64 / compared as f64 * 100.0
    }
}
