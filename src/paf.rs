//! minimap2 PAF output, reduced to what read-to-contig support needs.
//!
//! Only the query name, the target contig, the mapping quality (column 12)
//! and the `tp:A:` alignment-type tag are kept; the other mandatory columns
//! are checked for presence but not stored.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Where one read landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PafHit {
    pub read: String,
    pub contig: String,
    pub mapq: u8,
    /// False for secondary (`tp:A:S`) and inversion (`tp:A:i`/`tp:A:I`) hits.
    pub primary: bool,
}

impl PafHit {
    pub fn from_line(line: &str) -> Result<Self> {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 {
            anyhow::bail!("PAF line has {} columns, expected at least 12", cols.len());
        }

        let primary = match cols[12..].iter().find_map(|t| t.strip_prefix("tp:A:")) {
            Some(kind) => kind == "P",
            None => true,
        };

        Ok(Self {
            read: cols[0].to_string(),
            contig: cols[5].to_string(),
            mapq: cols[11]
                .parse()
                .with_context(|| format!("Bad mapping quality `{}`", cols[11]))?,
            primary,
        })
    }
}

/// Iterator over the hits of a PAF file; blank lines are ignored.
pub struct PafHits {
    lines: Lines<BufReader<File>>,
}

impl PafHits {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open PAF: {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for PafHits {
    type Item = Result<PafHit>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            match line {
                Ok(l) if l.trim().is_empty() => continue,
                Ok(l) => return Some(PafHit::from_line(l.trim_end())),
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }
}
