//! Variant Specification Module
//!
//! Parses the whitespace-delimited variant file, one request per line:
//!
//! ```text
//! #chrom  start  end   action  [insertion.fa]  [tsd_len]
//! chr1    1000   2000  INS     alu.fa          10
//! chr2    5000   5600  INV
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// The structural change to make in a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Insert the sequence loaded from `source`, flanked by a target-site
    /// duplication of `tsd_len` bases.
    Insertion { source: PathBuf, tsd_len: usize },
    Inversion,
    Deletion,
    Duplication,
}

impl Action {
    /// Token used for the action in the variant file.
    pub fn token(&self) -> &'static str {
        match self {
            Action::Insertion { .. } => "INS",
            Action::Inversion => "INV",
            Action::Deletion => "DEL",
            Action::Duplication => "DUP",
        }
    }
}

/// One parsed line of the variant file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantRequest {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub action: Action,
}

impl VariantRequest {
    /// `chrom:start-end`, as used in logs and reports.
    pub fn region_label(&self) -> String {
        format!("{}:{}-{}", self.chrom, self.start, self.end)
    }

    /// Filesystem-safe form of the region, `chrom_start_end`.
    pub fn file_stem(&self) -> String {
        let chrom: String = self
            .chrom
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        format!("{}_{}_{}", chrom, self.start, self.end)
    }
}

impl fmt::Display for VariantRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.region_label(), self.action.token())
    }
}

/// Parses one variant file line.
///
/// # Returns
/// - `Ok(None)` for blank and `#` comment lines
/// - `Ok(Some(request))` for a well-formed line
///
/// # Errors
/// - `Parse` for missing fields, bad coordinates, an unknown action token
///   or a non-numeric TSD length
/// - `Configuration` for an INS line without an insertion source
pub fn parse_variant_line(line_no: usize, line: &str) -> Result<Option<VariantRequest>, Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let parse_err = |reason: String| Error::Parse {
        line_no,
        line: trimmed.to_string(),
        reason,
    };

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(parse_err(format!(
            "expected at least 4 fields (chrom start end action), found {}",
            fields.len()
        )));
    }

    let start: u64 = fields[1]
        .parse()
        .map_err(|_| parse_err(format!("invalid start `{}`", fields[1])))?;
    let end: u64 = fields[2]
        .parse()
        .map_err(|_| parse_err(format!("invalid end `{}`", fields[2])))?;
    if end < start {
        return Err(parse_err(format!("end {} is before start {}", end, start)));
    }

    let action = match fields[3] {
        "INS" => {
            let source = fields.get(4).ok_or_else(|| {
                Error::Configuration(format!(
                    "line {}: INS requires an insertion sequence file: `{}`",
                    line_no, trimmed
                ))
            })?;
            let tsd_len = match fields.get(5) {
                Some(t) => t
                    .parse()
                    .map_err(|_| parse_err(format!("invalid TSD length `{}`", t)))?,
                None => 0,
            };
            Action::Insertion {
                source: PathBuf::from(*source),
                tsd_len,
            }
        }
        "INV" => Action::Inversion,
        "DEL" => Action::Deletion,
        "DUP" => Action::Duplication,
        other => {
            return Err(parse_err(format!(
                "mutation `{}` not one of: INS,INV,DEL,DUP",
                other
            )))
        }
    };

    Ok(Some(VariantRequest {
        chrom: fields[0].to_string(),
        start,
        end,
        action,
    }))
}

/// Line-by-line reader over a variant file.
///
/// Yields `(line_no, parsed)` for every line that is not blank or a comment,
/// so one bad line never hides the ones after it.
pub struct VariantFile {
    reader: BufReader<File>,
    line_buf: String,
    line_no: usize,
}

impl VariantFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open variant file: {}", path.as_ref().display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            line_buf: String::with_capacity(256),
            line_no: 0,
        })
    }
}

impl Iterator for VariantFile {
    type Item = Result<(usize, Result<VariantRequest, Error>)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line_buf.clear();
            match self.reader.read_line(&mut self.line_buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_no += 1;

            match parse_variant_line(self.line_no, &self.line_buf) {
                Ok(None) => continue,
                Ok(Some(request)) => return Some(Ok((self.line_no, Ok(request)))),
                Err(e) => return Some(Ok((self.line_no, Err(e)))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_insertion_with_tsd() {
        let req = parse_variant_line(1, "chr1 1000 2000 INS ins.fa 10")
            .unwrap()
            .unwrap();
        assert_eq!(req.chrom, "chr1");
        assert_eq!(req.start, 1000);
        assert_eq!(req.end, 2000);
        assert_eq!(
            req.action,
            Action::Insertion {
                source: PathBuf::from("ins.fa"),
                tsd_len: 10
            }
        );
        assert_eq!(req.region_label(), "chr1:1000-2000");
    }

    #[test]
    fn test_parse_insertion_default_tsd() {
        let req = parse_variant_line(1, "chr1\t5\t9\tINS\tins.fa").unwrap().unwrap();
        assert_eq!(
            req.action,
            Action::Insertion {
                source: PathBuf::from("ins.fa"),
                tsd_len: 0
            }
        );
    }

    #[test]
    fn test_parse_other_actions() {
        for (token, action) in [
            ("INV", Action::Inversion),
            ("DEL", Action::Deletion),
            ("DUP", Action::Duplication),
        ] {
            let line = format!("chr2 10 20 {}", token);
            let req = parse_variant_line(3, &line).unwrap().unwrap();
            assert_eq!(req.action, action);
            assert_eq!(req.action.token(), token);
        }
    }

    #[test]
    fn test_skips_blank_and_comment() {
        assert!(parse_variant_line(1, "").unwrap().is_none());
        assert!(parse_variant_line(2, "   \n").unwrap().is_none());
        assert!(parse_variant_line(3, "#chrom start end action").unwrap().is_none());
    }

    #[test]
    fn test_unknown_action_is_parse_error() {
        let err = parse_variant_line(7, "chr1 1 2 SNP").unwrap_err();
        match err {
            Error::Parse { line_no, ref line, .. } => {
                assert_eq!(line_no, 7);
                assert_eq!(line, "chr1 1 2 SNP");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_insertion_without_source_is_configuration_error() {
        let err = parse_variant_line(1, "chr1 1 2 INS").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(
            parse_variant_line(1, "chr1 1 2").unwrap_err(),
            Error::Parse { .. }
        ));
        assert!(matches!(
            parse_variant_line(1, "chr1 x 2 INV").unwrap_err(),
            Error::Parse { .. }
        ));
        assert!(matches!(
            parse_variant_line(1, "chr1 20 10 INV").unwrap_err(),
            Error::Parse { .. }
        ));
        assert!(matches!(
            parse_variant_line(1, "chr1 1 2 INS a.fa ten").unwrap_err(),
            Error::Parse { .. }
        ));
    }

    #[test]
    fn test_variant_file_keeps_going_after_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.txt");
        fs::write(&path, "# header\nchr1 1 2 BAD\n\nchr1 10 20 DEL\n").unwrap();

        let items: Vec<_> = VariantFile::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, 2);
        assert!(items[0].1.is_err());
        assert_eq!(items[1].0, 4);
        assert_eq!(items[1].1.as_ref().unwrap().action, Action::Deletion);
    }

    #[test]
    fn test_file_stem_is_path_safe() {
        let req = parse_variant_line(1, "HLA-A*01:01 1 2 DEL").unwrap().unwrap();
        assert_eq!(req.file_stem(), "HLA-A_01_01_1_2");
    }
}
