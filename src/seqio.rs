//! Sequence I/O Module
//!
//! Reading and writing of the flat-text sequence formats the pipeline
//! exchanges with its external tools.
//!
//! # Supported Formats
//! - FASTA: header plus one or more sequence lines (plain or gzipped on input)
//! - FASTQ: strict 4-line records (`@name`, sequence, `+`, quality)
//!
//! # Examples
//! ```no_run
//! use svspike::seqio::{read_single_sequence, FastqReader};
//!
//! let insertion = read_single_sequence("alu.fa").unwrap();
//! println!("{} bp", insertion.len());
//!
//! let mut reader = FastqReader::open("reads.1.fq").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{}: {} bp", record.name, record.seq.len());
//! }
//! ```

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Opens a file for buffered reading, gunzipping when the name ends in `.gz`.
fn open_text<P: AsRef<Path>>(path: P, kind: &str) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {}: {}", kind, path.display()))?;

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::with_capacity(
            1024 * 1024,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(1024 * 1024, file)))
    }
}

// ============================================================================
// FASTA Format
// ============================================================================

/// One FASTA entry; `name` is the header up to the first whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub name: String,
    pub seq: String,
}

/// Loads every record of a FASTA file (plain or `.gz`).
///
/// # Arguments
/// * `path` - FASTA file, e.g. MEGAHIT's `final.contigs.fa`
///
/// # Returns
/// Records in file order. Lines before the first header are ignored; blank
/// lines inside a record contribute nothing.
pub fn read_fasta_records<P: AsRef<Path>>(path: P) -> Result<Vec<FastaRecord>> {
    let path = path.as_ref();
    let mut records: Vec<FastaRecord> = Vec::new();

    for line in open_text(path, "FASTA")?.lines() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if let Some(header) = line.strip_prefix('>') {
            records.push(FastaRecord {
                name: header.split_whitespace().next().unwrap_or("").to_string(),
                seq: String::new(),
            });
        } else if let Some(current) = records.last_mut() {
            current.seq.push_str(line.trim());
        }
    }
    Ok(records)
}

/// Loads a single-record FASTA into one sequence string.
///
/// # Arguments
/// * `path` - FASTA file (plain or `.gz`)
///
/// # Returns
/// Every line that is not a `>` header, trimmed and concatenated, so a file
/// holding several records yields their sequences joined end to end.
///
/// # Errors
/// `Format` when the file holds no sequence at all.
pub fn read_single_sequence<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let reader = open_text(path, "FASTA")?;

    let mut seq = String::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if !line.starts_with('>') {
            seq.push_str(line.trim());
        }
    }

    if seq.is_empty() {
        return Err(Error::format(path, "no sequence found").into());
    }
    log::debug!("Loaded {} bp from {}", seq.len(), path.display());
    Ok(seq)
}

/// Writes `seq` as a one-record FASTA file.
pub fn write_single_fasta<P: AsRef<Path>>(path: P, name: &str, seq: &str) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
    );
    writeln!(writer, ">{}", name)?;
    writeln!(writer, "{}", seq)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// FASTQ Format
// ============================================================================

/// A read as wgsim writes it; `name` is the whole header after `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    pub name: String,
    pub seq: String,
    pub qual: String,
}

/// Strict FASTQ reader.
///
/// Unlike a lenient parser this one rejects anything that breaks the
/// name/sequence/separator/quality cadence with a `Format` error.
pub struct FastqReader {
    reader: Box<dyn BufRead>,
    path: PathBuf,
    line_buf: String,
    line_no: usize,
}

impl FastqReader {
    /// Opens a FASTQ file (plain or `.gz`).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            reader: open_text(path, "FASTQ")?,
            path: path.to_path_buf(),
            line_buf: String::with_capacity(512),
            line_no: 0,
        })
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        self.line_buf.clear();
        if self.reader.read_line(&mut self.line_buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(self.line_buf.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn truncated(&self) -> Error {
        Error::format(
            &self.path,
            format!(
                "truncated record after line {} (line count is not a multiple of 4)",
                self.line_no
            ),
        )
    }

    /// Next record, or `Ok(None)` when the file ends on a record boundary.
    pub fn read_next(&mut self) -> Result<Option<FastqRecord>> {
        let header = match self.next_line()? {
            Some(h) => h,
            None => return Ok(None),
        };
        let name = match header.strip_prefix('@') {
            Some(n) => n.to_string(),
            None => {
                return Err(Error::format(
                    &self.path,
                    format!("line {}: expected '@' header, found `{}`", self.line_no, header),
                )
                .into())
            }
        };

        let seq = self.next_line()?.ok_or_else(|| self.truncated())?;

        // separator text is discarded
        let sep = self.next_line()?.ok_or_else(|| self.truncated())?;
        if !sep.starts_with('+') {
            return Err(Error::format(
                &self.path,
                format!("line {}: expected '+' separator, found `{}`", self.line_no, sep),
            )
            .into());
        }

        let qual = self.next_line()?.ok_or_else(|| self.truncated())?;

        Ok(Some(FastqRecord { name, seq, qual }))
    }

    /// Reads every remaining record.
    pub fn read_all(&mut self) -> Result<Vec<FastqRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.read_next()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Buffered FASTQ writer emitting a bare `+` separator.
pub struct FastqWriter {
    writer: BufWriter<File>,
}

impl FastqWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create FASTQ: {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn write_record(&mut self, name: &str, seq: &str, qual: &str) -> Result<()> {
        writeln!(self.writer, "@{}\n{}\n+\n{}", name, seq, qual)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Sequence Utilities
// ============================================================================

/// Reverse complement of a nucleotide sequence; non-ACGT bases become N.
pub fn reverse_complement(seq: &str) -> String {
    seq.chars()
        .rev()
        .map(|c| match c.to_ascii_uppercase() {
            'A' => 'T',
            'T' => 'A',
            'G' => 'C',
            'C' => 'G',
            _ => 'N',
        })
        .collect()
}
