//! Read Simulation Module
//!
//! Re-derives paired-end reads from a mutated contig with wgsim, then
//! renames the simulated reads so that pairs already complete in the original
//! data keep their read names. Only the extra coverage the region needs gets
//! simulator-native names.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::assemble::Contig;
use crate::census::ReadNameCensus;
use crate::error::Error;
use crate::seqio::{write_single_fasta, FastqReader, FastqWriter};
use crate::tools::{CancelFlag, ToolCommand};

/// Knobs passed through to the simulator. Error and mutation rates stay zero
/// so the only change in the reads is the one made to the contig.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub read_length: usize,
    pub base_error_rate: f64,
    pub mutation_rate: f64,
    pub indel_fraction: f64,
    pub timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            read_length: 100,
            base_error_rate: 0.0,
            mutation_rate: 0.0,
            indel_fraction: 0.0,
            timeout: None,
            cancel: CancelFlag::new(),
        }
    }
}

/// A paired-end read simulator.
pub trait ReadSimulator {
    /// Simulates `pairs` read pairs from `fasta` into `fq1`/`fq2`.
    fn simulate(&self, fasta: &Path, pairs: usize, fq1: &Path, fq2: &Path) -> Result<()>;
}

/// wgsim wrapper.
pub struct Wgsim {
    program: PathBuf,
    config: SimulatorConfig,
}

impl Wgsim {
    pub fn new(program: impl Into<PathBuf>, config: SimulatorConfig) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }
}

impl ReadSimulator for Wgsim {
    fn simulate(&self, fasta: &Path, pairs: usize, fq1: &Path, fq2: &Path) -> Result<()> {
        let len = self.config.read_length.to_string();
        ToolCommand::new(&self.program)
            .arg("-e")
            .arg(self.config.base_error_rate.to_string())
            .arg("-N")
            .arg(pairs.to_string())
            .arg("-1")
            .arg(&len)
            .arg("-2")
            .arg(&len)
            .arg("-r")
            .arg(self.config.mutation_rate.to_string())
            .arg("-R")
            .arg(self.config.indel_fraction.to_string())
            .arg(fasta)
            .arg(fq1)
            .arg(fq2)
            .timeout(self.config.timeout)
            .cancel_on(&self.config.cancel)
            .run()
            .context("wgsim failed")?;
        Ok(())
    }
}

/// The two mate files of a simulated, renamed read set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedPair {
    pub fq1: PathBuf,
    pub fq2: PathBuf,
    pub pairs: usize,
}

/// Identity for a simulated read: the next pooled name while any remain,
/// otherwise the simulator's own name with its mate suffix removed.
fn read_identity(index: usize, names: &[String], simulated: &str) -> String {
    match names.get(index) {
        Some(name) => name.clone(),
        None => simulated
            .strip_suffix("/1")
            .or_else(|| simulated.strip_suffix("/2"))
            .unwrap_or(simulated)
            .to_string(),
    }
}

/// Rewrites a FASTQ file in place, renaming the i-th record to `names[i]`
/// while names last.
///
/// # Arguments
/// * `path` - One mate file as written by the simulator
/// * `names` - Paired read names, in census order
///
/// # Returns
/// The number of records, which never changes. Sequence and quality lines
/// are copied verbatim and the separator is regenerated as a bare `+`.
///
/// # Errors
/// `Format` when the file breaks the 4-line FASTQ cadence; the file is left
/// untouched in that case.
pub fn rename_fastq(path: &Path, names: &[String]) -> Result<usize> {
    // Read everything first so a malformed file is never half-rewritten.
    let records = FastqReader::open(path)?.read_all()?;

    let mut writer = FastqWriter::create(path)?;
    for (i, record) in records.iter().enumerate() {
        let name = read_identity(i, names, &record.name);
        writer.write_record(&name, &record.seq, &record.qual)?;
    }
    writer.finish()?;

    Ok(records.len())
}

/// Simulates reads for a mutated contig inside `workdir`.
///
/// # Arguments
/// * `simulator` - Read simulator to drive
/// * `contig` - The selected contig; its supporting reads set the pair count
/// * `sequence` - The (possibly mutated) sequence to simulate from
/// * `workdir` - Region scratch directory
///
/// # Returns
/// `None` when the supporting reads call for zero pairs, making the region a
/// no-op; otherwise the renamed mate files.
///
/// # Errors
/// `Format` when the mate files break FASTQ structure or disagree on their
/// record count.
pub fn simulate_reads(
    simulator: &dyn ReadSimulator,
    contig: &Contig,
    sequence: &str,
    workdir: &Path,
) -> Result<Option<SimulatedPair>> {
    let census = ReadNameCensus::from_names(&contig.supporting_reads);
    log::info!("Read census for {}: {}", contig.name, census);

    let pairs = census.target_pair_count();
    if pairs == 0 {
        return Ok(None);
    }

    let fasta = tempfile::Builder::new()
        .prefix("wgsim_")
        .suffix(".fasta")
        .tempfile_in(workdir)
        .context("Failed to create simulator FASTA")?;
    write_single_fasta(fasta.path(), "target", sequence)?;

    let stem = fasta
        .path()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("wgsim")
        .to_string();
    let fq1 = workdir.join(format!("{}.1.fq", stem));
    let fq2 = workdir.join(format!("{}.2.fq", stem));

    simulator.simulate(fasta.path(), pairs, &fq1, &fq2)?;

    let n1 = rename_fastq(&fq1, &census.paired_names)?;
    let n2 = rename_fastq(&fq2, &census.paired_names)?;
    if n1 != n2 {
        return Err(Error::format(
            &fq2,
            format!("{} records but {} has {}; mates cannot be paired", n2, fq1.display(), n1),
        )
        .into());
    }
    log::info!(
        "Simulated {} pairs ({} requested), {} keep original names",
        n1,
        pairs,
        n1.min(census.paired_count())
    );

    Ok(Some(SimulatedPair {
        fq1,
        fq2,
        pairs: n1,
    }))
}
