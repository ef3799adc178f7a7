//! Remapping Module
//!
//! Aligns simulated mate files back to the reference with `bwa aln`/`sampe`
//! and converts the SAM to BAM with samtools. Per-region BAMs are merged into
//! the final output in one step once every region has been processed.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::tools::{CancelFlag, ToolCommand};

// ============================================================================
// Remapping
// ============================================================================

#[derive(Debug, Clone)]
pub struct RemapConfig {
    pub threads: usize,
    pub timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            timeout: None,
            cancel: CancelFlag::new(),
        }
    }
}

/// Aligns read pairs and assembles the final alignment file.
pub trait Remapper {
    /// Aligns one region's mate files.
    ///
    /// # Arguments
    /// * `fq1`, `fq2` - Renamed mate files with matching record order
    /// * `workdir` - Region scratch directory for intermediates
    /// * `out_bam` - Region BAM to write
    fn remap(&self, fq1: &Path, fq2: &Path, workdir: &Path, out_bam: &Path) -> Result<()>;

    /// Combines per-region BAMs into `out_bam`.
    ///
    /// # Errors
    /// `Configuration` when `parts` is empty.
    fn merge(&self, parts: &[PathBuf], out_bam: &Path) -> Result<()>;
}

/// bwa + samtools remapper against an indexed reference.
pub struct BwaRemapper {
    bwa: PathBuf,
    samtools: PathBuf,
    reference: PathBuf,
    config: RemapConfig,
}

impl BwaRemapper {
    pub fn new(
        bwa: impl Into<PathBuf>,
        samtools: impl Into<PathBuf>,
        reference: impl Into<PathBuf>,
        config: RemapConfig,
    ) -> Self {
        Self {
            bwa: bwa.into(),
            samtools: samtools.into(),
            reference: reference.into(),
            config,
        }
    }

    fn fai(&self) -> PathBuf {
        index_path(&self.reference, "fai")
    }

    fn aln(&self, fq: &Path, sai: &Path) -> Result<()> {
        ToolCommand::new(&self.bwa)
            .arg("aln")
            .arg(&self.reference)
            .args(["-q", "5", "-l", "32", "-k", "2", "-t"])
            .arg(self.config.threads.to_string())
            .args(["-o", "1", "-f"])
            .arg(sai)
            .arg(fq)
            .timeout(self.config.timeout)
            .cancel_on(&self.config.cancel)
            .run()
            .with_context(|| format!("bwa aln failed for {}", fq.display()))?;
        Ok(())
    }
}

/// `ref.fa` -> `ref.fa.<ext>`
pub fn index_path(reference: &Path, ext: &str) -> PathBuf {
    let mut name = reference.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

impl Remapper for BwaRemapper {
    fn remap(&self, fq1: &Path, fq2: &Path, workdir: &Path, out_bam: &Path) -> Result<()> {
        let base = tempfile::Builder::new()
            .prefix("bwatmp_")
            .tempdir_in(workdir)
            .context("Failed to create remap scratch directory")?;
        let sai1 = base.path().join("1.sai");
        let sai2 = base.path().join("2.sai");
        let sam = base.path().join("pairs.sam");

        log::info!("Mapping 1st end: {}", fq1.display());
        self.aln(fq1, &sai1)?;
        log::info!("Mapping 2nd end: {}", fq2.display());
        self.aln(fq2, &sai2)?;

        log::info!("Pairing ends");
        ToolCommand::new(&self.bwa)
            .args(["sampe", "-P", "-f"])
            .arg(&sam)
            .arg(&self.reference)
            .arg(&sai1)
            .arg(&sai2)
            .arg(fq1)
            .arg(fq2)
            .timeout(self.config.timeout)
            .cancel_on(&self.config.cancel)
            .run()
            .context("bwa sampe failed")?;

        log::info!("SAM -> BAM: {}", out_bam.display());
        ToolCommand::new(&self.samtools)
            .args(["view", "-bt"])
            .arg(self.fai())
            .arg("-o")
            .arg(out_bam)
            .arg(&sam)
            .timeout(self.config.timeout)
            .cancel_on(&self.config.cancel)
            .run()
            .context("samtools view failed")?;

        Ok(())
    }

    fn merge(&self, parts: &[PathBuf], out_bam: &Path) -> Result<()> {
        match parts {
            [] => Err(Error::Configuration("no region produced an alignment to merge".into()).into()),
            [single] => move_file(single, out_bam),
            _ => {
                log::info!("Merging {} region BAMs into {}", parts.len(), out_bam.display());
                ToolCommand::new(&self.samtools)
                    .args(["merge", "-f", "-@"])
                    .arg(self.config.threads.to_string())
                    .arg(out_bam)
                    .args(parts.iter().map(|p| p.as_os_str().to_os_string()))
                    .timeout(self.config.timeout)
                    .cancel_on(&self.config.cancel)
                    .run()
                    .context("samtools merge failed")?;
                Ok(())
            }
        }
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Renames `from` to `to`, copying when they sit on different filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to).with_context(|| {
            format!("Failed to copy {} to {}", from.display(), to.display())
        })?;
        fs::remove_file(from).ok();
    }
    Ok(())
}
