//! Local Assembly Module
//!
//! Builds contigs for one variant region from the reads aligned there.
//! The assembly itself is done by MEGAHIT; this module gathers the region's
//! reads (and their mates) from the indexed BAM, runs the assembler, and maps
//! the reads back onto the contigs with minimap2 to learn which reads
//! support which contig.
//!
//! # Workflow
//! ```text
//! BAM region (+ mates) → reads.fq (+ reference slice) → MEGAHIT → contigs
//!                      → minimap2 -x sr → supporting reads per contig
//! ```

use anyhow::{Context, Result};
use rust_htslib::bam::{self, Read as BamRead};
use rust_htslib::faidx;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::paf::PafHits;
use crate::seqio::{read_fasta_records, reverse_complement, write_single_fasta, FastqWriter};
use crate::tools::{CancelFlag, ToolCommand};
use crate::variant::VariantRequest;

/// An assembled local sequence and the reads it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub sequence: String,
    /// Base read names, one entry per supporting read (mates share a name).
    pub supporting_reads: Vec<String>,
}

impl Contig {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Picks the longest contig; ties keep the first one encountered.
pub fn select_largest_contig(contigs: Vec<Contig>, region: &str) -> Result<Contig, Error> {
    let mut best: Option<Contig> = None;
    for contig in contigs {
        match &best {
            Some(b) if b.len() >= contig.len() => {}
            _ => best = Some(contig),
        }
    }
    best.ok_or_else(|| Error::NoContig {
        region: region.to_string(),
    })
}

/// Produces contigs for a region.
pub trait Assembler {
    /// Assembles the reads of `request`'s region. Scratch files go in `workdir`.
    fn assemble(&mut self, request: &VariantRequest, workdir: &Path) -> Result<Vec<Contig>>;

    /// Called with the contig chosen for mutation, once per region.
    fn consume(&mut self, _contig: &Contig) {}
}

#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    pub kmer_size: usize,
    /// Assemble from reads only, without the reference slice.
    pub no_ref: bool,
    /// Allow reads used by an earlier region to support later regions.
    pub recycle: bool,
    pub min_contig_len: usize,
    pub threads: usize,
    pub timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            kmer_size: 31,
            no_ref: false,
            recycle: false,
            min_contig_len: 200,
            threads: 4,
            timeout: None,
            cancel: CancelFlag::new(),
        }
    }
}

/// A read pulled from the alignment, restored to sequencing orientation.
#[derive(Debug, Clone)]
struct RegionRead {
    name: String,
    /// 1 or 2 for paired reads, 0 for unpaired.
    mate: u8,
    seq: String,
    qual: String,
}

impl RegionRead {
    fn from_record(record: &bam::Record) -> Self {
        let mut seq = String::from_utf8_lossy(&record.seq().as_bytes()).into_owned();
        let raw_qual = record.qual();
        let mut qual: String = if raw_qual.iter().all(|&q| q == 255) {
            "I".repeat(seq.len())
        } else {
            raw_qual.iter().map(|&q| (q.min(93) + 33) as char).collect()
        };
        if record.is_reverse() {
            seq = reverse_complement(&seq);
            qual = qual.chars().rev().collect();
        }

        let mate = if !record.is_paired() {
            0
        } else if record.is_first_in_template() {
            1
        } else {
            2
        };

        Self {
            name: String::from_utf8_lossy(record.qname()).into_owned(),
            mate,
            seq,
            qual,
        }
    }

    fn fastq_name(&self) -> String {
        match self.mate {
            0 => self.name.clone(),
            m => format!("{}/{}", self.name, m),
        }
    }
}

/// Strips whitespace-separated comments and a trailing `/1` or `/2`.
pub fn normalize_read_name(name: &str) -> String {
    let name = name.split_whitespace().next().unwrap_or(name);
    name.strip_suffix("/1")
        .or_else(|| name.strip_suffix("/2"))
        .unwrap_or(name)
        .to_string()
}

/// Assigns each primary read hit in `paf_path` to its contig.
///
/// Each read counts once; both mates of a pair on the same contig give the
/// contig two entries for the base name.
pub fn assign_supporting_reads(contigs: &mut [Contig], paf_path: &Path) -> Result<()> {
    let by_name: FxHashMap<String, usize> = contigs
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.clone(), i))
        .collect();
    let mut seen: FxHashSet<String> = FxHashSet::default();

    for hit in PafHits::open(paf_path)? {
        let hit = hit?;
        if !hit.primary || !seen.insert(hit.read.clone()) {
            continue;
        }
        if let Some(&idx) = by_name.get(&hit.contig) {
            contigs[idx]
                .supporting_reads
                .push(normalize_read_name(&hit.read));
        }
    }
    Ok(())
}

/// MEGAHIT-backed assembler over an indexed BAM and reference.
pub struct MegahitAssembler {
    bam_path: PathBuf,
    reference: PathBuf,
    megahit: PathBuf,
    minimap2: PathBuf,
    config: AssemblyConfig,
    used_reads: FxHashSet<String>,
}

impl MegahitAssembler {
    pub fn new(
        bam_path: impl Into<PathBuf>,
        reference: impl Into<PathBuf>,
        megahit: impl Into<PathBuf>,
        minimap2: impl Into<PathBuf>,
        config: AssemblyConfig,
    ) -> Self {
        Self {
            bam_path: bam_path.into(),
            reference: reference.into(),
            megahit: megahit.into(),
            minimap2: minimap2.into(),
            config,
            used_reads: FxHashSet::default(),
        }
    }

    /// Collects primary reads overlapping the region, then fetches the
    /// missing mates through a second reader so the region cursor is never
    /// disturbed.
    fn extract_region_reads(&self, request: &VariantRequest) -> Result<Vec<RegionRead>> {
        let mut bam = bam::IndexedReader::from_path(&self.bam_path)
            .map_err(Error::from)
            .with_context(|| format!("Failed to open BAM: {}", self.bam_path.display()))?;
        let mut mates = bam::IndexedReader::from_path(&self.bam_path)
            .map_err(Error::from)
            .with_context(|| format!("Failed to open BAM: {}", self.bam_path.display()))?;

        bam.fetch((request.chrom.as_str(), request.start as i64, request.end as i64))
            .map_err(Error::from)
            .with_context(|| format!("Failed to fetch region {}", request.region_label()))?;

        let mut reads = Vec::new();
        let mut seen: FxHashSet<(String, u8)> = FxHashSet::default();
        // name -> (mate tid, mate pos, missing mate number)
        let mut wanted: FxHashMap<String, (i32, i64, u8)> = FxHashMap::default();

        for result in bam.records() {
            let record = result.map_err(Error::from)?;
            if record.is_unmapped() || record.is_secondary() || record.is_supplementary() {
                continue;
            }
            let read = RegionRead::from_record(&record);
            if !self.config.recycle && self.used_reads.contains(&read.name) {
                continue;
            }
            if !seen.insert((read.name.clone(), read.mate)) {
                continue;
            }
            if read.mate != 0 && !record.is_mate_unmapped() {
                let other = 3 - read.mate;
                if seen.contains(&(read.name.clone(), other)) {
                    wanted.remove(&read.name);
                } else {
                    wanted.insert(read.name.clone(), (record.mtid(), record.mpos(), other));
                }
            }
            reads.push(read);
        }

        let mut found = 0usize;
        for (name, (mtid, mpos, mate)) in &wanted {
            if *mtid < 0 {
                continue;
            }
            mates
                .fetch((*mtid, *mpos, *mpos + 1))
                .map_err(Error::from)
                .with_context(|| format!("Failed to fetch mate of {}", name))?;
            for result in mates.records() {
                let record = result.map_err(Error::from)?;
                if record.is_secondary() || record.is_supplementary() || record.qname() != name.as_bytes() {
                    continue;
                }
                let read = RegionRead::from_record(&record);
                if read.mate == *mate {
                    reads.push(read);
                    found += 1;
                    break;
                }
            }
        }

        log::info!(
            "{}: {} reads in region, {} of {} outside mates recovered",
            request.region_label(),
            reads.len() - found,
            found,
            wanted.len()
        );
        Ok(reads)
    }

    fn write_reference_slice(&self, request: &VariantRequest, path: &Path) -> Result<bool> {
        let reader = faidx::Reader::from_path(&self.reference)
            .map_err(Error::from)
            .with_context(|| format!("Failed to open reference: {}", self.reference.display()))?;
        if request.end <= request.start {
            return Ok(false);
        }
        let seq = reader
            .fetch_seq_string(&request.chrom, request.start as usize, request.end as usize - 1)
            .map_err(Error::from)
            .with_context(|| format!("Failed to fetch reference for {}", request.region_label()))?;
        if seq.is_empty() {
            return Ok(false);
        }
        write_single_fasta(path, &format!("ref_{}", request.file_stem()), &seq.to_ascii_uppercase())?;
        Ok(true)
    }
}

impl Assembler for MegahitAssembler {
    fn assemble(&mut self, request: &VariantRequest, workdir: &Path) -> Result<Vec<Contig>> {
        let reads = self.extract_region_reads(request)?;
        if reads.is_empty() {
            return Ok(Vec::new());
        }

        let reads_fq = workdir.join("region_reads.fq");
        let mut writer = FastqWriter::create(&reads_fq)?;
        for read in &reads {
            writer.write_record(&read.fastq_name(), &read.seq, &read.qual)?;
        }
        writer.finish()?;

        let mut inputs = reads_fq.to_string_lossy().into_owned();
        if !self.config.no_ref {
            let ref_fa = workdir.join("region_ref.fa");
            if self.write_reference_slice(request, &ref_fa)? {
                inputs.push(',');
                inputs.push_str(&ref_fa.to_string_lossy());
            }
        }

        let megahit_dir = workdir.join("megahit");
        if megahit_dir.exists() {
            fs::remove_dir_all(&megahit_dir)?;
        }
        ToolCommand::new(&self.megahit)
            .arg("-r")
            .arg(&inputs)
            .arg("--k-list")
            .arg(self.config.kmer_size.to_string())
            .arg("--min-contig-len")
            .arg(self.config.min_contig_len.to_string())
            .arg("-t")
            .arg(self.config.threads.to_string())
            .arg("-o")
            .arg(&megahit_dir)
            .timeout(self.config.timeout)
            .cancel_on(&self.config.cancel)
            .run()
            .context("MEGAHIT assembly failed")?;

        let contigs_fa = megahit_dir.join("final.contigs.fa");
        let mut contigs: Vec<Contig> = read_fasta_records(&contigs_fa)?
            .into_iter()
            .map(|rec| Contig {
                name: rec.name,
                sequence: rec.seq,
                supporting_reads: Vec::new(),
            })
            .collect();
        if contigs.is_empty() {
            return Ok(contigs);
        }

        let paf = workdir.join("reads_to_contigs.paf");
        ToolCommand::new(&self.minimap2)
            .args(["-x", "sr", "-t"])
            .arg(self.config.threads.to_string())
            .arg(&contigs_fa)
            .arg(&reads_fq)
            .arg("-o")
            .arg(&paf)
            .timeout(self.config.timeout)
            .cancel_on(&self.config.cancel)
            .run()
            .context("Mapping reads back to contigs failed")?;
        assign_supporting_reads(&mut contigs, &paf)?;

        log::info!(
            "{}: {} contigs assembled",
            request.region_label(),
            contigs.len()
        );
        Ok(contigs)
    }

    fn consume(&mut self, contig: &Contig) {
        if !self.config.recycle {
            self.used_reads.extend(contig.supporting_reads.iter().cloned());
        }
    }
}
