//! Region Orchestrator
//!
//! Drives one variant file through the per-region stages:
//!
//! ```text
//! parse → assemble → select largest contig → mutate → simulate → remap
//! ```
//!
//! Each region works inside its own scratch directory, removed when the
//! region finishes whichever way it finishes (unless temporaries are kept).
//! Region BAMs are collected and merged into the output once at the end, so
//! regions never overwrite each other's alignments.
//!
//! Two runs must not share an output path; serialising such runs is up to
//! the caller.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::assemble::{select_largest_contig, Assembler};
use crate::error::FailureKind;
use crate::mutation::{apply_action, load_insertion, MutableSeq};
use crate::remap::Remapper;
use crate::simulate::{simulate_reads, ReadSimulator};
use crate::tools::CancelFlag;
use crate::variant::{VariantFile, VariantRequest};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub out_bam: PathBuf,
    /// Where run scratch directories are created; defaults to the output's
    /// directory.
    pub scratch_root: Option<PathBuf>,
    pub keep_temp: bool,
    pub fail_fast: bool,
    /// Simulate from the unmutated contig.
    pub no_mut: bool,
    /// Stop after simulation and keep the renamed FASTQ pairs instead of a BAM.
    pub no_remap: bool,
    pub sv_frac: f64,
    pub mut_frac: f64,
    /// Checked between regions; once raised the run stops and scratch is removed.
    pub cancel: CancelFlag,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            out_bam: PathBuf::from("out.bam"),
            scratch_root: None,
            keep_temp: false,
            fail_fast: false,
            no_mut: false,
            no_remap: false,
            sv_frac: 0.25,
            mut_frac: 0.5,
            cancel: CancelFlag::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionStatus {
    Completed {
        contig: String,
        contig_len: usize,
        mutated_len: usize,
        simulated_pairs: usize,
        outputs: Vec<PathBuf>,
    },
    Skipped {
        reason: String,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    pub line_no: usize,
    /// Absent when the line could not be parsed.
    pub request: Option<VariantRequest>,
    #[serde(flatten)]
    pub status: RegionStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub regions: Vec<RegionReport>,
    /// The merged BAM, when one was written.
    pub output: Option<PathBuf>,
    pub sv_frac: f64,
    pub mut_frac: f64,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| matches!(r.status, RegionStatus::Completed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.regions
            .iter()
            .filter(|r| matches!(r.status, RegionStatus::Failed { .. }))
            .count()
    }

    /// 0 when nothing failed, otherwise the code of the first failure.
    pub fn exit_code(&self) -> i32 {
        self.regions
            .iter()
            .find_map(|r| match r.status {
                RegionStatus::Failed { kind, .. } => Some(kind.exit_code()),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = fs::File::create(path)
            .with_context(|| format!("Failed to create report: {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }
}

/// What a successful region produced.
enum RegionOutcome {
    Done {
        contig: String,
        contig_len: usize,
        mutated_len: usize,
        simulated_pairs: usize,
        outputs: Vec<PathBuf>,
    },
    Skipped(String),
}

pub struct Pipeline {
    assembler: Box<dyn Assembler>,
    simulator: Box<dyn ReadSimulator>,
    remapper: Box<dyn Remapper>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        assembler: Box<dyn Assembler>,
        simulator: Box<dyn ReadSimulator>,
        remapper: Box<dyn Remapper>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            assembler,
            simulator,
            remapper,
            config,
        }
    }

    fn output_dir(&self) -> PathBuf {
        match self.config.out_bam.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// `<out dir>/<out stem>.<suffix>`
    fn sibling_of_output(&self, suffix: &str) -> PathBuf {
        let stem = self
            .config
            .out_bam
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("svspike");
        self.output_dir().join(format!("{}.{}", stem, suffix))
    }

    /// Processes every line of `varfile` and returns the run report.
    ///
    /// # Arguments
    /// * `varfile` - Variant file, one request per line
    ///
    /// # Returns
    /// One `RegionReport` per non-comment line, in file order, plus the path
    /// of the merged output when at least one region produced reads.
    ///
    /// # Errors
    /// Only problems that stop the whole run: an unreadable variant file, a
    /// failed merge, an interrupt, or any region failure when `fail_fast` is
    /// set. The run scratch directory is removed on every one of these paths
    /// unless `keep_temp` is set.
    pub fn run(&mut self, varfile: &Path) -> Result<RunReport> {
        log::info!(
            "svfrac={} mutfrac={} (recorded, not applied)",
            self.config.sv_frac,
            self.config.mut_frac
        );

        let scratch = tempfile::Builder::new()
            .prefix("svspike_")
            .keep(self.config.keep_temp)
            .tempdir_in(
                self.config
                    .scratch_root
                    .clone()
                    .unwrap_or_else(|| self.output_dir()),
            )
            .context("Failed to create scratch directory")?;
        if self.config.keep_temp {
            log::info!("Keeping temporary files in {}", scratch.path().display());
        }

        let mut report = RunReport {
            regions: Vec::new(),
            output: None,
            sv_frac: self.config.sv_frac,
            mut_frac: self.config.mut_frac,
        };
        let mut parts: Vec<PathBuf> = Vec::new();

        for item in VariantFile::open(varfile)? {
            self.config.cancel.check()?;
            let (line_no, parsed) = item?;

            let request = match parsed {
                Ok(r) => r,
                Err(e) => {
                    if self.config.fail_fast {
                        return Err(e.into());
                    }
                    log::warn!("Skipping line {}: {}", line_no, e);
                    report.regions.push(RegionReport {
                        line_no,
                        request: None,
                        status: RegionStatus::Failed {
                            kind: e.kind(),
                            message: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            log::info!("=== Line {}: {} ===", line_no, request);
            let status = match self.process_region(line_no, &request, scratch.path()) {
                Ok(RegionOutcome::Done {
                    contig,
                    contig_len,
                    mutated_len,
                    simulated_pairs,
                    outputs,
                }) => {
                    log::info!(
                        "{}: done ({} pairs from {} bp contig)",
                        request.region_label(),
                        simulated_pairs,
                        mutated_len
                    );
                    if !self.config.no_remap {
                        parts.extend(outputs.iter().cloned());
                    }
                    RegionStatus::Completed {
                        contig,
                        contig_len,
                        mutated_len,
                        simulated_pairs,
                        outputs,
                    }
                }
                Ok(RegionOutcome::Skipped(reason)) => {
                    log::warn!("{}: skipped, {}", request.region_label(), reason);
                    RegionStatus::Skipped { reason }
                }
                Err(e) => {
                    let kind = FailureKind::of(&e);
                    if self.config.fail_fast || kind == FailureKind::Cancelled {
                        return Err(e.context(format!("Region {} failed", request.region_label())));
                    }
                    log::error!("{}: failed: {:#}", request.region_label(), e);
                    RegionStatus::Failed {
                        kind,
                        message: format!("{:#}", e),
                    }
                }
            };
            report.regions.push(RegionReport {
                line_no,
                request: Some(request),
                status,
            });
        }

        self.config.cancel.check()?;
        if !self.config.no_remap {
            if parts.is_empty() {
                log::warn!("No region produced reads; {} not written", self.config.out_bam.display());
            } else {
                self.remapper
                    .merge(&parts, &self.config.out_bam)
                    .context("Failed to merge region alignments")?;
                report.output = Some(self.config.out_bam.clone());
            }
        }

        log::info!(
            "{} regions: {} completed, {} failed",
            report.regions.len(),
            report.completed(),
            report.failed()
        );
        Ok(report)
    }

    fn process_region(
        &mut self,
        line_no: usize,
        request: &VariantRequest,
        scratch: &Path,
    ) -> Result<RegionOutcome> {
        let workdir = tempfile::Builder::new()
            .prefix(&format!("line{}_{}_", line_no, request.file_stem()))
            .keep(self.config.keep_temp)
            .tempdir_in(scratch)
            .context("Failed to create region directory")?;
        let label = request.region_label();

        let insert = load_insertion(&request.action)
            .with_context(|| format!("Cannot prepare mutation for {}", label))?;

        let contigs = self
            .assembler
            .assemble(request, workdir.path())
            .with_context(|| format!("Assembly failed for {}", label))?;
        log::info!("{}: {} contigs", label, contigs.len());
        let contig = select_largest_contig(contigs, &label)?;
        log::info!("{}: using {} ({} bp)", label, contig.name, contig.len());

        let mut seq = MutableSeq::new(contig.sequence.clone());
        if self.config.no_mut {
            log::info!("{}: mutation disabled, simulating from the assembled contig", label);
        } else {
            apply_action(&mut seq, &request.action, insert.as_deref())
                .with_context(|| format!("Mutation failed for {}", label))?;
        }

        let sim = match simulate_reads(self.simulator.as_ref(), &contig, seq.as_str(), workdir.path())? {
            Some(sim) => sim,
            None => return Ok(RegionOutcome::Skipped("no read pairs to simulate".to_string())),
        };

        let outputs = if self.config.no_remap {
            let stem = format!("{}.{}", line_no, request.file_stem());
            let fq1 = self.sibling_of_output(&format!("{}.1.fq", stem));
            let fq2 = self.sibling_of_output(&format!("{}.2.fq", stem));
            fs::copy(&sim.fq1, &fq1)
                .with_context(|| format!("Failed to write {}", fq1.display()))?;
            fs::copy(&sim.fq2, &fq2)
                .with_context(|| format!("Failed to write {}", fq2.display()))?;
            vec![fq1, fq2]
        } else {
            let part = scratch.join(format!("line{}_{}.bam", line_no, request.file_stem()));
            self.remapper
                .remap(&sim.fq1, &sim.fq2, workdir.path(), &part)
                .with_context(|| format!("Remapping failed for {}", label))?;
            vec![part]
        };

        self.assembler.consume(&contig);

        Ok(RegionOutcome::Done {
            contig: contig.name.clone(),
            contig_len: contig.len(),
            mutated_len: seq.len(),
            simulated_pairs: sim.pairs,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::Contig;
    use crate::error::Error;
    use crate::seqio::{FastqReader, FastqWriter};
    use crate::variant::Action;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Returns a fixed contig set for every region on `chr1`, nothing elsewhere.
    /// A region on `chrINT` behaves as if SIGINT arrived mid-assembly.
    struct FakeAssembler {
        contigs: Vec<Contig>,
        assembled: Rc<RefCell<Vec<String>>>,
        consumed: Rc<RefCell<Vec<String>>>,
        cancel: CancelFlag,
    }

    impl Assembler for FakeAssembler {
        fn assemble(&mut self, request: &VariantRequest, workdir: &Path) -> Result<Vec<Contig>> {
            assert!(workdir.is_dir());
            self.assembled.borrow_mut().push(request.region_label());
            if request.chrom == "chrINT" {
                self.cancel.cancel();
                return Err(Error::Cancelled.into());
            }
            if request.chrom == "chr1" {
                Ok(self.contigs.clone())
            } else {
                Ok(Vec::new())
            }
        }

        fn consume(&mut self, contig: &Contig) {
            self.consumed.borrow_mut().push(contig.name.clone());
        }
    }

    /// Emits one fixed-length read per pair, taken from the start of the FASTA sequence.
    struct FakeSimulator {
        seen_len: Rc<RefCell<Vec<usize>>>,
    }

    impl ReadSimulator for FakeSimulator {
        fn simulate(&self, fasta: &Path, pairs: usize, fq1: &Path, fq2: &Path) -> Result<()> {
            let seq = crate::seqio::read_single_sequence(fasta)?;
            self.seen_len.borrow_mut().push(seq.len());
            for (path, mate) in [(fq1, 1), (fq2, 2)] {
                let mut writer = FastqWriter::create(path)?;
                for i in 0..pairs {
                    writer.write_record(&format!("target_{}/{}", i, mate), &seq[..10], "IIIIIIIIII")?;
                }
                writer.finish()?;
            }
            Ok(())
        }
    }

    /// Writes the read count as the "BAM" and concatenates on merge.
    struct FakeRemapper {
        fail: bool,
    }

    impl Remapper for FakeRemapper {
        fn remap(&self, fq1: &Path, _fq2: &Path, _workdir: &Path, out_bam: &Path) -> Result<()> {
            if self.fail {
                anyhow::bail!("aligner exploded");
            }
            let n = FastqReader::open(fq1)?.read_all()?.len();
            fs::write(out_bam, format!("{}\n", n))?;
            Ok(())
        }

        fn merge(&self, parts: &[PathBuf], out_bam: &Path) -> Result<()> {
            let mut merged = String::new();
            for part in parts {
                merged.push_str(&fs::read_to_string(part)?);
            }
            fs::write(out_bam, merged)?;
            Ok(())
        }
    }

    fn supported_contig(len: usize, pairs: usize, singles: usize) -> Contig {
        let mut reads = Vec::new();
        for i in 0..pairs {
            reads.push(format!("pair{}", i));
            reads.push(format!("pair{}", i));
        }
        for i in 0..singles {
            reads.push(format!("single{}", i));
        }
        Contig {
            name: format!("contig_{}", len),
            sequence: "ACGT".repeat(len / 4),
            supporting_reads: reads,
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        seen_len: Rc<RefCell<Vec<usize>>>,
        assembled: Rc<RefCell<Vec<String>>>,
        consumed: Rc<RefCell<Vec<String>>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                seen_len: Rc::new(RefCell::new(Vec::new())),
                assembled: Rc::new(RefCell::new(Vec::new())),
                consumed: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn pipeline(&self, contigs: Vec<Contig>, config: PipelineConfig, fail_remap: bool) -> Pipeline {
            Pipeline::new(
                Box::new(FakeAssembler {
                    contigs,
                    assembled: Rc::clone(&self.assembled),
                    consumed: Rc::clone(&self.consumed),
                    cancel: config.cancel.clone(),
                }),
                Box::new(FakeSimulator {
                    seen_len: Rc::clone(&self.seen_len),
                }),
                Box::new(FakeRemapper { fail: fail_remap }),
                config,
            )
        }

        fn config(&self) -> PipelineConfig {
            PipelineConfig {
                out_bam: self.path("out.bam"),
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_insertion_region_end_to_end() {
        let h = Harness::new();
        fs::write(h.path("ins.fa"), ">alu\nGGGGGGGGGGGGGGGGGGGG\n").unwrap();
        let varfile = h.path("vars.txt");
        fs::write(
            &varfile,
            format!("chr1 1000 2000 INS {} 10\n", h.path("ins.fa").display()),
        )
        .unwrap();

        let contigs = vec![
            supported_contig(120, 2, 0),
            supported_contig(500, 40, 10),
            supported_contig(200, 3, 0),
        ];
        let mut pipeline = h.pipeline(contigs, h.config(), false);
        let report = pipeline.run(&varfile).unwrap();

        assert_eq!(report.completed(), 1);
        assert_eq!(report.exit_code(), 0);
        match &report.regions[0].status {
            RegionStatus::Completed {
                contig,
                contig_len,
                mutated_len,
                simulated_pairs,
                ..
            } => {
                assert_eq!(contig, "contig_500");
                assert_eq!(*contig_len, 500);
                assert_eq!(*mutated_len, 500 + 20 + 10);
                assert_eq!(*simulated_pairs, 45);
            }
            other => panic!("unexpected status: {:?}", other),
        }
        assert_eq!(*h.seen_len.borrow(), vec![530]);
        assert_eq!(*h.consumed.borrow(), vec!["contig_500".to_string()]);
        assert_eq!(fs::read_to_string(h.path("out.bam")).unwrap(), "45\n");
        assert_eq!(report.output, Some(h.path("out.bam")));
    }

    #[test]
    fn test_bad_lines_are_skipped_and_reported() {
        let h = Harness::new();
        let varfile = h.path("vars.txt");
        fs::write(
            &varfile,
            "# regions\nchr1 1 2 SNP\nchr1 10 20 INS\nchr1 100 200 INV\nchr1 300 400 DUP\n",
        )
        .unwrap();

        let mut pipeline = h.pipeline(vec![supported_contig(400, 5, 0)], h.config(), false);
        let report = pipeline.run(&varfile).unwrap();

        assert_eq!(report.regions.len(), 4);
        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.exit_code(), FailureKind::Parse.exit_code());
        assert!(matches!(
            report.regions[1].status,
            RegionStatus::Failed {
                kind: FailureKind::Configuration,
                ..
            }
        ));
        // Both regions land in the merged output.
        assert_eq!(fs::read_to_string(h.path("out.bam")).unwrap(), "5\n5\n");
    }

    #[test]
    fn test_fail_fast_aborts_on_bad_line() {
        let h = Harness::new();
        let varfile = h.path("vars.txt");
        fs::write(&varfile, "chr1 100 200 INV\nchr1 1 2 SNP\nchr1 300 400 DEL\n").unwrap();

        let config = PipelineConfig {
            fail_fast: true,
            ..h.config()
        };
        let mut pipeline = h.pipeline(vec![supported_contig(400, 5, 0)], config, false);
        let err = pipeline.run(&varfile).unwrap_err();
        assert_eq!(FailureKind::of(&err), FailureKind::Parse);
        assert_eq!(h.seen_len.borrow().len(), 1);
    }

    #[test]
    fn test_no_contig_fails_region_only() {
        let h = Harness::new();
        let varfile = h.path("vars.txt");
        fs::write(&varfile, "chr2 100 200 DEL\nchr1 100 200 DEL\n").unwrap();

        let mut pipeline = h.pipeline(vec![supported_contig(400, 3, 2)], h.config(), false);
        let report = pipeline.run(&varfile).unwrap();

        assert!(matches!(
            report.regions[0].status,
            RegionStatus::Failed {
                kind: FailureKind::NoContig,
                ..
            }
        ));
        assert_eq!(report.completed(), 1);
        assert_eq!(report.exit_code(), 7);
        assert_eq!(fs::read_to_string(h.path("out.bam")).unwrap(), "4\n");
    }

    #[test]
    fn test_remap_failure_does_not_consume_reads() {
        let h = Harness::new();
        let varfile = h.path("vars.txt");
        fs::write(&varfile, "chr1 100 200 INV\n").unwrap();

        let mut pipeline = h.pipeline(vec![supported_contig(400, 3, 0)], h.config(), true);
        let report = pipeline.run(&varfile).unwrap();

        assert_eq!(report.failed(), 1);
        assert!(h.consumed.borrow().is_empty());
        assert!(report.output.is_none());
        assert!(!h.path("out.bam").exists());
    }

    #[test]
    fn test_zero_pairs_region_is_skipped() {
        let h = Harness::new();
        let varfile = h.path("vars.txt");
        fs::write(&varfile, "chr1 100 200 DUP\n").unwrap();

        let mut pipeline = h.pipeline(vec![supported_contig(400, 0, 1)], h.config(), false);
        let report = pipeline.run(&varfile).unwrap();

        assert!(matches!(report.regions[0].status, RegionStatus::Skipped { .. }));
        assert_eq!(report.exit_code(), 0);
        assert!(h.seen_len.borrow().is_empty());
    }

    #[test]
    fn test_nomut_and_noremap() {
        let h = Harness::new();
        fs::write(h.path("ins.fa"), ">alu\nGGGG\n").unwrap();
        let varfile = h.path("vars.txt");
        fs::write(
            &varfile,
            format!("chr1 1000 2000 INS {}\n", h.path("ins.fa").display()),
        )
        .unwrap();

        let config = PipelineConfig {
            no_mut: true,
            no_remap: true,
            ..h.config()
        };
        let mut pipeline = h.pipeline(vec![supported_contig(400, 2, 0)], config, false);
        let report = pipeline.run(&varfile).unwrap();

        assert_eq!(*h.seen_len.borrow(), vec![400]);
        assert!(report.output.is_none());
        let fq1 = h.path("out.1.chr1_1000_2000.1.fq");
        let fq2 = h.path("out.1.chr1_1000_2000.2.fq");
        let r1 = FastqReader::open(&fq1).unwrap().read_all().unwrap();
        let r2 = FastqReader::open(&fq2).unwrap().read_all().unwrap();
        assert_eq!(r1[0].name, "pair0");
        assert_eq!(r2[1].name, "pair1");
        assert!(!h.path("out.bam").exists());
    }

    #[test]
    fn test_insertion_source_checked_before_assembly() {
        let h = Harness::new();
        fs::write(h.path("empty.fa"), ">nothing\n").unwrap();
        let varfile = h.path("vars.txt");
        fs::write(
            &varfile,
            format!(
                "chr1 1000 2000 INS {} 5\nchr1 10 20 INV\n",
                h.path("empty.fa").display()
            ),
        )
        .unwrap();

        for no_mut in [false, true] {
            h.assembled.borrow_mut().clear();
            let config = PipelineConfig {
                no_mut,
                ..h.config()
            };
            let mut pipeline = h.pipeline(vec![supported_contig(400, 2, 0)], config, false);
            let report = pipeline.run(&varfile).unwrap();

            assert!(matches!(
                report.regions[0].status,
                RegionStatus::Failed {
                    kind: FailureKind::Format,
                    ..
                }
            ));
            assert_eq!(*h.assembled.borrow(), vec!["chr1:10-20".to_string()]);
        }
    }

    #[test]
    fn test_interrupt_stops_run_and_removes_scratch() {
        let h = Harness::new();
        let scratch_root = h.path("scratch");
        fs::create_dir(&scratch_root).unwrap();
        let varfile = h.path("vars.txt");
        fs::write(&varfile, "chr1 100 200 INV\nchrINT 1 2 DEL\nchr1 300 400 DEL\n").unwrap();

        let config = PipelineConfig {
            scratch_root: Some(scratch_root.clone()),
            ..h.config()
        };
        let mut pipeline = h.pipeline(vec![supported_contig(400, 2, 0)], config, false);
        let err = pipeline.run(&varfile).unwrap_err();

        assert_eq!(FailureKind::of(&err), FailureKind::Cancelled);
        assert_eq!(
            *h.assembled.borrow(),
            vec!["chr1:100-200".to_string(), "chrINT:1-2".to_string()]
        );
        assert_eq!(fs::read_dir(&scratch_root).unwrap().count(), 0);
        assert!(!h.path("out.bam").exists());
    }

    #[test]
    fn test_raised_flag_stops_before_first_region() {
        let h = Harness::new();
        let varfile = h.path("vars.txt");
        fs::write(&varfile, "chr1 100 200 INV\n").unwrap();

        let config = h.config();
        config.cancel.cancel();
        let mut pipeline = h.pipeline(vec![supported_contig(400, 2, 0)], config, false);
        let err = pipeline.run(&varfile).unwrap_err();

        assert_eq!(FailureKind::of(&err), FailureKind::Cancelled);
        assert!(h.assembled.borrow().is_empty());
    }

    #[test]
    fn test_report_json() {
        let h = Harness::new();
        let varfile = h.path("vars.txt");
        fs::write(&varfile, "chr1 100 200 INV\nchr1 1 2 BOGUS\n").unwrap();

        let mut pipeline = h.pipeline(vec![supported_contig(400, 1, 0)], h.config(), false);
        let report = pipeline.run(&varfile).unwrap();
        let json_path = h.path("report.json");
        report.write_json(&json_path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(value["regions"][0]["status"], "completed");
        assert_eq!(value["regions"][0]["request"]["action"]["type"], "inversion");
        assert_eq!(value["regions"][1]["status"], "failed");
        assert_eq!(value["regions"][1]["kind"], "parse");
    }
}
