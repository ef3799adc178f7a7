use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use svspike::assemble::{AssemblyConfig, MegahitAssembler};
use svspike::pipeline::{Pipeline, PipelineConfig};
use svspike::remap::{index_path, BwaRemapper, RemapConfig};
use svspike::simulate::{SimulatorConfig, Wgsim};
use svspike::tools::{find_executable, CancelFlag};
use svspike::{Error, FailureKind};

fn parse_fraction(s: &str) -> Result<f64, String> {
    let val: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if !(0.0..=1.0).contains(&val) {
        Err(format!("Fraction must be between 0 and 1, got {}", val))
    } else {
        Ok(val)
    }
}

fn parse_kmer(s: &str) -> Result<usize, String> {
    let val: usize = s.parse().map_err(|_| format!("Invalid k-mer size: {}", s))?;
    if !(15..=255).contains(&val) || val % 2 == 0 {
        Err(format!("k-mer size must be odd and between 15 and 255, got {}", val))
    } else {
        Ok(val)
    }
}

#[derive(Parser)]
#[command(name = "svspike")]
#[command(version)]
#[command(about = "Spike synthetic structural variants into paired-end BAM files")]
#[command(long_about = r#"
svspike - add structural variants to existing sequencing data

For every region in the variant file:
  1. Collects the region's reads (and their mates) from the BAM
  2. Assembles them locally with MEGAHIT and keeps the largest contig
  3. Applies the requested mutation to the contig
  4. Simulates paired reads from the mutated contig with wgsim,
     reusing the names of reads that were already paired
  5. Remaps the reads with bwa and converts to BAM with samtools

Region BAMs are merged into --outbam at the end of the run.

VARIANT FILE (whitespace-delimited, '#' lines ignored):
  chrom  start  end  action  [insertion.fa]  [tsd_len]
  action is one of INS, INV, DEL, DUP; INS requires the insertion FASTA.

REQUIRED TOOLS (on PATH):
  megahit, minimap2, wgsim, and bwa + samtools unless --noremap

EXIT CODES:
  0 success, 1 other error, 3 configuration, 4 parse, 5 format,
  6 external tool, 7 no contig (first failing region decides),
  130 interrupted (scratch files are removed, running tools are killed)

EXAMPLE:
  svspike -v vars.txt -f sample.bam -r hg19.fa -o spiked.bam --report run.json
"#)]
struct Args {
    /// Variant file: chrom start end action [insertion.fa] [tsd_len]
    #[arg(short = 'v', long = "varfile", value_name = "FILE", help_heading = "Input")]
    varfile: PathBuf,

    /// Indexed BAM to spike variants into
    #[arg(short = 'f', long = "sambamfile", value_name = "BAM", help_heading = "Input")]
    sambamfile: PathBuf,

    /// Indexed with both `bwa index` and `samtools faidx`
    #[arg(short = 'r', long, value_name = "FASTA", help_heading = "Input")]
    reference: PathBuf,

    /// BAM of remapped reads carrying the variants
    #[arg(short = 'o', long = "outbam", value_name = "BAM", help_heading = "Output")]
    outbam: PathBuf,

    /// Write a JSON report of every region's outcome
    #[arg(long, value_name = "FILE", help_heading = "Output")]
    report: Option<PathBuf>,

    /// Keep per-region scratch directories
    #[arg(short = 'u', long = "keep-temp", help_heading = "Output")]
    keep_temp: bool,

    /// More log detail (info by default; once for debug, twice for trace)
    #[arg(long, action = clap::ArgAction::Count, help_heading = "Output")]
    verbose: u8,

    /// MEGAHIT k-mer size
    #[arg(short = 'k', long = "kmer", value_name = "SIZE", default_value = "31",
          value_parser = parse_kmer, help_heading = "Assembly")]
    kmer: usize,

    /// Assemble from reads only, without the reference slice
    #[arg(long, help_heading = "Assembly")]
    noref: bool,

    /// Let reads supporting one region also support later regions
    #[arg(long, help_heading = "Assembly")]
    recycle: bool,

    #[arg(long = "min-contig-len", value_name = "BP", default_value = "200", help_heading = "Assembly")]
    min_contig_len: usize,

    /// Recorded in the report; does not change behaviour
    #[arg(short = 's', long, value_name = "FLOAT", default_value = "0.25",
          value_parser = parse_fraction, help_heading = "Mutation")]
    svfrac: f64,

    /// Recorded in the report; does not change behaviour
    #[arg(short = 'm', long, value_name = "FLOAT", default_value = "0.5",
          value_parser = parse_fraction, help_heading = "Mutation")]
    mutfrac: f64,

    /// Simulate reads from the unmutated contig
    #[arg(long, help_heading = "Mutation")]
    nomut: bool,

    /// Length of each simulated mate
    #[arg(long = "read-length", value_name = "BP", default_value = "100", help_heading = "Simulation")]
    read_length: usize,

    /// Keep simulated FASTQ pairs next to --outbam instead of remapping
    #[arg(long, help_heading = "Simulation")]
    noremap: bool,

    /// Threads for the external tools (0 = all CPUs)
    #[arg(short = 't', long, value_name = "NUM", default_value = "0", help_heading = "Runtime")]
    threads: usize,

    /// Time limit per external command in seconds (0 = unbounded)
    #[arg(long, value_name = "SECONDS", default_value = "7200", help_heading = "Runtime")]
    timeout: u64,

    /// Abort the run on the first failing line or region
    #[arg(long = "fail-fast", help_heading = "Runtime")]
    fail_fast: bool,
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(Error::Configuration(format!("{} not found: {}", what, path.display())).into());
    }
    Ok(())
}

fn validate_inputs(args: &Args) -> Result<()> {
    require_file(&args.varfile, "Variant file")?;
    require_file(&args.sambamfile, "Alignment file")?;
    require_file(&args.reference, "Reference")?;
    require_file(&index_path(&args.reference, "fai"), "Reference .fai index (run samtools faidx)")?;
    if !args.noremap {
        require_file(&index_path(&args.reference, "bwt"), "Reference bwa index (run bwa index)")?;
    }

    let bai = index_path(&args.sambamfile, "bai");
    let csi = index_path(&args.sambamfile, "csi");
    let stem_bai = args.sambamfile.with_extension("bai");
    if !bai.is_file() && !csi.is_file() && !stem_bai.is_file() {
        return Err(Error::Configuration(format!(
            "Alignment index not found for {} (run samtools index)",
            args.sambamfile.display()
        ))
        .into());
    }
    Ok(())
}

fn run(mut args: Args) -> Result<i32> {
    let start_time = Instant::now();

    if args.threads == 0 {
        args.threads = num_cpus::get();
    }
    validate_inputs(&args)?;

    let megahit = find_executable("megahit")?;
    let minimap2 = find_executable("minimap2")?;
    let wgsim = find_executable("wgsim")?;
    let (bwa, samtools) = if args.noremap {
        (PathBuf::from("bwa"), PathBuf::from("samtools"))
    } else {
        (find_executable("bwa")?, find_executable("samtools")?)
    };
    log::debug!(
        "Tools: {} {} {} {} {}",
        megahit.display(),
        minimap2.display(),
        wgsim.display(),
        bwa.display(),
        samtools.display()
    );

    let timeout = Some(Duration::from_secs(args.timeout));
    let cancel = CancelFlag::new();
    cancel.install_signal_handler()?;

    let assembler = MegahitAssembler::new(
        &args.sambamfile,
        &args.reference,
        megahit,
        minimap2,
        AssemblyConfig {
            kmer_size: args.kmer,
            no_ref: args.noref,
            recycle: args.recycle,
            min_contig_len: args.min_contig_len,
            threads: args.threads,
            timeout,
            cancel: cancel.clone(),
        },
    );
    let simulator = Wgsim::new(
        wgsim,
        SimulatorConfig {
            read_length: args.read_length,
            timeout,
            cancel: cancel.clone(),
            ..Default::default()
        },
    );
    let remapper = BwaRemapper::new(
        bwa,
        samtools,
        &args.reference,
        RemapConfig {
            threads: args.threads,
            timeout,
            cancel: cancel.clone(),
        },
    );

    let mut pipeline = Pipeline::new(
        Box::new(assembler),
        Box::new(simulator),
        Box::new(remapper),
        PipelineConfig {
            out_bam: args.outbam.clone(),
            scratch_root: None,
            keep_temp: args.keep_temp,
            fail_fast: args.fail_fast,
            no_mut: args.nomut,
            no_remap: args.noremap,
            sv_frac: args.svfrac,
            mut_frac: args.mutfrac,
            cancel,
        },
    );

    let report = pipeline.run(&args.varfile)?;

    if let Some(path) = &args.report {
        report
            .write_json(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        log::info!("Report written to {}", path.display());
    }

    log::info!("Total time: {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(report.exit_code())
}

/// Info is the floor: census summaries and BEFORE/AFTER contigs are always shown.
fn log_level(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(log_level(args.verbose))
        .parse_default_env()
        .init();

    match run(args) {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::from(FailureKind::of(&e).exit_code() as u8)
        }
    }
}
