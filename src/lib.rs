//! svspike - Structural Variant spike-in for paired-end alignments
//!
//! Injects synthetic structural-variant signal into an existing BAM: each
//! requested region is assembled locally, the largest contig is mutated,
//! paired reads are re-simulated from the mutated sequence (keeping the names
//! of reads that were already paired), and the reads are remapped so the
//! output looks like real data carrying the variant.
//!
//! # Modules
//! - `seqio`: FASTA/FASTQ reading and writing
//! - `variant`: variant file parsing
//! - `census`: paired-read classification of contig support
//! - `mutation`: contig mutation and action dispatch
//! - `assemble`: region read extraction and local assembly
//! - `paf`: PAF parsing for read-to-contig support
//! - `simulate`: read simulation and read renaming
//! - `remap`: alignment of simulated reads and output merging
//! - `tools`: external command execution
//! - `pipeline`: per-region orchestration and run report
//! - `error`: error types and exit codes

pub mod assemble;
pub mod census;
pub mod error;
pub mod mutation;
pub mod paf;
pub mod pipeline;
pub mod remap;
pub mod seqio;
pub mod simulate;
pub mod tools;
pub mod variant;

pub use error::{Error, FailureKind};
