//! Error Module
//!
//! Typed failures raised while spiking a variant into a region. Plumbing code
//! works with `anyhow::Result` and these errors travel inside it; the
//! orchestrator downcasts to recover the failure category for reporting and
//! exit codes.

use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors raised by the pipeline stages.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A required, action-specific argument is missing or a setting is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A variant specification line could not be parsed.
    #[error("line {line_no}: {reason}: `{line}`")]
    Parse {
        line_no: usize,
        line: String,
        reason: String,
    },

    /// FASTA/FASTQ structure violation.
    #[error("malformed {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// An external tool exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    ExternalTool {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// An external tool ran past its time limit and was killed.
    #[error("`{command}` timed out after {seconds}s")]
    ToolTimeout { command: String, seconds: u64 },

    /// The run was interrupted (SIGINT/SIGTERM); a running tool was killed.
    #[error("interrupted")]
    Cancelled,

    /// Assembly produced no contig for the region.
    #[error("no contig assembled for {region}")]
    NoContig { region: String },

    /// An edit would overlap bases already consumed by an earlier edit.
    #[error("edit at {start}..{end} overlaps an earlier edit")]
    EditOverlap { start: usize, end: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Some error from rust-htslib while reading the alignment or reference
    #[error("rust_htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),
}

/// Failure categories, used for the run report and the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    Parse,
    Format,
    ExternalTool,
    NoContig,
    Cancelled,
    Other,
}

impl FailureKind {
    /// Process exit code for this category. 0 is reserved for success.
    pub fn exit_code(self) -> i32 {
        match self {
            FailureKind::Other => 1,
            FailureKind::Configuration => 3,
            FailureKind::Parse => 4,
            FailureKind::Format => 5,
            FailureKind::ExternalTool => 6,
            FailureKind::NoContig => 7,
            FailureKind::Cancelled => 130,
        }
    }

    /// Categorises an `anyhow` error by the first typed `Error` in its chain.
    pub fn of(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<Error>())
            .map(Error::kind)
            .unwrap_or(FailureKind::Other)
    }
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::Configuration(_) => FailureKind::Configuration,
            Error::Parse { .. } => FailureKind::Parse,
            Error::Format { .. } => FailureKind::Format,
            Error::ExternalTool { .. } | Error::ToolTimeout { .. } => FailureKind::ExternalTool,
            Error::NoContig { .. } => FailureKind::NoContig,
            Error::Cancelled => FailureKind::Cancelled,
            Error::EditOverlap { .. } | Error::Io(_) | Error::Htslib(_) => FailureKind::Other,
        }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Format {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
