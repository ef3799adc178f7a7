//! Mutation Module
//!
//! Applies a requested structural change to an assembled contig sequence.
//!
//! `MutableSeq` keeps the intervals (in current coordinates) that earlier
//! edits produced, and refuses a new edit that would land inside one of them.
//! `apply_action` dispatches on the tagged `Action`.

use anyhow::{Context, Result};

use crate::error::Error;
use crate::seqio::read_single_sequence;
use crate::variant::Action;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Insertion,
    Inversion,
    Deletion,
    Duplication,
}

/// A half-open interval of the current sequence produced by an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub kind: EditKind,
    pub start: usize,
    pub end: usize,
}

/// Contig sequence plus the edits applied to it.
#[derive(Debug, Clone)]
pub struct MutableSeq {
    seq: String,
    edits: Vec<Edit>,
}

impl MutableSeq {
    pub fn new(seq: impl Into<String>) -> Self {
        Self {
            seq: seq.into(),
            edits: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.seq
    }

    pub fn into_string(self) -> String {
        self.seq
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// True if any part of `start..end` was produced by an earlier edit.
    pub fn is_mutated(&self, start: usize, end: usize) -> bool {
        self.edits
            .iter()
            .any(|e| start < e.end && e.start < end.max(start + 1))
    }

    /// Inserts `insert` at `pos` with a target-site duplication.
    ///
    /// The `tsd_len` bases starting at `pos` (clamped to the sequence end)
    /// end up on both sides of the inserted segment:
    /// `seq[..pos + tsd] + insert + seq[pos..]`.
    pub fn insertion(&mut self, pos: usize, insert: &str, tsd_len: usize) -> Result<(), Error> {
        let pos = pos.min(self.seq.len());
        let tsd = tsd_len.min(self.seq.len() - pos);

        if self.is_mutated(pos, pos + tsd) {
            return Err(Error::EditOverlap {
                start: pos,
                end: pos + tsd,
            });
        }

        let mut out = String::with_capacity(self.seq.len() + insert.len() + tsd);
        out.push_str(&self.seq[..pos + tsd]);
        out.push_str(insert);
        out.push_str(&self.seq[pos..]);

        // Shift later edits by what was added before them.
        let added = insert.len() + tsd;
        for edit in self.edits.iter_mut().filter(|e| e.start >= pos) {
            edit.start += added;
            edit.end += added;
        }
        self.edits.push(Edit {
            kind: EditKind::Insertion,
            start: pos,
            end: pos + added + tsd,
        });
        self.seq = out;
        Ok(())
    }
}

impl std::fmt::Display for MutableSeq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.seq)
    }
}

/// Loads the sequence an action splices in: the insertion source for INS,
/// nothing for the other actions.
///
/// Runs before assembly so a missing or empty source fails the region
/// without any external work.
///
/// # Errors
/// `Format` for a source without sequence, I/O errors for an unreadable one.
pub fn load_insertion(action: &Action) -> Result<Option<String>> {
    match action {
        Action::Insertion { source, .. } => {
            let insert = read_single_sequence(source)
                .with_context(|| format!("Failed to load insertion source {}", source.display()))?;
            Ok(Some(insert))
        }
        Action::Inversion | Action::Deletion | Action::Duplication => Ok(None),
    }
}

/// Applies `action` to `seq` in place.
///
/// # Arguments
/// * `seq` - The contig being mutated
/// * `action` - Requested change
/// * `insert` - Sequence returned by [`load_insertion`] for this action
///
/// Insertions land at the contig midpoint. Inversion, deletion and
/// duplication are recognised but leave the sequence untouched. The full
/// sequence is logged before and after.
pub fn apply_action(seq: &mut MutableSeq, action: &Action, insert: Option<&str>) -> Result<()> {
    log::info!("BEFORE ({} bp): {}", seq.len(), seq);

    match action {
        Action::Insertion { tsd_len, .. } => {
            let insert = insert.ok_or_else(|| {
                Error::Configuration("INS applied without its insertion sequence".to_string())
            })?;
            let pos = seq.len() / 2;
            log::info!(
                "Inserting {} bp at {} (TSD {} bp)",
                insert.len(),
                pos,
                tsd_len
            );
            seq.insertion(pos, insert, *tsd_len)?;
        }
        Action::Inversion => {
            log::warn!("INV is not implemented; contig left unchanged");
        }
        Action::Deletion => {
            log::warn!("DEL is not implemented; contig left unchanged");
        }
        Action::Duplication => {
            log::warn!("DUP is not implemented; contig left unchanged");
        }
    }

    log::info!("AFTER ({} bp): {}", seq.len(), seq);
    Ok(())
}
