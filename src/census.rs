//! Paired-read census over the reads supporting a contig.
//!
//! A read name seen exactly twice had both mates assembled into the contig,
//! a name seen once is a singleton, and anything seen more often is treated
//! as a repeat or contamination artifact and discarded.

use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fmt;

/// Classification of a supporting-read multiset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadNameCensus {
    /// Names seen exactly twice, in first-seen order.
    pub paired_names: Vec<String>,
    /// Number of names seen exactly once.
    pub single_count: usize,
    /// Number of names seen more than twice.
    pub discard_count: usize,
    /// Total number of reads (multiset size).
    pub total_reads: usize,
}

impl ReadNameCensus {
    /// Builds the census from read names, one entry per supporting read.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // First-seen order is kept in `order`; `index` maps a name to its slot.
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        let mut order: Vec<(String, usize)> = Vec::new();
        let mut total_reads = 0;

        for name in names {
            let name = name.as_ref();
            total_reads += 1;
            match index.get(name) {
                Some(&slot) => order[slot].1 += 1,
                None => {
                    index.insert(name.to_string(), order.len());
                    order.push((name.to_string(), 1));
                }
            }
        }

        let mut census = ReadNameCensus {
            total_reads,
            ..Default::default()
        };
        for (name, count) in order {
            match count {
                1 => census.single_count += 1,
                2 => census.paired_names.push(name),
                _ => census.discard_count += 1,
            }
        }
        census
    }

    pub fn paired_count(&self) -> usize {
        self.paired_names.len()
    }

    /// Number of read pairs to simulate: one per complete pair plus one per
    /// two singletons (an odd singleton left over is dropped).
    pub fn target_pair_count(&self) -> usize {
        self.paired_count() + self.single_count / 2
    }
}

impl fmt::Display for ReadNameCensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "paired: {}, single: {}, discard: {}, total: {}",
            self.paired_count(),
            self.single_count,
            self.discard_count,
            self.total_reads
        )
    }
}
