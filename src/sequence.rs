// src/sequence.rs
// SEQUENCE MODEL
// Typed records exchanged between the chunk scanner (map) and the boundary
// stitcher (reduce), plus the final index and its text body.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// One fully resolved row of the sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    /// Number of chunks holding at least one non-newline byte of this sequence.
    pub span_count: u32,
    /// Absolute offset of the `>` byte.
    pub header_offset: u64,
    /// Absolute offset of the first byte after the header line.
    pub base_offset: u64,
    /// Bases, newlines excluded.
    pub base_length: u64,
}

/// An `(offset, length)` pair describing where a continuation's bases start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub offset: u64,
    pub length: u64,
}

/// Bytes of a chunk that precede its first header. They belong to whatever
/// sequence was open at the end of the previous chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadSplit {
    /// First line of the fragment up to the first space (no newline).
    pub continuation: String,
    pub first_line_has_space: bool,
    pub first_line_terminated: bool,
    /// Counted from the chunk start. Used when the previous sequence's body continues.
    pub body: Candidate,
    /// Counted from the second line. Used when the previous chunk cut a header line.
    pub after_first_line: Option<Candidate>,
}

impl HeadSplit {
    /// Whether the fragment holds any byte other than newlines.
    pub fn contributes(&self) -> bool {
        self.body.length > 0
    }
}

/// The last header of a chunk, cut by the chunk end before its newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailSplit {
    pub partial_id: String,
    /// A space followed the id, so the id is fully captured.
    pub id_complete: bool,
    pub header_offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceEntry {
    /// Bytes before the first header of worker 0. Later chunks may continue it.
    Preamble { length: u64 },
    Complete(IndexEntry),
    HeadSplit(HeadSplit),
    TailSplit(TailSplit),
}

impl SequenceEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            SequenceEntry::Preamble { .. } => "preamble",
            SequenceEntry::Complete(_) => "complete",
            SequenceEntry::HeadSplit(_) => "head-split",
            SequenceEntry::TailSplit(_) => "tail-split",
        }
    }
}

/// Map output for one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRecord {
    pub worker_id: usize,
    pub min_range: u64,
    pub max_range: u64,
    pub sequences: Vec<SequenceEntry>,
}

/// Reduce output for one chunk: only resolved entries, owned by the chunk in
/// which their header begins (a split header belongs to the later chunk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StitchedRecord {
    pub worker_id: usize,
    pub min_range: u64,
    pub max_range: u64,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceIndex {
    pub records: Vec<StitchedRecord>,
}

impl SequenceIndex {
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.records.iter().flat_map(|r| r.entries.iter())
    }

    pub fn len(&self) -> usize {
        self.records.iter().map(|r| r.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_entries(self) -> Vec<IndexEntry> {
        self.records.into_iter().flat_map(|r| r.entries).collect()
    }

    /// TSV body: `id span header_offset base_offset base_length`, one sequence per line.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        for entry in self.entries() {
            out.push_str(&entry.to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.id, self.span_count, self.header_offset, self.base_offset, self.base_length
        )
    }
}

/// Parses a staged TSV index body back into entries.
pub fn parse_tsv(body: &str) -> Result<Vec<IndexEntry>> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| {
            let bad = || Error::processing(format!("malformed index line {}: {:?}", n + 1, line));
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 5 {
                return Err(bad());
            }
            Ok(IndexEntry {
                id: fields[0].to_string(),
                span_count: fields[1].parse().map_err(|_| bad())?,
                header_offset: fields[2].parse().map_err(|_| bad())?,
                base_offset: fields[3].parse().map_err(|_| bad())?,
                base_length: fields[4].parse().map_err(|_| bad())?,
            })
        })
        .collect()
}
