// src/stitcher.rs
// BOUNDARY STITCHER (REDUCE)
// Folds the ordered partial records into one entry per logical sequence.
// The fold carries the sequence that is still "open" at a chunk boundary:
// - a TailSplit opens a sequence whose header line is still pending;
// - a HeadSplit in the next chunk either finishes that header or extends the body.

use crate::error::{Error, Result};
use crate::sequence::{HeadSplit, IndexEntry, PartialRecord, SequenceEntry, SequenceIndex, StitchedRecord};

struct OpenSequence {
    /// Index of the stitched record that will own the entry.
    owner: usize,
    entry: IndexEntry,
    pending_header: Option<PendingHeader>,
}

struct PendingHeader {
    id_complete: bool,
}

pub struct BoundaryStitcher;

impl BoundaryStitcher {
    /// REDUCE: Single sequential pass over records in `worker_id` order.
    pub fn reduce(records: Vec<PartialRecord>) -> Result<SequenceIndex> {
        let mut out: Vec<StitchedRecord> = Vec::with_capacity(records.len());
        let mut open: Option<OpenSequence> = None;
        // text before the first header, possibly continued by later chunks
        let mut in_preamble = false;

        for (i, record) in records.into_iter().enumerate() {
            if record.worker_id != i {
                return Err(Error::malformed(
                    i,
                    format!("records out of order: expected worker {}, found {}", i, record.worker_id),
                ));
            }

            out.push(StitchedRecord {
                worker_id: record.worker_id,
                min_range: record.min_range,
                max_range: record.max_range,
                entries: Vec::new(),
            });

            let count = record.sequences.len();
            for (k, sequence) in record.sequences.into_iter().enumerate() {
                if k == 0 && !matches!(sequence, SequenceEntry::HeadSplit(_)) {
                    if let Some(pending) = open.as_ref().filter(|o| o.pending_header.is_some()) {
                        return Err(Error::malformed(
                            i,
                            format!(
                                "split header at offset {} has no continuation",
                                pending.entry.header_offset
                            ),
                        ));
                    }
                }

                match sequence {
                    SequenceEntry::Preamble { length } => {
                        if i != 0 || k != 0 {
                            return Err(Error::malformed(i, "preamble outside the start of the first chunk"));
                        }
                        tracing::debug!(length, "skipping text before the first header");
                        in_preamble = true;
                    }
                    SequenceEntry::HeadSplit(lead) => {
                        if k != 0 {
                            return Err(Error::malformed(i, "head-split fragment is not the first entry"));
                        }
                        match open.take() {
                            Some(current) => open = Some(Self::extend(current, lead, i, &mut out)),
                            None if in_preamble => {}
                            None => {
                                return Err(Error::malformed(i, "head-split fragment without a preceding sequence"));
                            }
                        }
                    }
                    SequenceEntry::Complete(entry) => {
                        in_preamble = false;
                        Self::close(open.take(), &mut out);
                        open = Some(OpenSequence { owner: i, entry, pending_header: None });
                    }
                    SequenceEntry::TailSplit(tail) => {
                        if k + 1 != count {
                            return Err(Error::malformed(i, "tail-split marker is not the last entry"));
                        }
                        in_preamble = false;
                        Self::close(open.take(), &mut out);
                        open = Some(OpenSequence {
                            owner: i,
                            entry: IndexEntry {
                                id: tail.partial_id,
                                span_count: 1,
                                header_offset: tail.header_offset,
                                base_offset: tail.header_offset,
                                base_length: 0,
                            },
                            pending_header: Some(PendingHeader { id_complete: tail.id_complete }),
                        });
                    }
                }
            }
        }

        if let Some(mut last) = open {
            // A header cut by the end of the object has no bases.
            if last.pending_header.take().is_some() {
                last.entry.base_offset = out.last().map_or(last.entry.header_offset, |r| r.max_range);
            }
            Self::close(Some(last), &mut out);
        }

        tracing::debug!(partitions = out.len(), "stitched partition boundaries");

        Ok(SequenceIndex { records: out })
    }

    fn extend(mut open: OpenSequence, lead: HeadSplit, i: usize, out: &mut [StitchedRecord]) -> OpenSequence {
        if lead.contributes() {
            open.entry.span_count += 1;
        }

        match open.pending_header.take() {
            Some(mut pending) => {
                if !pending.id_complete {
                    open.entry.id.push_str(&lead.continuation);
                    pending.id_complete = lead.first_line_has_space || lead.first_line_terminated;
                }

                match lead.after_first_line {
                    Some(bases) => {
                        open.entry.base_offset = bases.offset;
                        open.entry.base_length = bases.length;

                        // The header belongs entirely to the chunk that finished it.
                        let header_offset = open.entry.header_offset;
                        for record in &mut out[open.owner..i] {
                            record.max_range = header_offset;
                        }
                        for record in &mut out[open.owner + 1..=i] {
                            record.min_range = header_offset;
                        }
                        open.owner = i;
                    }
                    None => open.pending_header = Some(pending),
                }
            }
            None => open.entry.base_length += lead.body.length,
        }

        open
    }

    fn close(open: Option<OpenSequence>, out: &mut [StitchedRecord]) {
        if let Some(done) = open {
            out[done.owner].entries.push(done.entry);
        }
    }
}
