// src/scanner.rs
// CHUNK SCANNER (MAP)
// Scans one byte range of a FASTA object and reports every header it sees,
// plus the two kinds of fragments a chunk boundary can leave behind:
// - HeadSplit: bytes before the chunk's first header (continuation of the previous chunk).
// - TailSplit: a header line cut by the chunk end.
// On worker 0 the bytes before the first header are a Preamble instead.
// All offsets are absolute positions in the whole object.

use crate::error::{Error, Result};
use crate::partition::ObjectRange;
use crate::sequence::{Candidate, HeadSplit, IndexEntry, PartialRecord, SequenceEntry, TailSplit};

pub struct ChunkScanner;

impl ChunkScanner {
    /// Scans `data`, which must be exactly the bytes of `range`.
    pub fn scan(data: &[u8], range: &ObjectRange) -> Result<PartialRecord> {
        if data.len() as u64 != range.len() {
            return Err(Error::processing(format!(
                "worker {} received {} bytes for range {}..{}",
                range.worker_id,
                data.len(),
                range.start_offset,
                range.end_offset
            )));
        }

        let min_range = range.start_offset;
        let mut record = PartialRecord {
            worker_id: range.worker_id,
            min_range,
            max_range: range.end_offset,
            sequences: Vec::new(),
        };

        if data.is_empty() {
            return Ok(record);
        }

        let line_heads = line_heads(data);
        let mut heads = header_lines(data);

        // A '>' in the first line of a later chunk with no terminated line
        // before it sits inside a split header's text (e.g. "(1->5)").
        if !range.is_first() {
            if let Some(&(start, _)) = heads.first() {
                if start > 0 && !data[..start].contains(&b'\n') {
                    tracing::debug!(worker = range.worker_id, offset = min_range + start as u64, "discarding '>' inside split header");
                    heads.remove(0);
                }
            }
        }

        let first_start = match (heads.first(), line_heads.first()) {
            (Some(&(h, _)), Some(&l)) => Some(h.min(l)),
            (Some(&(h, _)), None) => Some(h),
            (None, Some(&l)) => Some(l),
            (None, None) => None,
        };

        let Some(first_start) = first_start else {
            // Nothing but continuation, or a preamble on worker 0.
            record.sequences.push(leading_entry(data, range));
            return Ok(record);
        };

        if first_start > 0 {
            record.sequences.push(leading_entry(&data[..first_start], range));
        }

        // (entry, in-chunk base start) of the sequence whose length is still open
        let mut open: Option<(IndexEntry, usize)> = None;

        for &(start, end) in &heads {
            finalize(&mut record, open.take(), data, start);
            let (id, _) = split_id(&data[start + 1..end - 1]);
            open = Some((
                IndexEntry {
                    id,
                    span_count: 1,
                    header_offset: min_range + start as u64,
                    base_offset: min_range + end as u64,
                    base_length: 0,
                },
                end,
            ));
        }

        let last_head_start = heads.last().map(|&(start, _)| start);
        let cut = line_heads
            .last()
            .copied()
            .filter(|&lh| last_head_start.map_or(true, |start| lh > start));

        match cut {
            Some(lh) => {
                finalize(&mut record, open.take(), data, lh);
                let (partial_id, id_complete) = split_id(&data[lh + 1..]);
                record.sequences.push(SequenceEntry::TailSplit(TailSplit {
                    partial_id,
                    id_complete,
                    header_offset: min_range + lh as u64,
                }));
            }
            None => finalize(&mut record, open.take(), data, data.len()),
        }

        tracing::debug!(
            worker = range.worker_id,
            min_range,
            max_range = range.end_offset,
            entries = record.sequences.len(),
            "scanned chunk"
        );

        Ok(record)
    }
}

/// Positions of '>' at the start of a line.
fn line_heads(data: &[u8]) -> Vec<usize> {
    let mut out = Vec::new();
    if data.first() == Some(&b'>') {
        out.push(0);
    }
    out.extend(
        data.windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] == b'\n' && w[1] == b'>')
            .map(|(i, _)| i + 1),
    );
    out
}

/// Newline-terminated header lines as `(start, end)`, `end` one past the '\n'.
/// Scanning resumes after each newline, so only the first '>' of a line counts.
fn header_lines(data: &[u8]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while let Some(gt) = find_byte(b'>', &data[cursor..]) {
        let start = cursor + gt;
        let Some(nl) = find_byte(b'\n', &data[start..]) else { break };
        let end = start + nl + 1;
        out.push((start, end));
        cursor = end;
    }
    out
}

fn leading_entry(segment: &[u8], range: &ObjectRange) -> SequenceEntry {
    if range.is_first() {
        SequenceEntry::Preamble { length: segment.len() as u64 }
    } else {
        SequenceEntry::HeadSplit(leading_fragment(segment, range.start_offset))
    }
}

fn leading_fragment(segment: &[u8], min_range: u64) -> HeadSplit {
    let first_nl = find_byte(b'\n', segment);
    let first_line = &segment[..first_nl.unwrap_or(segment.len())];
    let (continuation, first_line_has_space) = split_id(first_line);

    HeadSplit {
        continuation,
        first_line_has_space,
        first_line_terminated: first_nl.is_some(),
        body: Candidate { offset: min_range, length: count_bases(segment) },
        after_first_line: first_nl.map(|nl| Candidate {
            offset: min_range + (nl + 1) as u64,
            length: count_bases(&segment[nl + 1..]),
        }),
    }
}

fn finalize(record: &mut PartialRecord, open: Option<(IndexEntry, usize)>, data: &[u8], stop: usize) {
    if let Some((mut entry, base_start)) = open {
        entry.base_length = count_bases(&data[base_start..stop]);
        record.sequences.push(SequenceEntry::Complete(entry));
    }
}

/// Text up to the first space, and whether a space was found.
fn split_id(text: &[u8]) -> (String, bool) {
    match find_byte(b' ', text) {
        Some(sp) => (String::from_utf8_lossy(&text[..sp]).into_owned(), true),
        None => (String::from_utf8_lossy(text).into_owned(), false),
    }
}

fn count_bases(segment: &[u8]) -> u64 {
    segment.iter().filter(|&&b| b != b'\n').count() as u64
}

fn find_byte(needle: u8, haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartitionSpec, Partitioner};

    fn whole(data: &[u8]) -> ObjectRange {
        ObjectRange::for_worker(0, data.len() as u64, data.len() as u64, 1)
    }

    fn complete(entry: &SequenceEntry) -> &IndexEntry {
        match entry {
            SequenceEntry::Complete(e) => e,
            other => panic!("expected complete entry, got {}", other.kind()),
        }
    }

    #[test]
    fn test_single_chunk_counts_headers_and_bases() {
        let data = b">s1 desc\nACGT\nAC\n>s2\nGG\n>s3\n";
        let record = ChunkScanner::scan(data, &whole(data)).unwrap();
        assert_eq!(record.sequences.len(), 3);

        let s1 = complete(&record.sequences[0]);
        assert_eq!((s1.id.as_str(), s1.header_offset, s1.base_offset, s1.base_length), ("s1", 0, 9, 6));
        let s2 = complete(&record.sequences[1]);
        assert_eq!((s2.id.as_str(), s2.header_offset, s2.base_offset, s2.base_length), ("s2", 17, 21, 2));
        let s3 = complete(&record.sequences[2]);
        assert_eq!((s3.header_offset, s3.base_offset, s3.base_length), (24, 28, 0));
    }

    #[test]
    fn test_base_length_keeps_non_newline_whitespace() {
        let data = b">s1\nAC GT\r\n";
        let record = ChunkScanner::scan(data, &whole(data)).unwrap();
        assert_eq!(complete(&record.sequences[0]).base_length, 6);
    }

    #[test]
    fn test_tail_split_marks_cut_header() {
        let data = b"AAAA\n>seq1 desc\nACGT\n>se";
        let record = ChunkScanner::scan(data, &ObjectRange::for_worker(0, 24, 31, 2)).unwrap();
        assert_eq!(record.sequences.len(), 3);
        assert_eq!(record.sequences[0], SequenceEntry::Preamble { length: 5 });
        assert_eq!(complete(&record.sequences[1]).base_length, 4);
        assert_eq!(
            record.sequences[2],
            SequenceEntry::TailSplit(TailSplit { partial_id: "se".into(), id_complete: false, header_offset: 21 })
        );

        let data = b">a\nAC\n>seq1 de";
        let record = ChunkScanner::scan(data, &ObjectRange::for_worker(0, 14, 30, 3)).unwrap();
        assert_eq!(
            record.sequences[1],
            SequenceEntry::TailSplit(TailSplit { partial_id: "seq1".into(), id_complete: true, header_offset: 6 })
        );
    }

    #[test]
    fn test_head_split_carries_both_candidates() {
        // worker 1 of ">se" | "q2 x\nTT\nTT\n>s3\nA"
        let data = b"q2 x\nTT\nTT\n>s3\nA";
        let range = ObjectRange::for_worker(1, 10, 10 + data.len() as u64, 2);
        let record = ChunkScanner::scan(data, &range).unwrap();

        let SequenceEntry::HeadSplit(lead) = &record.sequences[0] else {
            panic!("expected head-split");
        };
        assert_eq!(lead.continuation, "q2");
        assert!(lead.first_line_has_space);
        assert!(lead.first_line_terminated);
        assert_eq!(lead.body, Candidate { offset: 10, length: 8 });
        assert_eq!(lead.after_first_line, Some(Candidate { offset: 15, length: 4 }));

        let s3 = complete(&record.sequences[1]);
        assert_eq!((s3.id.as_str(), s3.header_offset, s3.base_length), ("s3", 21, 1));
    }

    #[test]
    fn test_body_only_chunk_is_a_continuation() {
        let data = b"ACGT\nACGT\nAC";
        let range = ObjectRange::for_worker(2, 12, 100, 5);
        let record = ChunkScanner::scan(data, &range).unwrap();
        assert_eq!(record.sequences.len(), 1);
        let SequenceEntry::HeadSplit(lead) = &record.sequences[0] else {
            panic!("expected head-split");
        };
        assert_eq!(lead.body.length, 10);
        assert_eq!(lead.after_first_line, Some(Candidate { offset: 29, length: 6 }));

        // on the first worker the same bytes are a preamble
        let record = ChunkScanner::scan(data, &ObjectRange::for_worker(0, 12, 100, 5)).unwrap();
        assert_eq!(record.sequences, vec![SequenceEntry::Preamble { length: 12 }]);
    }

    #[test]
    fn test_false_positive_in_split_header_is_discarded() {
        // chunk starts inside ">tr|P1 alpha-(1->5)-L\n"
        let data = b"-(1->5)-L\nACGT\n>s2\nGG\n";
        let range = ObjectRange::for_worker(1, 20, 20 + data.len() as u64, 2);
        let record = ChunkScanner::scan(data, &range).unwrap();
        assert_eq!(record.sequences.len(), 2);

        let SequenceEntry::HeadSplit(lead) = &record.sequences[0] else {
            panic!("expected head-split");
        };
        assert_eq!(lead.continuation, "-(1->5)-L");
        assert_eq!(lead.after_first_line, Some(Candidate { offset: 30, length: 4 }));
        assert_eq!(complete(&record.sequences[1]).id, "s2");
    }

    #[test]
    fn test_chunk_starting_on_header_has_no_fragment() {
        let data = b">s2\nGG\n";
        let range = ObjectRange::for_worker(1, 9, 16, 2);
        let record = ChunkScanner::scan(data, &range).unwrap();
        assert_eq!(record.sequences.len(), 1);
        assert_eq!(complete(&record.sequences[0]).header_offset, 9);
    }

    #[test]
    fn test_rejects_wrong_chunk_length() {
        let range = ObjectRange::for_worker(0, 10, 20, 2);
        assert!(matches!(ChunkScanner::scan(b">s1\n", &range), Err(Error::Processing(_))));
    }

    #[test]
    fn test_scan_is_idempotent() {
        let text = b">a x\nACGT\nAC\n>b\nGGGG\n>c y\nTT\n";
        let ranges = Partitioner::plan(text.len() as u64, PartitionSpec::by_chunk_size(7)).unwrap();
        for range in &ranges {
            let chunk = &text[range.start_offset as usize..range.end_offset as usize];
            assert_eq!(ChunkScanner::scan(chunk, range).unwrap(), ChunkScanner::scan(chunk, range).unwrap());
        }
    }
}
