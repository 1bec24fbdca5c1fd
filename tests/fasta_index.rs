// Multi-chunk indexing must agree with a straight line-by-line reading of the file.

use cloudseq::parallel::ParallelProcessor;
use cloudseq::scanner::ChunkScanner;
use cloudseq::sequence::{PartialRecord, SequenceEntry};
use cloudseq::stitcher::BoundaryStitcher;
use cloudseq::{Error, IndexEntry, PartitionSpec, Partitioner, SequenceIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// (id, header_offset, base_offset, base_length, end of sequence)
fn reference_index(text: &[u8]) -> Vec<(String, u64, u64, u64, u64)> {
    let mut out: Vec<(String, u64, u64, u64, u64)> = Vec::new();
    let mut pos = 0usize;
    while pos < text.len() {
        let end = text[pos..].iter().position(|&b| b == b'\n').map_or(text.len(), |n| pos + n + 1);
        let line = &text[pos..end];
        if line[0] == b'>' {
            if let Some(last) = out.last_mut() {
                last.4 = pos as u64;
            }
            let name = line[1..].split(|&b| b == b' ' || b == b'\n').next().unwrap_or(&[]);
            out.push((String::from_utf8_lossy(name).into_owned(), pos as u64, end as u64, 0, 0));
        } else if let Some(last) = out.last_mut() {
            last.3 += line.iter().filter(|&&b| b != b'\n').count() as u64;
        }
        pos = end;
    }
    if let Some(last) = out.last_mut() {
        last.4 = text.len() as u64;
    }
    out
}

fn random_fasta(rng: &mut StdRng) -> Vec<u8> {
    let mut text = Vec::new();
    if rng.gen_bool(0.3) {
        for _ in 0..rng.gen_range(1..4) {
            let words = rng.gen_range(0..20);
            text.extend((0..words).map(|_| b"acgt #"[rng.gen_range(0..6)]));
            text.push(b'\n');
        }
    }
    for n in 0..rng.gen_range(1..10) {
        text.push(b'>');
        text.extend_from_slice(format!("seq{}", n).as_bytes());
        if rng.gen_bool(0.5) {
            text.extend_from_slice(b" sample description");
        }
        text.push(b'\n');

        let width = rng.gen_range(1..16);
        let bases = if rng.gen_bool(0.1) { 0 } else { rng.gen_range(1..80) };
        for i in 0..bases {
            text.push(b"ACGTN"[rng.gen_range(0..5)]);
            if (i + 1) % width == 0 || i + 1 == bases {
                text.push(b'\n');
            }
        }
    }
    text
}

fn map_all(text: &[u8], spec: PartitionSpec) -> Vec<PartialRecord> {
    Partitioner::plan(text.len() as u64, spec)
        .unwrap()
        .iter()
        .map(|r| ChunkScanner::scan(&text[r.start_offset as usize..r.end_offset as usize], r).unwrap())
        .collect()
}

fn assert_matches_reference(text: &[u8], spec: PartitionSpec) {
    let ranges = Partitioner::plan(text.len() as u64, spec).unwrap();
    let index = ParallelProcessor::index_bytes(text, spec).unwrap();
    let expected = reference_index(text);

    let entries: Vec<&IndexEntry> = index.entries().collect();
    assert_eq!(entries.len(), expected.len(), "{:?} on {:?}", spec, String::from_utf8_lossy(text));

    for (entry, (id, header_offset, base_offset, base_length, end)) in entries.iter().zip(&expected) {
        assert_eq!(&entry.id, id);
        assert_eq!(entry.header_offset, *header_offset, "{}", id);
        assert_eq!(entry.base_offset, *base_offset, "{}", id);
        assert_eq!(entry.base_length, *base_length, "{}", id);

        let span = ranges
            .iter()
            .filter(|r| {
                let lo = r.start_offset.max(*header_offset) as usize;
                let hi = r.end_offset.min(*end) as usize;
                lo < hi && text[lo..hi].iter().any(|&b| b != b'\n')
            })
            .count() as u32;
        assert_eq!(entry.span_count, span, "span of {} with {:?}", id, spec);
    }

    assert_contiguous(&index, text.len() as u64);
}

fn assert_contiguous(index: &SequenceIndex, size: u64) {
    assert_eq!(index.records.first().map(|r| r.min_range), Some(0));
    assert_eq!(index.records.last().map(|r| r.max_range), Some(size));
    for pair in index.records.windows(2) {
        assert_eq!(pair[0].max_range, pair[1].min_range);
    }
    for record in &index.records {
        for entry in &record.entries {
            assert!(entry.header_offset >= record.min_range && entry.header_offset < record.max_range);
        }
    }
}

#[test]
fn test_random_files_match_line_reading() {
    let mut rng = StdRng::seed_from_u64(0x5eed_fa57);
    for _ in 0..60 {
        let text = random_fasta(&mut rng);
        let size = text.len() as u64;

        assert_matches_reference(&text, PartitionSpec::by_workers(1));
        for chunk_size in [1, 2, 3, 5, 7, 13, 64] {
            assert_matches_reference(&text, PartitionSpec::by_chunk_size(chunk_size));
        }
        let random_chunk = rng.gen_range(1..=size);
        assert_matches_reference(&text, PartitionSpec::by_chunk_size(random_chunk));
        assert_matches_reference(&text, PartitionSpec::by_workers(rng.gen_range(1..=size as usize + 4)));
    }
}

#[test]
fn test_every_boundary_of_a_small_file() {
    let text = b">chr1 assembled\nACGTACGT\nAC\n>chr2\n\n>chrM mito\nCATTAG\nGA\n";
    for chunk_size in 1..=text.len() as u64 {
        assert_matches_reference(text, PartitionSpec::by_chunk_size(chunk_size));
    }
}

#[test]
fn test_split_header_scenario() {
    // boundary after ">se" of the second header
    let text = b"AAAA\n>seq1 desc\nACGT\n>seq2\nTTTT\n";
    let index = ParallelProcessor::index_bytes(text, PartitionSpec::by_chunk_size(24)).unwrap();
    let entries = index.into_entries();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], IndexEntry { id: "seq1".into(), span_count: 1, header_offset: 5, base_offset: 16, base_length: 4 });
    assert_eq!(entries[1], IndexEntry { id: "seq2".into(), span_count: 2, header_offset: 21, base_offset: 27, base_length: 4 });
}

#[test]
fn test_preamble_at_every_chunk_size() {
    let text = b"AAAA\n>seq1 desc\nACGT\n>seq2\nTTTT\n";
    for chunk_size in 1..=text.len() as u64 {
        assert_matches_reference(text, PartitionSpec::by_chunk_size(chunk_size));
    }
    for workers in 1..=text.len() {
        assert_matches_reference(text, PartitionSpec::by_workers(workers));
    }
}

#[test]
fn test_boundary_before_gt_inside_header_is_rejected() {
    let text = b">tr|P1 alpha-(1->5)-L\nACGT\n";

    // a '>' at the very start of a chunk always opens a header
    let err = ParallelProcessor::index_bytes(text, PartitionSpec::by_chunk_size(16)).unwrap_err();
    assert!(matches!(err, Error::MalformedBoundary { partition: 1, .. }));

    // one byte either side, the '>' sits inside the chunk's first line and is dropped
    for chunk_size in [15, 17] {
        let entries = ParallelProcessor::index_bytes(text, PartitionSpec::by_chunk_size(chunk_size))
            .unwrap()
            .into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!((entries[0].id.as_str(), entries[0].base_offset, entries[0].base_length), ("tr|P1", 22, 4));
    }
}

#[test]
fn test_split_body_scenario() {
    let text = b">s1\nACGTAC\nGTAC\n>s2\nGG\n";
    // first chunk ends inside the first body line
    let index = ParallelProcessor::index_bytes(text, PartitionSpec::by_chunk_size(8)).unwrap();
    let s1 = index.entries().next().unwrap().clone();

    assert_eq!(s1.base_offset, 4);
    assert_eq!(s1.base_length, 10);
    assert_eq!(s1.span_count, 2);
}

#[test]
fn test_end_to_end_two_entries() {
    let text = b">s1\nAAAA\n>s2\nCCCC\n";
    let index = ParallelProcessor::index_bytes(text, PartitionSpec::by_chunk_size(10)).unwrap();
    let entries = index.into_entries();

    assert_eq!(
        entries,
        vec![
            IndexEntry { id: "s1".into(), span_count: 1, header_offset: 0, base_offset: 4, base_length: 4 },
            IndexEntry { id: "s2".into(), span_count: 2, header_offset: 9, base_offset: 13, base_length: 4 },
        ]
    );
}

#[test]
fn test_reduce_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(7);
    let text = random_fasta(&mut rng);
    let records = map_all(&text, PartitionSpec::by_chunk_size(4));

    let first = BoundaryStitcher::reduce(records.clone()).unwrap();
    let second = BoundaryStitcher::reduce(records.clone()).unwrap();
    assert_eq!(first, second);
    assert_eq!(records, map_all(&text, PartitionSpec::by_chunk_size(4)));
}

#[test]
fn test_head_split_without_predecessor_is_malformed() {
    let text = b">s1\nAAAA\n>s2\nCCCC\n";
    let mut records = map_all(text, PartitionSpec::by_chunk_size(6));
    assert!(matches!(records[1].sequences[0], SequenceEntry::HeadSplit(_)));

    // drop the first chunk and renumber: the fragment now has nothing to continue
    records.remove(0);
    for (i, record) in records.iter_mut().enumerate() {
        record.worker_id = i;
    }
    let err = BoundaryStitcher::reduce(records).unwrap_err();
    assert!(matches!(err, Error::MalformedBoundary { partition: 0, .. }));
}

#[test]
fn test_tsv_round_trip_of_random_index() {
    let mut rng = StdRng::seed_from_u64(42);
    let text = random_fasta(&mut rng);
    let index = ParallelProcessor::index_bytes(&text, PartitionSpec::by_workers(5)).unwrap();
    let parsed = cloudseq::sequence::parse_tsv(&index.to_tsv()).unwrap();
    assert_eq!(parsed, index.into_entries());
}
