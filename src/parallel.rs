// src/parallel.rs
// PARALLEL MAP ENGINE
// Runs the map phase of a preprocessor over many chunks using Rayon.
// Chunks are independent: no shared state, any failure fails the whole job.

use rayon::prelude::*;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::Result;
use crate::partition::{ObjectRange, PartitionSpec, Partitioner};
use crate::preprocessor::{MapReducePreprocessor, PreprocessMeta};
use crate::scanner::ChunkScanner;
use crate::sequence::{PartialRecord, SequenceIndex};
use crate::stitcher::BoundaryStitcher;

pub struct ParallelProcessor;

impl ParallelProcessor {
    /// MAP: Runs `preprocessor.map` on every fetched chunk.
    /// Output keeps the input order, so results stay sorted by `worker_id`.
    pub fn map_chunks<P>(preprocessor: &P, chunks: Vec<(PreprocessMeta, Vec<u8>)>) -> Result<Vec<PartialRecord>>
    where
        P: MapReducePreprocessor + ?Sized,
    {
        chunks
            .into_par_iter()
            .map(|(meta, data)| preprocessor.map(&data, &meta))
            .collect()
    }

    /// INDEX (in memory): Partitions `data` and runs scan + stitch.
    pub fn index_bytes(data: &[u8], spec: PartitionSpec) -> Result<SequenceIndex> {
        if data.is_empty() {
            return Ok(SequenceIndex::default());
        }

        let ranges = Partitioner::plan(data.len() as u64, spec)?;
        let records = ranges
            .par_iter()
            .map(|range| ChunkScanner::scan(&data[range.start_offset as usize..range.end_offset as usize], range))
            .collect::<Result<Vec<_>>>()?;

        BoundaryStitcher::reduce(records)
    }

    /// INDEX (local file): Every worker opens the file and reads only its own range,
    /// so memory use is bounded by the chunk size times the thread count.
    pub fn index_file(path: &Path, spec: PartitionSpec) -> Result<SequenceIndex> {
        let size = std::fs::metadata(path)?.len();
        if size == 0 {
            return Ok(SequenceIndex::default());
        }

        let ranges = Partitioner::plan(size, spec)?;
        let records = ranges
            .par_iter()
            .map(|range| {
                let chunk = Self::read_range(path, range)?;
                ChunkScanner::scan(&chunk, range)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(path = %path.display(), size, partitions = records.len(), "mapped local file");

        BoundaryStitcher::reduce(records)
    }

    fn read_range(path: &Path, range: &ObjectRange) -> Result<Vec<u8>> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(range.start_offset))?;
        let mut buffer = vec![0u8; range.len() as usize];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}
