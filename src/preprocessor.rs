// src/preprocessor.rs
// PREPROCESSOR CAPABILITY
// A cloud object is staged by one of two kinds of preprocessor:
// - Batch: the whole object in one call (small objects).
// - MapReduce: one `map` per byte range, then a single sequential `reduce`.
// The kind is chosen by configuration (`PreprocessorKind`), never by introspection.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::partition::ObjectRange;
use crate::scanner::ChunkScanner;
use crate::sequence::{PartialRecord, SequenceIndex};
use crate::stitcher::BoundaryStitcher;
use crate::storage::{Metadata, ObjectAddress};

/// Addressing and partition info handed to every preprocessor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessMeta {
    pub object: ObjectAddress,
    pub meta: ObjectAddress,
    pub worker_id: usize,
    pub chunk_size: u64,
    pub obj_size: u64,
    pub partitions: usize,
}

impl PreprocessMeta {
    pub fn for_range(object: &ObjectAddress, range: &ObjectRange) -> Self {
        Self {
            object: object.clone(),
            meta: object.meta(),
            worker_id: range.worker_id,
            chunk_size: range.chunk_size,
            obj_size: range.total_size,
            partitions: range.partition_count,
        }
    }

    /// Batch calls see the object as a single partition.
    pub fn whole(object: &ObjectAddress, obj_size: u64) -> Self {
        Self::for_range(object, &ObjectRange::for_worker(0, obj_size, obj_size, 1))
    }

    /// The byte range this call is responsible for.
    pub fn range(&self) -> ObjectRange {
        ObjectRange::for_worker(self.worker_id, self.chunk_size, self.obj_size, self.partitions)
    }
}

/// Body and user metadata to stage as the meta object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreprocessOutput {
    pub body: Vec<u8>,
    pub metadata: Metadata,
}

impl PreprocessOutput {
    /// Metadata travels as HTTP headers: keys must be non-empty visible ASCII,
    /// values printable ASCII.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.metadata {
            if key.is_empty() || !key.bytes().all(|b| b.is_ascii_graphic()) {
                return Err(Error::processing(format!("invalid metadata key {:?}", key)));
            }
            if !value.bytes().all(|b| b == b' ' || b.is_ascii_graphic()) {
                return Err(Error::processing(format!("invalid metadata value for {:?}: {:?}", key, value)));
            }
        }
        Ok(())
    }
}

pub trait BatchPreprocessor: Send + Sync {
    fn preprocess(&self, data: &[u8], meta: &PreprocessMeta) -> Result<PreprocessOutput>;
}

pub trait MapReducePreprocessor: Send + Sync {
    /// Pure function of one chunk; safe to run on any thread.
    fn map(&self, chunk: &[u8], meta: &PreprocessMeta) -> Result<PartialRecord>;

    /// Receives every map result, ordered by `worker_id`.
    fn reduce(&self, results: Vec<PartialRecord>) -> Result<PreprocessOutput>;
}

#[derive(Clone)]
pub enum Preprocessor {
    Batch(Arc<dyn BatchPreprocessor>),
    MapReduce(Arc<dyn MapReducePreprocessor>),
}

impl fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preprocessor::Batch(_) => f.write_str("Preprocessor::Batch"),
            Preprocessor::MapReduce(_) => f.write_str("Preprocessor::MapReduce"),
        }
    }
}

/// Configuration name of a preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessorKind {
    /// FASTA index built with map/reduce over byte ranges.
    Fasta,
    /// FASTA index built from the whole object in one pass.
    FastaBatch,
}

impl PreprocessorKind {
    pub fn build(self) -> Preprocessor {
        match self {
            PreprocessorKind::Fasta => Preprocessor::MapReduce(Arc::new(FastaPreprocessor)),
            PreprocessorKind::FastaBatch => Preprocessor::Batch(Arc::new(FastaPreprocessor)),
        }
    }
}

impl FromStr for PreprocessorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fasta" => Ok(PreprocessorKind::Fasta),
            "fasta-batch" => Ok(PreprocessorKind::FastaBatch),
            other => Err(Error::configuration(format!(
                "unknown preprocessor '{}' (expected 'fasta' or 'fasta-batch')",
                other
            ))),
        }
    }
}

impl fmt::Display for PreprocessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreprocessorKind::Fasta => f.write_str("fasta"),
            PreprocessorKind::FastaBatch => f.write_str("fasta-batch"),
        }
    }
}

/// Builds the sequence index of a FASTA object.
pub struct FastaPreprocessor;

impl FastaPreprocessor {
    fn output(index: &SequenceIndex) -> PreprocessOutput {
        let body = index.to_tsv().into_bytes();

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&body);

        let mut metadata = Metadata::new();
        metadata.insert("sequences".into(), index.len().to_string());
        metadata.insert("partitions".into(), index.records.len().to_string());
        metadata.insert("index_crc32".into(), format!("{:08x}", hasher.finalize()));

        PreprocessOutput { body, metadata }
    }
}

impl MapReducePreprocessor for FastaPreprocessor {
    fn map(&self, chunk: &[u8], meta: &PreprocessMeta) -> Result<PartialRecord> {
        ChunkScanner::scan(chunk, &meta.range())
    }

    fn reduce(&self, results: Vec<PartialRecord>) -> Result<PreprocessOutput> {
        let index = BoundaryStitcher::reduce(results)?;
        Ok(Self::output(&index))
    }
}

impl BatchPreprocessor for FastaPreprocessor {
    fn preprocess(&self, data: &[u8], meta: &PreprocessMeta) -> Result<PreprocessOutput> {
        let record = ChunkScanner::scan(data, &meta.range())?;
        let index = BoundaryStitcher::reduce(vec![record])?;
        Ok(Self::output(&index))
    }
}
