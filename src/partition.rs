// src/partition.rs
// RANGE PARTITIONER
// Splits an object of known size into contiguous half-open byte ranges,
// one per map worker.

use serde::Serialize;
use std::ops::Range;

use crate::error::{Error, Result};

/// How the caller wants the object split. Exactly one of the two knobs must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSpec {
    pub chunk_size: Option<u64>,
    pub worker_count: Option<usize>,
}

impl PartitionSpec {
    pub fn by_chunk_size(chunk_size: u64) -> Self {
        Self { chunk_size: Some(chunk_size), worker_count: None }
    }

    pub fn by_workers(worker_count: usize) -> Self {
        Self { chunk_size: None, worker_count: Some(worker_count) }
    }
}

/// One worker's slice of the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectRange {
    pub worker_id: usize,
    pub start_offset: u64,
    pub end_offset: u64,
    pub total_size: u64,
    pub partition_count: usize,
    pub chunk_size: u64,
}

impl ObjectRange {
    /// Recomputes the range owned by `worker_id`. The last worker always ends at
    /// `total_size`, so a rounded-down chunk size never drops the tail.
    pub fn for_worker(worker_id: usize, chunk_size: u64, total_size: u64, partition_count: usize) -> Self {
        let start_offset = (worker_id as u64).saturating_mul(chunk_size).min(total_size);
        let end_offset = if worker_id + 1 >= partition_count {
            total_size
        } else {
            (worker_id as u64 + 1).saturating_mul(chunk_size).min(total_size)
        };

        Self { worker_id, start_offset, end_offset, total_size, partition_count, chunk_size }
    }

    pub fn len(&self) -> u64 {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }

    pub fn is_first(&self) -> bool {
        self.worker_id == 0
    }

    pub fn as_range(&self) -> Range<u64> {
        self.start_offset..self.end_offset
    }
}

pub struct Partitioner;

impl Partitioner {
    /// PLAN: Computes the ranges for every worker.
    ///
    /// - `chunk_size` given: `ceil(size / chunk_size)` partitions.
    /// - `worker_count` given: that many partitions of `round(size / workers)` bytes
    ///   (rounded half up, at least one byte).
    pub fn plan(object_size: u64, spec: PartitionSpec) -> Result<Vec<ObjectRange>> {
        if object_size == 0 {
            return Err(Error::configuration("cannot partition an empty object"));
        }

        let (partition_count, chunk_size) = match (spec.chunk_size, spec.worker_count) {
            (Some(_), Some(_)) => {
                return Err(Error::configuration("both chunk_size and worker_count is not allowed"));
            }
            (None, None) => {
                return Err(Error::configuration("at least chunk_size or worker_count is required"));
            }
            (Some(0), None) => return Err(Error::configuration("chunk_size must be positive")),
            (None, Some(0)) => return Err(Error::configuration("worker_count must be positive")),
            (Some(chunk), None) => (object_size.div_ceil(chunk) as usize, chunk),
            (None, Some(workers)) => {
                let workers_u64 = workers as u64;
                let chunk = ((object_size + workers_u64 / 2) / workers_u64).max(1);
                (workers, chunk)
            }
        };

        tracing::debug!(object_size, partition_count, chunk_size, "planned object partitions");

        Ok((0..partition_count)
            .map(|worker_id| ObjectRange::for_worker(worker_id, chunk_size, object_size, partition_count))
            .collect())
    }
}
