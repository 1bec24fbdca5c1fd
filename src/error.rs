// src/error.rs
// ERROR TAXONOMY
// Shared by the partitioner, the map/reduce indexer and the storage layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Object or meta object is absent from the store.
    #[error("Not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Invalid partitioning request or preprocessor selection.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The stitcher met a split marker without its counterpart.
    #[error("Malformed partition boundary at partition {partition}: {reason}")]
    MalformedBoundary { partition: usize, reason: String },

    /// Any storage failure other than a missing object. Propagated unchanged.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A preprocessor returned an output that failed validation.
    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Object already exists: s3://{bucket}/{key}")]
    AlreadyExists { bucket: String, key: String },

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed(partition: usize, reason: impl Into<String>) -> Self {
        Self::MalformedBoundary {
            partition,
            reason: reason.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
