// src/storage.rs
// OBJECT STORAGE
// The indexer needs four calls from a store: head, (ranged) get, put with
// user metadata, and file upload. `S3Store` talks to S3-compatible services;
// `MemoryStore` keeps everything in process.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::RwLock;

use crate::error::{Error, Result};

/// User metadata attached to an object.
pub type Metadata = BTreeMap<String, String>;

/// Suffix appended to both bucket and key of an object to address its meta object.
pub const META_SUFFIX: &str = ".meta";

/// Bucket/key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectAddress {
    pub bucket: String,
    pub key: String,
}

impl ObjectAddress {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), key: key.into() }
    }

    /// Splits `s3://bucket/key/to/object` (the scheme is optional).
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.strip_prefix("s3://").unwrap_or(path);
        match trimmed.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self::new(bucket, key)),
            _ => Err(Error::InvalidPath(format!(
                "expected 's3://bucket/key', got '{}'",
                path
            ))),
        }
    }

    /// Where the preprocessed output of this object is staged.
    pub fn meta(&self) -> Self {
        Self::new(
            format!("{}{}", self.bucket, META_SUFFIX),
            format!("{}{}", self.key, META_SUFFIX),
        )
    }
}

impl fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub metadata: Metadata,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size and user metadata, or `Error::NotFound`.
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead>;

    /// Whole object, or the half-open byte `range` of it.
    async fn get_object(&self, bucket: &str, key: &str, range: Option<Range<u64>>) -> Result<Vec<u8>>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, metadata: Metadata) -> Result<()>;

    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<()>;

    /// Existence probe: NotFound becomes `false`, every other error propagates.
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match self.head_object(bucket, key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

struct StoredObject {
    body: Vec<u8>,
    metadata: Metadata,
}

/// In-process store. Ranged reads follow S3: the end is clamped to the object
/// size, a start past the end is an error.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> Error {
        Error::storage("memory store lock poisoned")
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let objects = self.objects.read().map_err(|_| Self::poisoned())?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| ObjectHead { size: o.body.len() as u64, metadata: o.metadata.clone() })
            .ok_or_else(|| Error::not_found(bucket, key))
    }

    async fn get_object(&self, bucket: &str, key: &str, range: Option<Range<u64>>) -> Result<Vec<u8>> {
        let objects = self.objects.read().map_err(|_| Self::poisoned())?;
        let object = objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| Error::not_found(bucket, key))?;

        let Some(range) = range else {
            return Ok(object.body.clone());
        };

        let size = object.body.len() as u64;
        if range.start >= size || range.start > range.end {
            return Err(Error::storage(format!(
                "invalid range {}..{} for s3://{}/{} of {} bytes",
                range.start, range.end, bucket, key, size
            )));
        }
        let end = range.end.min(size);
        Ok(object.body[range.start as usize..end as usize].to_vec())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, metadata: Metadata) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| Self::poisoned())?;
        objects.insert((bucket.to_string(), key.to_string()), StoredObject { body, metadata });
        Ok(())
    }

    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<()> {
        let body = tokio::fs::read(path).await?;
        self.put_object(bucket, key, body, Metadata::new()).await
    }
}
