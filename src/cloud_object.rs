// src/cloud_object.rs
// CLOUD OBJECT
// A remote object plus its staged "meta object" (bucket.meta / key.meta).
// Preprocessing runs locally: ranges are fetched concurrently from the store,
// mapped on the Rayon pool, reduced on one thread and staged back.

use futures::{StreamExt, TryStreamExt};
use std::path::Path;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::parallel::ParallelProcessor;
use crate::partition::{PartitionSpec, Partitioner};
use crate::preprocessor::{BatchPreprocessor, MapReducePreprocessor, PreprocessMeta, PreprocessOutput, Preprocessor};
use crate::sequence::{parse_tsv, IndexEntry};
use crate::storage::{Metadata, ObjectAddress, ObjectHead, ObjectStore};

/// Default number of range requests in flight during the map phase.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

pub struct CloudObject {
    store: Arc<dyn ObjectStore>,
    path: String,
    object: ObjectAddress,
    meta: ObjectAddress,
    obj_head: Option<ObjectHead>,
    meta_head: Option<ObjectHead>,
    attributes: Metadata,
    fetch_concurrency: usize,
}

impl CloudObject {
    pub fn new(store: Arc<dyn ObjectStore>, s3_path: &str) -> Result<Self> {
        let object = ObjectAddress::parse(s3_path)?;
        let meta = object.meta();
        tracing::debug!(object = %object, meta = %meta, "cloud object");

        Ok(Self {
            store,
            path: s3_path.to_string(),
            object,
            meta,
            obj_head: None,
            meta_head: None,
            attributes: Metadata::new(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        })
    }

    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }

    /// Uploads a local file as a new cloud object. Refuses to overwrite.
    pub async fn from_file(store: Arc<dyn ObjectStore>, file_path: &Path, s3_path: &str) -> Result<Self> {
        let mut object = Self::new(store, s3_path)?;
        if object.exists().await? {
            return Err(Error::AlreadyExists {
                bucket: object.object.bucket.clone(),
                key: object.object.key.clone(),
            });
        }

        object
            .store
            .upload_file(file_path, &object.object.bucket, &object.object.key)
            .await?;
        Ok(object)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn obj_bucket(&self) -> &str {
        &self.object.bucket
    }

    pub fn obj_key(&self) -> &str {
        &self.object.key
    }

    pub fn meta_bucket(&self) -> &str {
        &self.meta.bucket
    }

    pub fn meta_key(&self) -> &str {
        &self.meta.key
    }

    pub async fn exists(&mut self) -> Result<bool> {
        self.fetch().await?;
        Ok(self.obj_head.is_some())
    }

    /// Whether a meta object has been staged.
    pub async fn is_staged(&self) -> Result<bool> {
        self.store.exists(&self.meta.bucket, &self.meta.key).await
    }

    /// Heads of the object and of its meta object, cached once found.
    /// Metadata of the meta object is merged into the attributes.
    pub async fn fetch(&mut self) -> Result<(Option<&ObjectHead>, Option<&ObjectHead>)> {
        if self.obj_head.is_none() {
            tracing::debug!(object = %self.object, "fetching object head");
            self.obj_head = head_or_none(self.store.as_ref(), &self.object).await?;
        }
        if self.meta_head.is_none() {
            tracing::debug!(meta = %self.meta, "fetching meta head");
            self.meta_head = head_or_none(self.store.as_ref(), &self.meta).await?;
            if let Some(head) = &self.meta_head {
                self.attributes.extend(head.metadata.clone());
            }
        }
        Ok((self.obj_head.as_ref(), self.meta_head.as_ref()))
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn attributes(&self) -> &Metadata {
        &self.attributes
    }

    /// Runs `preprocessor` over the object and stages its output.
    /// `spec` is only consulted by map/reduce preprocessors.
    pub async fn force_preprocess(&mut self, preprocessor: &Preprocessor, spec: PartitionSpec) -> Result<()> {
        let output = match preprocessor {
            Preprocessor::Batch(batch) => self.run_batch(batch.as_ref()).await?,
            Preprocessor::MapReduce(map_reduce) => self.run_map_reduce(Arc::clone(map_reduce), spec).await?,
        };
        self.stage(output).await
    }

    async fn run_batch(&self, preprocessor: &dyn BatchPreprocessor) -> Result<PreprocessOutput> {
        let data = self
            .store
            .get_object(&self.object.bucket, &self.object.key, None)
            .await?;
        let meta = PreprocessMeta::whole(&self.object, data.len() as u64);

        tracing::info!(object = %self.object, size = data.len(), "batch preprocessing");
        let output = preprocessor.preprocess(&data, &meta)?;
        output.validate()?;
        Ok(output)
    }

    async fn run_map_reduce(
        &self,
        preprocessor: Arc<dyn MapReducePreprocessor>,
        spec: PartitionSpec,
    ) -> Result<PreprocessOutput> {
        let head = self.store.head_object(&self.object.bucket, &self.object.key).await?;
        let ranges = Partitioner::plan(head.size, spec)?;

        tracing::info!(
            object = %self.object,
            size = head.size,
            partitions = ranges.len(),
            "map/reduce preprocessing"
        );

        let fetches = ranges.into_iter().map(|range| {
            let store = Arc::clone(&self.store);
            let meta = PreprocessMeta::for_range(&self.object, &range);
            async move {
                if range.is_empty() {
                    return Ok((meta, Vec::new()));
                }
                let data = store
                    .get_object(&meta.object.bucket, &meta.object.key, Some(range.as_range()))
                    .await?;
                Ok::<_, Error>((meta, data))
            }
        });

        let chunks: Vec<(PreprocessMeta, Vec<u8>)> = futures::stream::iter(fetches)
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await?;

        let mapper = Arc::clone(&preprocessor);
        let partials = tokio::task::spawn_blocking(move || ParallelProcessor::map_chunks(mapper.as_ref(), chunks))
            .await
            .map_err(|e| Error::processing(format!("map phase aborted: {}", e)))??;

        let output = preprocessor.reduce(partials)?;
        output.validate()?;
        Ok(output)
    }

    async fn stage(&mut self, output: PreprocessOutput) -> Result<()> {
        let PreprocessOutput { body, metadata } = output;
        let body_len = body.len();

        self.store
            .put_object(&self.meta.bucket, &self.meta.key, body, metadata.clone())
            .await?;

        tracing::info!(meta = %self.meta, bytes = body_len, "staged meta object");
        self.attributes.extend(metadata);
        self.meta_head = None;
        Ok(())
    }

    /// Raw body of the staged meta object.
    pub async fn meta_object(&self) -> Result<Vec<u8>> {
        self.store.get_object(&self.meta.bucket, &self.meta.key, None).await
    }

    /// Staged FASTA index, in object order.
    pub async fn load_index(&self) -> Result<Vec<IndexEntry>> {
        let body = self.meta_object().await?;
        let text = String::from_utf8(body)
            .map_err(|_| Error::processing(format!("index at {} is not UTF-8", self.meta)))?;
        parse_tsv(&text)
    }

    /// Bases of sequence `id`, newlines stripped, fetched with one ranged read.
    pub async fn get_sequence(&mut self, id: &str) -> Result<Vec<u8>> {
        let index = self.load_index().await?;
        let position = index
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Error::not_found(&self.meta.bucket, format!("{}#{}", self.meta.key, id)))?;
        let entry = &index[position];

        let end = match index.get(position + 1) {
            Some(next) => next.header_offset,
            None => {
                self.fetch().await?;
                self.obj_head
                    .as_ref()
                    .map(|h| h.size)
                    .ok_or_else(|| Error::not_found(&self.object.bucket, &self.object.key))?
            }
        };

        if entry.base_offset >= end {
            return Ok(Vec::new());
        }

        let raw = self
            .store
            .get_object(&self.object.bucket, &self.object.key, Some(entry.base_offset..end))
            .await?;
        let bases: Vec<u8> = raw.into_iter().filter(|&b| b != b'\n').collect();

        if bases.len() as u64 != entry.base_length {
            return Err(Error::processing(format!(
                "index for {} is stale: '{}' has {} bases, expected {}",
                self.object,
                id,
                bases.len(),
                entry.base_length
            )));
        }
        Ok(bases)
    }
}

async fn head_or_none(store: &dyn ObjectStore, address: &ObjectAddress) -> Result<Option<ObjectHead>> {
    match store.head_object(&address.bucket, &address.key).await {
        Ok(head) => Ok(Some(head)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
