// src/s3.rs
// S3 STORE
// A 404 from the service becomes NotFound. Every other SDK error is reported
// as Storage and propagated. Retries and timeouts are the SDK defaults.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::fmt::Debug;
use std::ops::Range;
use std::path::Path;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use crate::storage::{Metadata, ObjectHead, ObjectStore};

#[derive(Clone)]
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Builds a client from the default AWS config chain plus the overrides in `config`.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some((id, secret)) = config.static_credentials() {
            loader = loader.credentials_provider(Credentials::new(id, secret, None, None, "cloudseq-static"));
        }

        let sdk_config = loader.load().await;
        if sdk_config.region().is_none() {
            return Err(Error::configuration("no AWS region configured (use --region or AWS_REGION)"));
        }

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::debug!(
            region = ?sdk_config.region(),
            endpoint = ?config.endpoint_url,
            path_style = config.force_path_style,
            "connected S3 client"
        );

        Ok(Self { client: Client::from_conf(s3_config) })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectHead> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_s3_error(e, bucket, key))?;

        let metadata = response
            .metadata()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        Ok(ObjectHead {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            metadata,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str, range: Option<Range<u64>>) -> Result<Vec<u8>> {
        // HTTP ranges are inclusive on both ends
        let header = match range {
            Some(r) if r.start >= r.end => return Ok(Vec::new()),
            Some(r) => Some(format!("bytes={}-{}", r.start, r.end - 1)),
            None => None,
        };

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_range(header)
            .send()
            .await
            .map_err(|e| map_s3_error(e, bucket, key))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| Error::storage(format!("failed to read body of s3://{}/{}: {}", bucket, key, e)))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>, metadata: Metadata) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));

        for (k, v) in metadata {
            request = request.metadata(k, v);
        }

        request.send().await.map_err(|e| map_s3_error(e, bucket, key))?;
        Ok(())
    }

    async fn upload_file(&self, path: &Path, bucket: &str, key: &str) -> Result<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::storage(format!("failed to open {}: {}", path.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| map_s3_error(e, bucket, key))?;

        tracing::info!(path = %path.display(), bucket, key, "uploaded file");
        Ok(())
    }
}

fn map_s3_error<E: Debug>(err: SdkError<E>, bucket: &str, key: &str) -> Error {
    match &err {
        SdkError::ServiceError(service_err) => match service_err.raw().status().as_u16() {
            404 => Error::not_found(bucket, key),
            status => Error::storage(format!(
                "S3 error for s3://{}/{} (HTTP {}): {:?}",
                bucket, key, status, err
            )),
        },
        SdkError::TimeoutError(_) => Error::storage(format!("S3 timeout for s3://{}/{}: {:?}", bucket, key, err)),
        SdkError::DispatchFailure(_) => {
            Error::storage(format!("S3 connection error for s3://{}/{}: {:?}", bucket, key, err))
        }
        _ => Error::storage(format!("S3 error for s3://{}/{}: {:?}", bucket, key, err)),
    }
}
