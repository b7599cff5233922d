use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

/// Blob store the processed videos are published to.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads the file at `path` under `key`. The object is either fully
    /// stored or not at all.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        // Streams from disk; the artifact is never buffered in memory.
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to open {} for upload", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .with_context(|| format!("PutObject failed for s3://{}/{}", self.bucket, key))?;

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("DeleteObject failed for s3://{}/{}", self.bucket, key))?;
        Ok(())
    }
}
