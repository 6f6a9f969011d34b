use anyhow::{Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Download failures the pipeline needs to tell apart
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// `Ok(false)` only when the store positively reports the object missing
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Copies the object's bytes into a new file at `dest`, returning the byte count
    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError>;

    fn backend_name(&self) -> &'static str;
}

pub struct S3StorageService {
    client: Client,
}

impl S3StorageService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow!(service_error))
                }
            }
        }
    }

    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError> {
        let res = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(res) => res,
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
                }
                tracing::error!(
                    "S3 get_object failed: bucket={}, key={}, error={:?}",
                    bucket,
                    key,
                    service_error
                );
                return Err(anyhow!(service_error).into());
            }
        };

        let mut reader = Box::pin(res.body.into_async_read());
        let mut file = File::create(dest)
            .await
            .map_err(|e| anyhow!("Failed to create {}: {}", dest.display(), e))?;
        let written = tokio::io::copy(&mut reader, &mut file)
            .await
            .map_err(|e| anyhow!("Failed to download {}/{}: {}", bucket, key, e))?;
        file.flush().await.map_err(anyhow::Error::from)?;

        Ok(written)
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

/// Reads objects straight out of a MinIO data directory (or any
/// `<root>/<bucket>/<key>` tree).
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        match tokio::fs::metadata(self.object_path(bucket, key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(anyhow!("Failed to stat {}/{}: {}", bucket, key, e)),
        }
    }

    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> Result<u64, StorageError> {
        match tokio::fs::copy(self.object_path(bucket, key), dest).await {
            Ok(written) => Ok(written),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
            }
            Err(e) => Err(anyhow!("Failed to copy {}/{}: {}", bucket, key, e).into()),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
