//! Object storage sinks for export artifacts.

use std::path::{Path, PathBuf};

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("S3 put of s3://{bucket}/{key} failed: {message}")]
    S3 {
        bucket: String,
        key: String,
        message: String,
    },
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),
}

/// Durable write of an artifact under `bucket`/`key`.
#[allow(async_fn_in_trait)]
pub trait ArtifactStore {
    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
}

/// Amazon S3 sink. Credentials and region come from the standard AWS
/// environment chain.
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_s3::Client::new(&config))
    }
}

impl ArtifactStore for S3Store {
    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::S3 {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        tracing::info!(bucket, key, size, "Stored artifact in S3");
        Ok(())
    }
}

/// Filesystem sink laid out as `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `bucket`/`key` lands on disk. Keys may not escape the bucket.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let mut path = self.root.join(bucket);
        for segment in key.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(StorageError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

impl ArtifactStore for LocalStore {
    async fn put_object(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let size = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path.display(), size, "Stored artifact on disk");
        Ok(())
    }
}
