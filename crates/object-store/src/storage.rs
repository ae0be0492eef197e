//! Object storage backend abstraction (S3/MinIO/local filesystem/memory).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use common::store::BlobId;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SqlStoreError};

/// Configuration for the object storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectStoreConfig {
    /// In-memory storage, lost on exit
    #[default]
    Memory,

    /// Local filesystem storage
    Local {
        /// Path to the storage directory
        path: PathBuf,
    },

    /// S3-compatible storage (AWS S3, MinIO, etc.)
    S3 {
        /// S3 endpoint URL (e.g., "http://localhost:9000" for MinIO)
        endpoint: String,
        access_key: String,
        secret_key: String,
        bucket: String,
        /// Defaults to "us-east-1"
        region: Option<String>,
    },
}

/// Wrapper around different object storage backends.
#[derive(Debug, Clone)]
pub(crate) struct Storage {
    inner: Arc<dyn ObjectStore>,
}

impl Storage {
    /// Create a new storage backend from configuration.
    pub async fn new(config: ObjectStoreConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match &config {
            ObjectStoreConfig::Memory => Arc::new(InMemory::new()),

            ObjectStoreConfig::Local { path } => {
                tokio::fs::create_dir_all(path).await?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(|e| SqlStoreError::InvalidConfig(e.to_string()))?,
                )
            }

            ObjectStoreConfig::S3 {
                endpoint,
                access_key,
                secret_key,
                bucket,
                region,
            } => {
                let builder = AmazonS3Builder::new()
                    .with_endpoint(endpoint)
                    .with_access_key_id(access_key)
                    .with_secret_access_key(secret_key)
                    .with_bucket_name(bucket)
                    .with_region(region.as_deref().unwrap_or("us-east-1"))
                    .with_allow_http(endpoint.starts_with("http://"));

                let store: Arc<dyn ObjectStore> = Arc::new(
                    builder
                        .build()
                        .map_err(|e| SqlStoreError::InvalidConfig(e.to_string()))?,
                );

                // Fail fast if the bucket is missing
                {
                    use futures::TryStreamExt;
                    let prefix = ObjectPath::from("");
                    let mut stream = store.list(Some(&prefix));
                    match stream.try_next().await {
                        Ok(_) => {}
                        Err(object_store::Error::NotFound { .. }) => {
                            return Err(SqlStoreError::BucketNotFound(bucket.clone()));
                        }
                        Err(e) => {
                            let msg = e.to_string();
                            if msg.contains("NoSuchBucket")
                                || msg.contains("bucket") && msg.contains("not")
                            {
                                return Err(SqlStoreError::BucketNotFound(bucket.clone()));
                            }
                            return Err(e.into());
                        }
                    }
                }

                store
            }
        };

        Ok(Self { inner })
    }

    fn blob_path(id: BlobId) -> ObjectPath {
        ObjectPath::from(format!("blobs/{}", id))
    }

    pub async fn put(&self, id: BlobId, data: Bytes) -> Result<()> {
        self.inner.put(&Self::blob_path(id), data.into()).await?;
        Ok(())
    }

    pub async fn get(&self, id: BlobId) -> Result<Option<Bytes>> {
        match self.inner.get(&Self::blob_path(id)).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete blob data. Missing objects are ignored.
    pub async fn delete(&self, id: BlobId) -> Result<()> {
        match self.inner.delete(&Self::blob_path(id)).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
impl Storage {
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage() {
        let storage = Storage::memory();
        let id = BlobId::generate();
        let data = Bytes::from("hello world");

        storage.put(id, data.clone()).await.unwrap();
        assert_eq!(storage.get(id).await.unwrap().unwrap(), data);

        storage.delete(id).await.unwrap();
        assert!(storage.get(id).await.unwrap().is_none());
        // Second delete is a no-op
        storage.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_storage() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = ObjectStoreConfig::Local {
            path: temp_dir.path().to_path_buf(),
        };
        let storage = Storage::new(config).await.unwrap();

        let id = BlobId::generate();
        storage.put(id, Bytes::from("test data")).await.unwrap();
        assert_eq!(
            storage.get(id).await.unwrap().unwrap(),
            Bytes::from("test data")
        );

        let file_path = temp_dir.path().join("blobs").join(id.to_string());
        assert!(file_path.exists());
    }

    #[test]
    fn test_config_tagged_by_type() {
        let config: ObjectStoreConfig =
            serde_json::from_str(r#"{"type":"local","path":"/var/lib/strata/objects"}"#).unwrap();
        assert_eq!(
            config,
            ObjectStoreConfig::Local {
                path: PathBuf::from("/var/lib/strata/objects")
            }
        );
        let config: ObjectStoreConfig = serde_json::from_str(r#"{"type":"memory"}"#).unwrap();
        assert_eq!(config, ObjectStoreConfig::Memory);
    }
}
