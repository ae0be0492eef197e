use tracing::warn;

use crate::path;
use crate::store::{BlobId, BlobStore, StoreError};

/// A batch of freshly written blobs destined for one folder.
///
/// Blobs are written before the batch is pushed. If the push fails the
///  caller runs [`FilesBulk::revert`] to delete them again.
#[derive(Debug, Clone, Default)]
pub struct FilesBulk {
    pub path: String,
    pub files: Vec<(BlobId, String)>,
}

impl FilesBulk {
    pub fn new(path: &str) -> Self {
        Self {
            path: path::format_dir(path),
            files: Vec::new(),
        }
    }

    pub fn add_file(&mut self, blob_id: BlobId, name: impl Into<String>) {
        self.files.push((blob_id, name.into()));
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Delete every blob of the batch. Keeps going past individual
    ///  failures and reports the first one.
    pub async fn revert(&self, blobs: &dyn BlobStore) -> Result<(), StoreError> {
        let mut first_error = None;
        for (blob_id, name) in &self.files {
            if let Err(e) = blobs.delete(*blob_id).await {
                warn!(%blob_id, name, error = %e, "failed to revert blob");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
