//! Error types for the SQL store.

use common::store::{BlobId, StoreError};

/// Errors that can occur when working with the SQL store.
#[derive(Debug, thiserror::Error)]
pub enum SqlStoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration error
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A rights column held something other than a policy document
    #[error("invalid rights column: {0}")]
    Json(#[from] serde_json::Error),

    /// A blob_id column held something other than a blob id
    #[error("invalid blob id: {0}")]
    InvalidBlobId(String),

    /// A unique key is already taken, or the row a batch targets is missing
    #[error("conflict: {0}")]
    Conflict(String),

    /// Link-count change on a blob that has no row
    #[error("blob not found: {0}")]
    BlobNotFound(BlobId),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// S3 bucket not found - must be created before use
    #[error("S3 bucket '{0}' does not exist. Create it before starting the server.")]
    BucketNotFound(String),
}

impl SqlStoreError {
    /// Turn a unique-constraint violation into a conflict on `what`
    pub(crate) fn on_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(what()),
            _ => Self::Database(err),
        }
    }
}

impl From<SqlStoreError> for StoreError {
    fn from(err: SqlStoreError) -> Self {
        match err {
            SqlStoreError::Conflict(what) => StoreError::Conflict(what),
            SqlStoreError::BlobNotFound(id) => StoreError::BlobNotFound(id),
            other => StoreError::Backend(other.into()),
        }
    }
}

/// Result type alias for SQL store operations.
pub type Result<T> = std::result::Result<T, SqlStoreError>;
