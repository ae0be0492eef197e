//! SQLite + Object Storage Backend
//!
//! This crate provides the persistent implementation of the tree, account
//! and blob stores used by the Strata server. SQLite holds every record and
//! blob link count; blob bytes go to pluggable object storage
//! (S3/MinIO/local filesystem/memory).
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use common::store::DynTreeStore;
//! use strata_object_store::SqlStore;
//!
//! # async fn example() -> Result<(), strata_object_store::SqlStoreError> {
//! // Database and objects both live under the data directory
//! let store = SqlStore::new_local(Path::new("/tmp/strata")).await?;
//! let tree: DynTreeStore = Arc::new(store);
//! # Ok(())
//! # }
//! ```

mod database;
mod error;
mod sql_store;
mod storage;

pub use error::{Result, SqlStoreError};
pub use sql_store::{SqlStore, DATABASE_FILE, OBJECTS_DIR};
pub use storage::ObjectStoreConfig;
