//! SqlStore - the tree, account and blob stores backed by SQLite + object storage.
//!
//! Metadata (folders, files, users, groups, blob link counts) lives in
//! SQLite. Blob bytes live in the configured object storage.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use common::accounts::{Group, Session, User};
use common::rights::Rights;
use common::store::{AccountStore, BlobId, BlobStore, FolderRecord, StoreError, TreeStore};
use common::tree::File;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::error::{Result, SqlStoreError};
use crate::storage::{ObjectStoreConfig, Storage};

/// File name of the SQLite database inside a data directory
pub const DATABASE_FILE: &str = "strata.db";
/// Directory holding blob objects inside a data directory
pub const OBJECTS_DIR: &str = "objects";

#[derive(Debug, Clone)]
pub struct SqlStore {
    db: Database,
    storage: Storage,
}

impl SqlStore {
    /// Create a store with a file-based SQLite database.
    pub async fn new(db_path: &Path, config: ObjectStoreConfig) -> Result<Self> {
        let db = Database::new(db_path).await?;
        let storage = Storage::new(config).await?;
        info!(db = %db_path.display(), "opened sql store");
        Ok(Self { db, storage })
    }

    /// Create a store with an in-memory SQLite database.
    pub async fn in_memory(config: ObjectStoreConfig) -> Result<Self> {
        let db = Database::in_memory().await?;
        let storage = Storage::new(config).await?;
        Ok(Self { db, storage })
    }

    /// Create a store whose database and objects both live under `data_dir`.
    pub async fn new_local(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join(DATABASE_FILE);
        let config = ObjectStoreConfig::Local {
            path: data_dir.join(OBJECTS_DIR),
        };
        Self::new(&db_path, config).await
    }

    /// Create a fully ephemeral store (in-memory DB + in-memory object storage).
    pub async fn new_ephemeral() -> Result<Self> {
        Self::in_memory(ObjectStoreConfig::Memory).await
    }
}

#[async_trait]
impl TreeStore for SqlStore {
    async fn folder(&self, path: &str) -> std::result::Result<Option<FolderRecord>, StoreError> {
        Ok(self.db.get_folder(path).await?)
    }

    async fn child_folders(&self, path: &str) -> std::result::Result<Vec<String>, StoreError> {
        Ok(self.db.child_folders(path).await?)
    }

    async fn insert_folder(
        &self,
        path: &str,
        rights: Option<&Rights>,
    ) -> std::result::Result<(), StoreError> {
        Ok(self.db.insert_folder(path, rights).await?)
    }

    async fn delete_folder(&self, path: &str) -> std::result::Result<(), StoreError> {
        Ok(self.db.delete_folder(path).await?)
    }

    async fn file(&self, dir: &str, name: &str) -> std::result::Result<Option<File>, StoreError> {
        Ok(self.db.get_file(dir, name).await?)
    }

    async fn push_files(&self, dir: &str, files: &[File]) -> std::result::Result<(), StoreError> {
        debug!(dir = %dir, count = files.len(), "inserting files");
        Ok(self.db.insert_files(dir, files).await?)
    }

    async fn delete_file(&self, dir: &str, name: &str) -> std::result::Result<(), StoreError> {
        Ok(self.db.delete_file(dir, name).await?)
    }

    async fn set_folder_rights(
        &self,
        path: &str,
        rights: Option<&Rights>,
    ) -> std::result::Result<(), StoreError> {
        Ok(self.db.set_folder_rights(path, rights).await?)
    }

    async fn set_file_rights(
        &self,
        dir: &str,
        name: &str,
        rights: Option<&Rights>,
    ) -> std::result::Result<(), StoreError> {
        Ok(self.db.set_file_rights(dir, name, rights).await?)
    }
}

#[async_trait]
impl AccountStore for SqlStore {
    async fn user(&self, email: &str) -> std::result::Result<Option<User>, StoreError> {
        Ok(self.db.get_user(email).await?)
    }

    async fn user_by_session(&self, hash: &str) -> std::result::Result<Option<User>, StoreError> {
        Ok(self.db.get_user_by_session(hash).await?)
    }

    async fn insert_user(&self, user: &User) -> std::result::Result<(), StoreError> {
        Ok(self.db.insert_user(user).await?)
    }

    async fn delete_user(&self, email: &str) -> std::result::Result<(), StoreError> {
        Ok(self.db.delete_user(email).await?)
    }

    async fn set_session(
        &self,
        email: &str,
        session: Option<&Session>,
    ) -> std::result::Result<(), StoreError> {
        Ok(self.db.set_session(email, session).await?)
    }

    async fn add_user_to_group(
        &self,
        email: &str,
        group: &str,
    ) -> std::result::Result<(), StoreError> {
        Ok(self.db.add_membership(email, group).await?)
    }

    async fn remove_user_from_group(
        &self,
        email: &str,
        group: &str,
    ) -> std::result::Result<(), StoreError> {
        Ok(self.db.remove_membership(email, group).await?)
    }

    async fn users_in_group(&self, group: &str) -> std::result::Result<Vec<String>, StoreError> {
        Ok(self.db.group_members(group).await?)
    }

    async fn group(&self, id: &str) -> std::result::Result<Option<Group>, StoreError> {
        Ok(self.db.get_group(id).await?)
    }

    async fn insert_group(&self, group: &Group) -> std::result::Result<(), StoreError> {
        Ok(self.db.insert_group(group).await?)
    }

    async fn delete_group(&self, id: &str) -> std::result::Result<(), StoreError> {
        Ok(self.db.delete_group(id).await?)
    }

    async fn add_group_admin(&self, id: &str, email: &str) -> std::result::Result<(), StoreError> {
        Ok(self.db.add_group_admin(id, email).await?)
    }

    async fn has_admin(&self) -> std::result::Result<bool, StoreError> {
        Ok(self.db.has_admin().await?)
    }
}

#[async_trait]
impl BlobStore for SqlStore {
    async fn create(&self, name: &str, data: Bytes) -> std::result::Result<BlobId, StoreError> {
        let id = BlobId::generate();
        let size = data.len();
        debug!(blob = %id, name = %name, size = size, "storing blob");

        self.storage.put(id, data).await?;
        if let Err(e) = self.db.insert_blob(id, name, size as i64).await {
            // Don't leave an object nothing points at
            if let Err(cleanup) = self.storage.delete(id).await {
                warn!(blob = %id, error = %cleanup, "failed to remove orphaned blob object");
            }
            return Err(e.into());
        }

        Ok(id)
    }

    async fn read(&self, id: BlobId) -> std::result::Result<Option<Bytes>, StoreError> {
        if !self.db.has_blob(id).await? {
            return Ok(None);
        }
        Ok(self.storage.get(id).await?)
    }

    async fn delete(&self, id: BlobId) -> std::result::Result<(), StoreError> {
        self.storage.delete(id).await?;
        if self.db.delete_blob(id).await? {
            info!(blob = %id, "blob deleted");
        }
        Ok(())
    }

    async fn link(&self, id: BlobId) -> std::result::Result<(), StoreError> {
        match self.db.link_blob(id).await? {
            Some(_) => Ok(()),
            None => Err(SqlStoreError::BlobNotFound(id).into()),
        }
    }

    async fn unlink(&self, id: BlobId) -> std::result::Result<u64, StoreError> {
        match self.db.unlink_blob(id).await? {
            Some(links) => Ok(links.max(0) as u64),
            None => Err(SqlStoreError::BlobNotFound(id).into()),
        }
    }
}
