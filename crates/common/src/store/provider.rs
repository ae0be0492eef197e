use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{Group, Session, User};
use crate::rights::Rights;
use crate::tree::File;

/// Errors a store backend may report.
///
/// Expected absences are `Ok(None)`, never an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated, e.g. a folder path or a
    ///  file name within its folder is already taken
    #[error("conflict: {0}")]
    Conflict(String),
    /// The blob referenced by a link-count operation does not exist
    #[error("blob not found: {0}")]
    BlobNotFound(BlobId),
    /// Anything the backend itself failed at
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Identifier of a content blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(Uuid);

impl BlobId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for BlobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A folder row as the store holds it. Child folders are not part of the
///  record, they are derived with [`TreeStore::child_folders`].
#[derive(Debug, Clone, PartialEq)]
pub struct FolderRecord {
    pub path: String,
    pub files: Vec<File>,
    pub rights: Option<Rights>,
}

/// Persistent, path-keyed folder and file records.
///
/// Every path handed to a store is already canonical. Matches on `path`
///  and file `name` are exact and case-sensitive.
#[async_trait]
pub trait TreeStore: Send + Sync + fmt::Debug {
    /// Get a folder record by exact path
    ///
    /// # Returns
    /// * `Ok(Some(record))` - The folder and the files it holds
    /// * `Ok(None)` - No folder lives at `path`
    async fn folder(&self, path: &str) -> Result<Option<FolderRecord>, StoreError>;

    /// Paths of the direct child folders of `path`, one level deep
    async fn child_folders(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Insert an empty folder record
    ///
    /// Should fail with `Err(StoreError::Conflict)` if the path is taken.
    async fn insert_folder(&self, path: &str, rights: Option<&Rights>) -> Result<(), StoreError>;

    /// Delete the folder record at `path` together with any file rows it
    ///  still holds. Deleting a missing folder is not an error.
    async fn delete_folder(&self, path: &str) -> Result<(), StoreError>;

    /// Get a single file of the folder at `dir`
    async fn file(&self, dir: &str, name: &str) -> Result<Option<File>, StoreError>;

    /// Insert a batch of files into one folder as a single atomic operation
    ///
    /// Should fail with `Err(StoreError::Conflict)`, inserting nothing, when
    ///  the folder is missing or any name is already taken.
    async fn push_files(&self, dir: &str, files: &[File]) -> Result<(), StoreError>;

    /// Delete a file row. Deleting a missing file is not an error.
    async fn delete_file(&self, dir: &str, name: &str) -> Result<(), StoreError>;

    /// Replace the policy of a folder
    async fn set_folder_rights(&self, path: &str, rights: Option<&Rights>)
        -> Result<(), StoreError>;

    /// Replace the policy of a file
    async fn set_file_rights(
        &self,
        dir: &str,
        name: &str,
        rights: Option<&Rights>,
    ) -> Result<(), StoreError>;
}

/// Persistent user and group records
#[async_trait]
pub trait AccountStore: Send + Sync + fmt::Debug {
    async fn user(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Find the user whose current session carries `hash`
    async fn user_by_session(&self, hash: &str) -> Result<Option<User>, StoreError>;

    /// Should fail with `Err(StoreError::Conflict)` if the email is taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Delete a user along with its memberships and admin grants
    async fn delete_user(&self, email: &str) -> Result<(), StoreError>;

    /// Store or clear the user's current session
    async fn set_session(&self, email: &str, session: Option<&Session>)
        -> Result<(), StoreError>;

    async fn add_user_to_group(&self, email: &str, group: &str) -> Result<(), StoreError>;

    async fn remove_user_from_group(&self, email: &str, group: &str) -> Result<(), StoreError>;

    /// Emails of every member of `group`
    async fn users_in_group(&self, group: &str) -> Result<Vec<String>, StoreError>;

    async fn group(&self, id: &str) -> Result<Option<Group>, StoreError>;

    /// Should fail with `Err(StoreError::Conflict)` if the id is taken.
    async fn insert_group(&self, group: &Group) -> Result<(), StoreError>;

    async fn delete_group(&self, id: &str) -> Result<(), StoreError>;

    async fn add_group_admin(&self, id: &str, email: &str) -> Result<(), StoreError>;

    /// Whether any super-administrator exists
    async fn has_admin(&self) -> Result<bool, StoreError>;
}

/// Link-counted content blobs
#[async_trait]
pub trait BlobStore: Send + Sync + fmt::Debug {
    /// Write a new blob with a link count of one
    async fn create(&self, name: &str, data: Bytes) -> Result<BlobId, StoreError>;

    /// Read a whole blob
    ///
    /// # Returns
    /// * `Ok(None)` - The blob does not exist
    async fn read(&self, id: BlobId) -> Result<Option<Bytes>, StoreError>;

    /// Delete a blob regardless of its link count. Missing blobs are ignored.
    async fn delete(&self, id: BlobId) -> Result<(), StoreError>;

    /// Increment the link count
    ///
    /// Should fail with `Err(StoreError::BlobNotFound)` if the blob is missing.
    async fn link(&self, id: BlobId) -> Result<(), StoreError>;

    /// Decrement the link count and return what remains. The caller deletes
    ///  the blob once this reaches zero.
    async fn unlink(&self, id: BlobId) -> Result<u64, StoreError>;
}

pub type DynTreeStore = Arc<dyn TreeStore>;
pub type DynAccountStore = Arc<dyn AccountStore>;
pub type DynBlobStore = Arc<dyn BlobStore>;
