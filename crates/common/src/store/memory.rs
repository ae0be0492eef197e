use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use super::provider::{AccountStore, BlobId, BlobStore, FolderRecord, StoreError, TreeStore};
use crate::accounts::{Group, Session, User};
use crate::path;
use crate::rights::Rights;
use crate::tree::File;

/// In-memory implementation of every store trait.
///
/// Backs the test suites and the ephemeral server mode. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Folder rows keyed by canonical path
    folders: BTreeMap<String, FolderRow>,
    users: HashMap<String, User>,
    groups: HashMap<String, Group>,
    blobs: HashMap<BlobId, BlobRow>,
    /// Call counters used to observe cache behavior
    folder_reads: usize,
    blob_reads: usize,
    session_writes: usize,
}

#[derive(Debug, Default)]
struct FolderRow {
    rights: Option<Rights>,
    files: Vec<File>,
}

#[derive(Debug)]
struct BlobRow {
    data: Bytes,
    links: u64,
}

/// Counters exposed for tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub folder_reads: usize,
    pub blob_reads: usize,
    pub session_writes: usize,
    pub blobs: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> MemoryStoreStats {
        let inner = self.inner.read();
        MemoryStoreStats {
            folder_reads: inner.folder_reads,
            blob_reads: inner.blob_reads,
            session_writes: inner.session_writes,
            blobs: inner.blobs.len(),
        }
    }

    /// Current link count of a blob, `None` once it is gone
    pub fn links(&self, id: BlobId) -> Option<u64> {
        self.inner.read().blobs.get(&id).map(|b| b.links)
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn folder(&self, path: &str) -> Result<Option<FolderRecord>, StoreError> {
        let mut inner = self.inner.write();
        inner.folder_reads += 1;
        Ok(inner.folders.get(path).map(|row| FolderRecord {
            path: path.to_string(),
            files: row.files.clone(),
            rights: row.rights.clone(),
        }))
    }

    async fn child_folders(&self, path: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .folders
            .keys()
            .filter(|candidate| candidate.as_str() != path && path::parent_dir(candidate) == path)
            .cloned()
            .collect())
    }

    async fn insert_folder(&self, path: &str, rights: Option<&Rights>) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.folders.contains_key(path) {
            return Err(StoreError::Conflict(format!("folder {}", path)));
        }
        inner.folders.insert(
            path.to_string(),
            FolderRow {
                rights: rights.cloned(),
                files: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_folder(&self, path: &str) -> Result<(), StoreError> {
        self.inner.write().folders.remove(path);
        Ok(())
    }

    async fn file(&self, dir: &str, name: &str) -> Result<Option<File>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .folders
            .get(dir)
            .and_then(|row| row.files.iter().find(|f| f.name == name))
            .cloned())
    }

    async fn push_files(&self, dir: &str, files: &[File]) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let row = inner
            .folders
            .get_mut(dir)
            .ok_or_else(|| StoreError::Conflict(format!("folder {} does not exist", dir)))?;

        for (i, file) in files.iter().enumerate() {
            let taken = row.files.iter().any(|f| f.name == file.name)
                || files[..i].iter().any(|f| f.name == file.name);
            if taken {
                return Err(StoreError::Conflict(path::join(dir, &file.name)));
            }
        }
        row.files.extend(files.iter().cloned());
        Ok(())
    }

    async fn delete_file(&self, dir: &str, name: &str) -> Result<(), StoreError> {
        if let Some(row) = self.inner.write().folders.get_mut(dir) {
            row.files.retain(|f| f.name != name);
        }
        Ok(())
    }

    async fn set_folder_rights(
        &self,
        path: &str,
        rights: Option<&Rights>,
    ) -> Result<(), StoreError> {
        if let Some(row) = self.inner.write().folders.get_mut(path) {
            row.rights = rights.cloned();
        }
        Ok(())
    }

    async fn set_file_rights(
        &self,
        dir: &str,
        name: &str,
        rights: Option<&Rights>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let file = inner
            .folders
            .get_mut(dir)
            .and_then(|row| row.files.iter_mut().find(|f| f.name == name));
        if let Some(file) = file {
            file.rights = rights.cloned();
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn user(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().users.get(email).cloned())
    }

    async fn user_by_session(&self, hash: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .users
            .values()
            .find(|u| u.session.as_ref().is_some_and(|s| s.hash == hash))
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.users.contains_key(&user.email) {
            return Err(StoreError::Conflict(format!("user {}", user.email)));
        }
        inner.users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(&self, email: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.users.remove(email);
        for group in inner.groups.values_mut() {
            group.admins.retain(|a| a != email);
        }
        Ok(())
    }

    async fn set_session(
        &self,
        email: &str,
        session: Option<&Session>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.session_writes += 1;
        if let Some(user) = inner.users.get_mut(email) {
            user.session = session.cloned();
        }
        Ok(())
    }

    async fn add_user_to_group(&self, email: &str, group: &str) -> Result<(), StoreError> {
        if let Some(user) = self.inner.write().users.get_mut(email) {
            if !user.groups.iter().any(|g| g == group) {
                user.groups.push(group.to_string());
            }
        }
        Ok(())
    }

    async fn remove_user_from_group(&self, email: &str, group: &str) -> Result<(), StoreError> {
        if let Some(user) = self.inner.write().users.get_mut(email) {
            user.groups.retain(|g| g != group);
        }
        Ok(())
    }

    async fn users_in_group(&self, group: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read();
        let mut emails: Vec<String> = inner
            .users
            .values()
            .filter(|u| u.groups.iter().any(|g| g == group))
            .map(|u| u.email.clone())
            .collect();
        emails.sort();
        Ok(emails)
    }

    async fn group(&self, id: &str) -> Result<Option<Group>, StoreError> {
        Ok(self.inner.read().groups.get(id).cloned())
    }

    async fn insert_group(&self, group: &Group) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner.groups.contains_key(&group.id) {
            return Err(StoreError::Conflict(format!("group {}", group.id)));
        }
        inner.groups.insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn delete_group(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.groups.remove(id);
        for user in inner.users.values_mut() {
            user.groups.retain(|g| g != id);
        }
        Ok(())
    }

    async fn add_group_admin(&self, id: &str, email: &str) -> Result<(), StoreError> {
        if let Some(group) = self.inner.write().groups.get_mut(id) {
            if !group.admins.iter().any(|a| a == email) {
                group.admins.push(email.to_string());
            }
        }
        Ok(())
    }

    async fn has_admin(&self) -> Result<bool, StoreError> {
        Ok(self.inner.read().users.values().any(|u| u.admin))
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn create(&self, _name: &str, data: Bytes) -> Result<BlobId, StoreError> {
        let id = BlobId::generate();
        self.inner
            .write()
            .blobs
            .insert(id, BlobRow { data, links: 1 });
        Ok(id)
    }

    async fn read(&self, id: BlobId) -> Result<Option<Bytes>, StoreError> {
        let mut inner = self.inner.write();
        inner.blob_reads += 1;
        Ok(inner.blobs.get(&id).map(|b| b.data.clone()))
    }

    async fn delete(&self, id: BlobId) -> Result<(), StoreError> {
        self.inner.write().blobs.remove(&id);
        Ok(())
    }

    async fn link(&self, id: BlobId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let blob = inner.blobs.get_mut(&id).ok_or(StoreError::BlobNotFound(id))?;
        blob.links += 1;
        Ok(())
    }

    async fn unlink(&self, id: BlobId) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let blob = inner.blobs.get_mut(&id).ok_or(StoreError::BlobNotFound(id))?;
        blob.links = blob.links.saturating_sub(1);
        Ok(blob.links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> File {
        File {
            name: name.to_string(),
            blob_id: BlobId::generate(),
            rights: None,
        }
    }

    #[tokio::test]
    async fn test_child_folders_one_level() {
        let store = MemoryStore::new();
        for path in ["/", "/a", "/a/b", "/a/b/c", "/c", "/ab"] {
            store.insert_folder(path, None).await.unwrap();
        }

        let mut root = store.child_folders("/").await.unwrap();
        root.sort();
        assert_eq!(root, vec!["/a", "/ab", "/c"]);
        assert_eq!(store.child_folders("/a").await.unwrap(), vec!["/a/b"]);
        assert!(store.child_folders("/c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_files_is_atomic() {
        let store = MemoryStore::new();
        store.insert_folder("/docs", None).await.unwrap();
        store.push_files("/docs", &[file("a.txt")]).await.unwrap();

        let result = store
            .push_files("/docs", &[file("b.txt"), file("a.txt")])
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        let record = store.folder("/docs").await.unwrap().unwrap();
        assert_eq!(record.files.len(), 1);

        let missing = store.push_files("/nope", &[file("x")]).await;
        assert!(matches!(missing, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_blob_link_counts() {
        let store = MemoryStore::new();
        let id = store.create("a.txt", Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(store.links(id), Some(1));

        store.link(id).await.unwrap();
        assert_eq!(store.unlink(id).await.unwrap(), 1);
        assert_eq!(store.unlink(id).await.unwrap(), 0);

        store.delete(id).await.unwrap();
        assert!(store.read(id).await.unwrap().is_none());
        assert!(matches!(
            store.link(id).await,
            Err(StoreError::BlobNotFound(_))
        ));
    }
}
