//! Cache fills racing mutations, and the content cache budget

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ::common::prelude::{
    Error, File, MemoryStore, Permission, ResourceTree, Rights, RightsEntity, StoreError,
    TreeConfig, TreeStore, User,
};
use ::common::store::FolderRecord;
use async_trait::async_trait;
use tokio::sync::Notify;

/// Tree store whose next read of `held` returns its row, then parks until
///  released, so a mutation can run in between.
#[derive(Debug, Clone)]
struct HeldReadStore {
    inner: MemoryStore,
    held: &'static str,
    armed: Arc<AtomicBool>,
    reading: Arc<Notify>,
    release: Arc<Notify>,
}

impl HeldReadStore {
    fn new(inner: MemoryStore, held: &'static str) -> Self {
        Self {
            inner,
            held,
            armed: Arc::new(AtomicBool::new(false)),
            reading: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl TreeStore for HeldReadStore {
    async fn folder(&self, path: &str) -> Result<Option<FolderRecord>, StoreError> {
        let record = self.inner.folder(path).await?;
        if path == self.held && self.armed.swap(false, Ordering::SeqCst) {
            self.reading.notify_one();
            self.release.notified().await;
        }
        Ok(record)
    }

    async fn child_folders(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.inner.child_folders(path).await
    }

    async fn insert_folder(&self, path: &str, rights: Option<&Rights>) -> Result<(), StoreError> {
        self.inner.insert_folder(path, rights).await
    }

    async fn delete_folder(&self, path: &str) -> Result<(), StoreError> {
        self.inner.delete_folder(path).await
    }

    async fn file(&self, dir: &str, name: &str) -> Result<Option<File>, StoreError> {
        self.inner.file(dir, name).await
    }

    async fn push_files(&self, dir: &str, files: &[File]) -> Result<(), StoreError> {
        self.inner.push_files(dir, files).await
    }

    async fn delete_file(&self, dir: &str, name: &str) -> Result<(), StoreError> {
        self.inner.delete_file(dir, name).await
    }

    async fn set_folder_rights(
        &self,
        path: &str,
        rights: Option<&Rights>,
    ) -> Result<(), StoreError> {
        self.inner.set_folder_rights(path, rights).await
    }

    async fn set_file_rights(
        &self,
        dir: &str,
        name: &str,
        rights: Option<&Rights>,
    ) -> Result<(), StoreError> {
        self.inner.set_file_rights(dir, name, rights).await
    }
}

#[tokio::test]
async fn test_fill_started_before_set_rights_is_dropped() {
    let store = MemoryStore::new();
    let held = HeldReadStore::new(store.clone(), "/docs");
    let tree = ResourceTree::new(
        Arc::new(held.clone()),
        Arc::new(store.clone()),
        TreeConfig::default(),
    );
    tree.ensure_root().await.unwrap();
    let admin = {
        let mut user = User::new(common::ADMIN_EMAIL, "");
        user.admin = true;
        user
    };
    tree.new_folder("/docs", &admin).await.unwrap();
    assert!(!tree.is_folder_cached("/docs"));

    // A reader loads the open /docs row and stalls before caching it
    held.armed.store(true, Ordering::SeqCst);
    let reader = {
        let tree = tree.clone();
        tokio::spawn(async move { tree.fetch_folder("/docs").await })
    };
    held.reading.notified().await;

    tree.set_rights("/docs", &RightsEntity::All, Permission::None, &admin)
        .await
        .unwrap();

    held.release.notify_one();
    let stale = reader.await.unwrap().unwrap().unwrap();
    assert_eq!(stale.rights, None);

    // The late fill must not have outlived the invalidation
    let guest = common::user("guest@strata.test", &[]);
    let denied = tree.open_folder("/docs", &guest).await;
    assert!(matches!(denied, Err(Error::AccessDenied(_))));
    let cached = tree.fetch_folder("/docs").await.unwrap().unwrap();
    assert_eq!(cached.rights.unwrap().all, Permission::None);
}

#[tokio::test]
async fn test_content_cache_stays_within_budget() {
    let store = MemoryStore::new();
    let tree = ResourceTree::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        TreeConfig {
            content_cache_budget_bytes: 10,
            ..TreeConfig::default()
        },
    );
    tree.ensure_root().await.unwrap();
    let mut admin = User::new(common::ADMIN_EMAIL, "");
    admin.admin = true;
    for name in ["a.txt", "b.txt", "c.txt"] {
        tree.upload("/", name, common::bytes("four"), &admin)
            .await
            .unwrap();
    }

    let read = |name: &'static str| {
        let tree = tree.clone();
        async move { tree.file_content(name).await.unwrap().unwrap() }
    };

    read("/a.txt").await;
    read("/b.txt").await;
    let reads = store.stats().blob_reads;

    // Both fit: served from the cache
    read("/a.txt").await;
    read("/b.txt").await;
    read("/a.txt").await;
    assert_eq!(store.stats().blob_reads, reads);

    // A third pushes past 10 bytes and evicts the least recently read
    assert_eq!(&read("/c.txt").await[..], b"four");
    assert_eq!(store.stats().blob_reads, reads + 1);
    read("/a.txt").await;
    read("/c.txt").await;
    assert_eq!(store.stats().blob_reads, reads + 1);

    read("/b.txt").await;
    assert_eq!(store.stats().blob_reads, reads + 2);
}
