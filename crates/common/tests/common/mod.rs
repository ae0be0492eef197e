//! Shared test utilities for tree, account and session integration tests
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use common::prelude::*;
use common::store::DynAccountStore;

pub const ADMIN_EMAIL: &str = "admin@strata.test";
pub const ADMIN_PASSWORD: &str = "admin";

pub struct TestEnv {
    pub store: MemoryStore,
    pub tree: ResourceTree,
    pub accounts: Accounts,
    pub sessions: SessionDirectory,
    pub admin: User,
}

/// Cheap Argon2 parameters so tests stay fast
pub fn hasher() -> Arc<dyn PasswordHasher> {
    Arc::new(Argon2Hasher::with_cost(8, 1).unwrap())
}

/// Set up a fresh in-memory environment with a root folder and an admin
pub async fn setup_test_env() -> TestEnv {
    setup_test_env_with(SessionConfig::default()).await
}

pub async fn setup_test_env_with(session: SessionConfig) -> TestEnv {
    let store = MemoryStore::new();
    let tree_store: DynTreeStore = Arc::new(store.clone());
    let blob_store: DynBlobStore = Arc::new(store.clone());
    let account_store: DynAccountStore = Arc::new(store.clone());

    let tree = ResourceTree::new(tree_store, blob_store, TreeConfig::default());
    tree.ensure_root().await.unwrap();

    let accounts = Accounts::new(account_store, hasher(), CacheConfig::default());
    assert!(accounts
        .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .unwrap());
    let admin = accounts.fetch_user(ADMIN_EMAIL).await.unwrap().unwrap();

    let sessions = SessionDirectory::new(accounts.clone(), session);

    TestEnv {
        store,
        tree,
        accounts,
        sessions,
        admin,
    }
}

/// A plain, non-admin actor that is not stored anywhere
pub fn user(email: &str, groups: &[&str]) -> User {
    let mut user = User::new(email, "");
    user.groups = groups.iter().map(|g| g.to_string()).collect();
    user
}

pub fn bytes(content: &str) -> Bytes {
    Bytes::from(content.to_string())
}

impl TestEnv {
    pub async fn mkdir(&self, path: &str) -> Folder {
        self.tree.new_folder(path, &self.admin).await.unwrap()
    }

    pub async fn upload(&self, dir: &str, name: &str, content: &str) -> File {
        self.tree
            .upload(dir, name, bytes(content), &self.admin)
            .await
            .unwrap()
    }

    pub async fn names(&self, dir: &str) -> Vec<String> {
        let folder = self.tree.fetch_folder(dir).await.unwrap().unwrap();
        folder.files.into_iter().map(|f| f.name).collect()
    }

    pub async fn child_paths(&self, dir: &str) -> Vec<String> {
        let folder = self.tree.fetch_folder(dir).await.unwrap().unwrap();
        folder.folders.into_iter().map(|f| f.path).collect()
    }
}
