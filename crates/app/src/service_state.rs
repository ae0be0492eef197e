use std::sync::Arc;

use common::prelude::{
    Accounts, Argon2Hasher, DynBlobStore, DynTreeStore, MemoryStore, PasswordHasher, ResourceTree,
    SessionDirectory,
};
use common::store::DynAccountStore;
use strata_object_store::{SqlStore, SqlStoreError};

use crate::config::Config;

/// The three stores a service runs on
#[derive(Debug, Clone)]
pub struct Stores {
    pub tree: DynTreeStore,
    pub accounts: DynAccountStore,
    pub blobs: DynBlobStore,
}

impl Stores {
    pub fn memory() -> Self {
        let store = MemoryStore::new();
        Self {
            tree: Arc::new(store.clone()),
            accounts: Arc::new(store.clone()),
            blobs: Arc::new(store),
        }
    }

    /// SQLite metadata plus the configured object storage
    pub async fn sql(config: &Config) -> Result<Self, StateSetupError> {
        let store = match &config.sqlite_path {
            Some(path) => SqlStore::new(path, config.blob_store.clone()).await?,
            None => SqlStore::in_memory(config.blob_store.clone()).await?,
        };
        Ok(Self {
            tree: Arc::new(store.clone()),
            accounts: Arc::new(store.clone()),
            blobs: Arc::new(store),
        })
    }
}

/// Main service state - the tree, the account records and the sessions
#[derive(Debug, Clone)]
pub struct State {
    tree: ResourceTree,
    accounts: Accounts,
    sessions: SessionDirectory,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        let stores = if config.ephemeral {
            tracing::info!("using ephemeral in-memory store");
            Stores::memory()
        } else {
            tracing::info!(sqlite_path = ?config.sqlite_path, blob_store = ?config.blob_store, "using sql store");
            Stores::sql(config).await?
        };
        Self::new(stores, Arc::new(Argon2Hasher::default()), config).await
    }

    /// Wire the caches over `stores`, create the root folder and the
    ///  bootstrap administrator if they are missing.
    pub async fn new(
        stores: Stores,
        hasher: Arc<dyn PasswordHasher>,
        config: &Config,
    ) -> Result<Self, StateSetupError> {
        let tree = ResourceTree::new(stores.tree, stores.blobs, config.tree_config());
        tree.ensure_root().await?;

        let accounts = Accounts::new(stores.accounts, hasher, config.cache_config());
        if accounts
            .ensure_admin(&config.admin_email, &config.admin_password)
            .await?
        {
            tracing::warn!(email = %config.admin_email, "created bootstrap administrator");
        }

        let sessions = SessionDirectory::new(accounts.clone(), config.session_config());

        Ok(Self {
            tree,
            accounts,
            sessions,
        })
    }

    pub fn tree(&self) -> &ResourceTree {
        &self.tree
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn sessions(&self) -> &SessionDirectory {
        &self.sessions
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("store setup failed: {0}")]
    Store(#[from] SqlStoreError),
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] common::Error),
}
