mod memory;
mod provider;

pub use memory::{MemoryStore, MemoryStoreStats};
pub use provider::{
    AccountStore, BlobId, BlobStore, DynAccountStore, DynBlobStore, DynTreeStore, FolderRecord,
    StoreError, TreeStore,
};
