/**
 * User and group records, plus the CRUD
 *  operations that keep their caches honest.
 */
pub mod accounts;
/**
 * Generic concurrent cache with point and
 *  prefix invalidation.
 */
pub mod cache;
/**
 * Session secrets and the password-hash
 *  capability.
 */
pub mod crypto;
pub mod error;
/**
 * Pure path canonicalization helpers.
 *  No I/O happens in here.
 */
pub mod path;
/**
 * Permission levels, per-resource policies
 *  and the resolution algorithm.
 */
pub mod rights;
/**
 * Session-token issuance, cache-backed
 *  lookup and sliding expiration.
 */
pub mod session;
/**
 * Contracts for the persistent tree store,
 *  the account store and the blob store, plus
 *  an in-memory implementation of all three.
 */
pub mod store;
/**
 * The path-addressed folder/file tree and
 *  its cache-invalidation obligations.
 */
pub mod tree;

pub use error::{Error, ErrorKind, Result};

pub mod prelude {
    pub use crate::accounts::{Accounts, Group, Session, User};
    pub use crate::cache::{CacheConfig, InvalidatingCache};
    pub use crate::crypto::{Argon2Hasher, PasswordHasher, SessionSecret};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::rights::{Permission, Rights, RightsEntity};
    pub use crate::session::{SessionConfig, SessionDirectory};
    pub use crate::store::{
        AccountStore, BlobId, BlobStore, DynAccountStore, DynBlobStore, DynTreeStore,
        MemoryStore, StoreError, TreeStore,
    };
    pub use crate::tree::{ChildFolder, File, FilesBulk, Folder, ResourceTree, TreeConfig};
}
