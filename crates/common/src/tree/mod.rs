//! Path-addressed folder and file tree
//!
//! Folders live in the store as a flat collection keyed by canonical path.
//! A folder's children are derived on read with a one-level query and the
//! result is cached under the folder's path. Files are cached under their
//! full path, and so is their content when it fits under the content ceiling.
//!
//! Every mutation writes the store first and then invalidates the entries it
//! made stale before returning. Recursive operations stop at the first
//! failure and do not roll back what they already applied.

mod bulk;
mod node;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::accounts::User;
use crate::cache::{CacheConfig, InvalidatingCache};
use crate::error::{Error, Result};
use crate::path;
use crate::rights::{self, Permission, Rights, RightsEntity};
use crate::store::{BlobId, DynBlobStore, DynTreeStore, StoreError};

pub use bulk::FilesBulk;
pub use node::{ChildFolder, File, Folder};

/// Boxed future of a recursive subtree walk
type SubtreeWalk<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Largest blob whose content is kept in the cache
pub const DEFAULT_CONTENT_CACHE_MAX_BYTES: usize = 64 * 1024 * 1024;
/// Total size of all cached content
pub const DEFAULT_CONTENT_CACHE_BUDGET_BYTES: usize = 256 * 1024 * 1024;

/// Marker inserted before the extension to resolve name collisions
pub const COPY_MARKER: &str = "-copy";

#[derive(Debug, Clone, Copy)]
pub struct TreeConfig {
    pub cache: CacheConfig,
    pub content_cache_max_bytes: usize,
    pub content_cache_budget_bytes: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            content_cache_max_bytes: DEFAULT_CONTENT_CACHE_MAX_BYTES,
            content_cache_budget_bytes: DEFAULT_CONTENT_CACHE_BUDGET_BYTES,
        }
    }
}

/// Fail with `AccessDenied` unless `actor` holds at least `level` on a
///  resource governed by `policy`.
pub fn require(
    actor: &User,
    policy: Option<&Rights>,
    level: Permission,
    resource: &str,
) -> Result<()> {
    if rights::resolve(actor, policy) >= level {
        Ok(())
    } else {
        Err(Error::AccessDenied(resource.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct ResourceTree {
    store: DynTreeStore,
    blobs: DynBlobStore,
    folders: InvalidatingCache<Folder>,
    files: InvalidatingCache<File>,
    contents: InvalidatingCache<Bytes>,
    content_cache_max_bytes: usize,
}

impl ResourceTree {
    pub fn new(store: DynTreeStore, blobs: DynBlobStore, config: TreeConfig) -> Self {
        Self {
            store,
            blobs,
            folders: InvalidatingCache::new(config.cache),
            files: InvalidatingCache::new(config.cache),
            contents: InvalidatingCache::new(
                config.cache.with_max_weight(config.content_cache_budget_bytes),
            ),
            content_cache_max_bytes: config.content_cache_max_bytes,
        }
    }

    pub fn blobs(&self) -> &DynBlobStore {
        &self.blobs
    }

    /// Whether a folder view is currently cached
    pub fn is_folder_cached(&self, path: &str) -> bool {
        self.folders.get(&path::format_dir(path)).is_some()
    }

    /// Whether a file record is currently cached
    pub fn is_file_cached(&self, path: &str) -> bool {
        self.files.get(&path::format_dir(path)).is_some()
    }

    /// Create the root folder if the store does not have one yet
    pub async fn ensure_root(&self) -> Result<()> {
        if self.store.folder(path::ROOT).await?.is_some() {
            return Ok(());
        }
        match self.store.insert_folder(path::ROOT, None).await {
            Ok(()) | Err(StoreError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
        self.folders.invalidate([path::ROOT]);
        info!("created root folder");
        Ok(())
    }

    /* Fetch */

    /// Get a folder, filling the cache on a miss. Absence is `Ok(None)`.
    pub async fn fetch_folder(&self, path: &str) -> Result<Option<Folder>> {
        let path = path::format_dir(path);
        if let Some(folder) = self.folders.get(&path) {
            return Ok(Some(folder));
        }

        let ticket = self.folders.ticket();
        let Some(record) = self.store.folder(&path).await? else {
            return Ok(None);
        };
        let mut children = self.store.child_folders(&path).await?;
        children.sort();

        let folder = Folder {
            path: record.path,
            files: record.files,
            folders: children
                .into_iter()
                .map(|path| ChildFolder { path })
                .collect(),
            rights: record.rights,
        };
        if self.folders.fill(ticket, path, folder.clone()) {
            debug!(path = %folder.path, "folder cache fill");
        }
        Ok(Some(folder))
    }

    /// Get a file by its full path, filling the cache on a miss
    pub async fn fetch_file(&self, path: &str) -> Result<Option<File>> {
        let (dir, name) = path::split_file(path);
        if name.is_empty() {
            return Ok(None);
        }
        let key = path::join(&dir, &name);
        if let Some(file) = self.files.get(&key) {
            return Ok(Some(file));
        }

        let ticket = self.files.ticket();
        let Some(file) = self.store.file(&dir, &name).await? else {
            return Ok(None);
        };
        if self.files.fill(ticket, key.clone(), file.clone()) {
            debug!(path = %key, "file cache fill");
        }
        Ok(Some(file))
    }

    /// Whole content of a file. Blobs above the content ceiling are read
    ///  through without being cached, and the least recently read content
    ///  is evicted once the cached total passes the budget.
    pub async fn file_content(&self, path: &str) -> Result<Option<Bytes>> {
        let (dir, name) = path::split_file(path);
        let key = path::join(&dir, &name);
        if let Some(content) = self.contents.get(&key) {
            return Ok(Some(content));
        }

        let ticket = self.contents.ticket();
        let Some(file) = self.fetch_file(&key).await? else {
            return Ok(None);
        };
        let Some(content) = self.blobs.read(file.blob_id).await? else {
            return Ok(None);
        };
        if content.len() <= self.content_cache_max_bytes {
            let weight = content.len();
            self.contents
                .fill_weighted(ticket, key, content.clone(), weight);
        }
        Ok(Some(content))
    }

    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        Ok(self.fetch_file(path).await?.is_some())
    }

    /// Fetch a folder the actor may read
    pub async fn open_folder(&self, path: &str, actor: &User) -> Result<Folder> {
        let folder = self
            .fetch_folder(path)
            .await?
            .ok_or_else(|| Error::NotFound(path::format_dir(path)))?;
        require(actor, folder.rights.as_ref(), Permission::Read, &folder.path)?;
        Ok(folder)
    }

    /// Fetch a file the actor may read, along with its content
    pub async fn read_file(&self, path: &str, actor: &User) -> Result<(File, Bytes)> {
        let path = path::format_dir(path);
        let file = self
            .fetch_file(&path)
            .await?
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        require(actor, file.rights.as_ref(), Permission::Read, &path)?;

        let content = self
            .file_content(&path)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content of {}", path)))?;
        Ok((file, content))
    }

    /* Folders */

    /// Create an empty folder under an existing parent the actor may write
    pub async fn new_folder(&self, path: &str, actor: &User) -> Result<Folder> {
        let path = path::format_dir(path);
        let (parent_path, name) = path::split_file(&path);
        if name.is_empty() {
            return Err(Error::AlreadyExists(path));
        }

        let parent = self
            .fetch_folder(&parent_path)
            .await?
            .ok_or_else(|| Error::BadPath(format!("parent folder {} does not exist", parent_path)))?;
        require(actor, parent.rights.as_ref(), Permission::Write, &parent.path)?;

        if parent.file(&name).is_some() || self.fetch_folder(&path).await?.is_some() {
            return Err(Error::AlreadyExists(path));
        }

        self.store
            .insert_folder(&path, None)
            .await
            .map_err(Error::from_insert)?;
        self.folders.invalidate([parent_path.as_str(), path.as_str()]);

        info!(%path, "folder created");
        Ok(Folder {
            path,
            files: Vec::new(),
            folders: Vec::new(),
            rights: None,
        })
    }

    /// Remove a folder with every file and folder beneath it
    pub async fn remove_folder(&self, path: &str, actor: &User) -> Result<()> {
        let path = path::format_dir(path);
        if path == path::ROOT {
            return Err(Error::BadPath("the root folder cannot be removed".to_string()));
        }
        let folder = self
            .fetch_folder(&path)
            .await?
            .ok_or_else(|| Error::NotFound(path.clone()))?;

        self.remove_folder_inner(folder, actor).await?;
        self.folders.invalidate([path::parent_dir(&path)]);

        info!(%path, "folder removed");
        Ok(())
    }

    fn remove_folder_inner<'a>(&'a self, folder: Folder, actor: &'a User) -> SubtreeWalk<'a> {
        Box::pin(async move {
            require(actor, folder.rights.as_ref(), Permission::Write, &folder.path)?;

            for file in &folder.files {
                let file_path = path::join(&folder.path, &file.name);
                require(actor, file.rights.as_ref(), Permission::Write, &file_path)?;
                self.unlink_file(&folder.path, file).await?;
            }

            for child in &folder.folders {
                // Already gone children make a retried removal idempotent
                if let Some(child) = self.fetch_folder(&child.path).await? {
                    self.remove_folder_inner(child, actor).await?;
                    self.folders.invalidate([folder.path.as_str()]);
                }
            }

            self.store.delete_folder(&folder.path).await?;
            self.folders.invalidate([folder.path.as_str()]);
            self.files.invalidate_prefix(&path::descendants_prefix(&folder.path));
            self.contents.invalidate_prefix(&path::descendants_prefix(&folder.path));
            debug!(path = %folder.path, "folder record deleted");
            Ok(())
        })
    }

    /// Copy a folder and everything beneath it to `dest_parent/dest_name`.
    ///
    /// An existing destination folder is merged into rather than replaced.
    pub async fn copy_folder(
        &self,
        path: &str,
        dest_parent: &str,
        dest_name: &str,
        actor: &User,
    ) -> Result<Folder> {
        let source = self
            .fetch_folder(path)
            .await?
            .ok_or_else(|| Error::NotFound(path::format_dir(path)))?;
        require(actor, source.rights.as_ref(), Permission::Read, &source.path)?;

        let parent = self
            .fetch_folder(dest_parent)
            .await?
            .ok_or_else(|| Error::BadPath(format!("destination {} does not exist", dest_parent)))?;
        require(actor, parent.rights.as_ref(), Permission::Write, &parent.path)?;

        let name = match dest_name.trim() {
            "" => path::leaf(&source.path),
            name => name.to_string(),
        };
        if name.is_empty() {
            return Err(Error::BadPath("the root folder cannot be copied".to_string()));
        }
        let dest = path::join(&parent.path, &name);
        if path::is_within(&dest, &source.path) {
            return Err(Error::BadPath(format!(
                "cannot copy {} into itself at {}",
                source.path, dest
            )));
        }

        let source_path = source.path.clone();
        self.copy_folder_inner(source, &dest, actor).await?;
        self.folders.invalidate([parent.path.as_str()]);

        info!(from = %source_path, to = %dest, "folder copied");
        self.fetch_folder(&dest)
            .await?
            .ok_or_else(|| Error::NotFound(dest))
    }

    fn copy_folder_inner<'a>(
        &'a self,
        source: Folder,
        dest: &'a str,
        actor: &'a User,
    ) -> SubtreeWalk<'a> {
        Box::pin(async move {
            match self.store.insert_folder(dest, source.rights.as_ref()).await {
                Ok(()) | Err(StoreError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
            self.folders.invalidate([dest]);

            let readable = source
                .files
                .iter()
                .map(|file| {
                    let file_path = path::join(&source.path, &file.name);
                    require(actor, file.rights.as_ref(), Permission::Read, &file_path)?;
                    Ok(file)
                })
                .collect::<Result<Vec<_>>>()?;
            self.link_files(dest, &readable).await?;

            for child in &source.folders {
                if let Some(child) = self.fetch_folder(&child.path).await? {
                    let child_dest = path::join(dest, &path::leaf(&child.path));
                    self.copy_folder_inner(child, &child_dest, actor).await?;
                    self.folders.invalidate([dest]);
                }
            }
            Ok(())
        })
    }

    /* Files */

    /// Remove a single file, deleting its blob once nothing links it
    pub async fn remove_file(&self, path: &str, actor: &User) -> Result<()> {
        let (dir, name) = path::split_file(path);
        let file_path = path::join(&dir, &name);
        let file = self
            .fetch_file(&file_path)
            .await?
            .ok_or_else(|| Error::NotFound(file_path.clone()))?;
        require(actor, file.rights.as_ref(), Permission::Write, &file_path)?;

        self.unlink_file(&dir, &file).await?;

        info!(path = %file_path, "file removed");
        Ok(())
    }

    /// Copy a file by linking its blob under a new name.
    ///
    /// A taken destination name gets the copy marker instead of being
    ///  overwritten. An empty `dest_name` keeps the source name.
    pub async fn copy_file(
        &self,
        path: &str,
        dest_dir: &str,
        dest_name: &str,
        actor: &User,
    ) -> Result<File> {
        let source_path = path::format_dir(path);
        let source = self
            .fetch_file(&source_path)
            .await?
            .ok_or_else(|| Error::NotFound(source_path.clone()))?;
        require(actor, source.rights.as_ref(), Permission::Read, &source_path)?;

        let dest = self
            .fetch_folder(dest_dir)
            .await?
            .ok_or_else(|| Error::BadPath(format!("destination {} does not exist", dest_dir)))?;
        require(actor, dest.rights.as_ref(), Permission::Write, &dest.path)?;

        let renamed = File {
            name: match dest_name.trim() {
                "" => source.name.clone(),
                name => name.to_string(),
            },
            ..source
        };
        let mut copied = self.link_files(&dest.path, &[&renamed]).await?;

        info!(from = %source_path, to = %dest.path, "file copied");
        copied
            .pop()
            .ok_or_else(|| Error::NotFound(source_path))
    }

    /// Link every file's blob into `dest`, resolving name collisions,
    ///  then push them as one batch. Links are released if the push fails.
    async fn link_files(&self, dest: &str, files: &[&File]) -> Result<Vec<File>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let target = self
            .fetch_folder(dest)
            .await?
            .ok_or_else(|| Error::BadPath(format!("destination {} does not exist", dest)))?;
        let mut taken: HashSet<String> = target.files.iter().map(|f| f.name.clone()).collect();

        let mut copies = Vec::with_capacity(files.len());
        for file in files {
            let name = free_name(&taken, &file.name);
            taken.insert(name.clone());
            copies.push(File {
                name,
                blob_id: file.blob_id,
                rights: file.rights.clone(),
            });
        }

        let mut linked = Vec::with_capacity(copies.len());
        for copy in &copies {
            if let Err(e) = self.blobs.link(copy.blob_id).await {
                self.release_links(&linked).await;
                return Err(e.into());
            }
            linked.push(copy.blob_id);
        }

        if let Err(e) = self.store.push_files(&target.path, &copies).await {
            self.release_links(&linked).await;
            return Err(Error::from_insert(e));
        }
        self.folders.invalidate([target.path.as_str()]);
        Ok(copies)
    }

    async fn release_links(&self, linked: &[BlobId]) {
        for blob_id in linked {
            if let Err(e) = self.blobs.unlink(*blob_id).await {
                warn!(%blob_id, error = %e, "failed to release blob link");
            }
        }
    }

    /// Delete the file row, drop its cache entries and its folder view,
    ///  then release the blob
    async fn unlink_file(&self, dir: &str, file: &File) -> Result<()> {
        self.store.delete_file(dir, &file.name).await?;
        let key = path::join(dir, &file.name);
        self.files.invalidate([key.as_str()]);
        self.contents.invalidate([key.as_str()]);
        self.folders.invalidate([dir]);

        match self.blobs.unlink(file.blob_id).await {
            Ok(0) => {
                self.blobs.delete(file.blob_id).await?;
                debug!(blob_id = %file.blob_id, "blob deleted");
            }
            Ok(_) => {}
            Err(StoreError::BlobNotFound(blob_id)) => {
                warn!(%blob_id, path = %key, "file referenced a missing blob");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /* Uploads */

    /// Insert a batch of already written blobs into its folder as a single
    ///  store operation, invalidating the folder once.
    ///
    /// On failure nothing is inserted and the caller is expected to
    ///  [`FilesBulk::revert`] the batch.
    pub async fn push_files_bulk(&self, bulk: &FilesBulk) -> Result<Vec<File>> {
        let folder = self
            .fetch_folder(&bulk.path)
            .await?
            .ok_or_else(|| Error::BadPath(format!("folder {} does not exist", bulk.path)))?;
        let mut taken: HashSet<String> = folder.files.iter().map(|f| f.name.clone()).collect();

        let files: Vec<File> = bulk
            .files
            .iter()
            .map(|(blob_id, name)| {
                let name = free_name(&taken, name.trim());
                taken.insert(name.clone());
                File {
                    name,
                    blob_id: *blob_id,
                    rights: None,
                }
            })
            .collect();

        self.store
            .push_files(&folder.path, &files)
            .await
            .map_err(Error::from_insert)?;
        self.folders.invalidate([folder.path.as_str()]);

        info!(path = %folder.path, count = files.len(), "files pushed");
        Ok(files)
    }

    /// Write several uploads into a folder the actor may write
    pub async fn upload_bulk(
        &self,
        dir: &str,
        uploads: Vec<(String, Bytes)>,
        actor: &User,
    ) -> Result<Vec<File>> {
        let folder = self
            .fetch_folder(dir)
            .await?
            .ok_or_else(|| Error::BadPath(format!("folder {} does not exist", path::format_dir(dir))))?;
        require(actor, folder.rights.as_ref(), Permission::Write, &folder.path)?;

        let mut bulk = FilesBulk::new(&folder.path);
        for (name, content) in uploads {
            let name = path::leaf(&name);
            if name.is_empty() {
                self.revert(&bulk).await;
                return Err(Error::BadPath("empty file name".to_string()));
            }
            match self.blobs.create(&name, content).await {
                Ok(blob_id) => bulk.add_file(blob_id, name),
                Err(e) => {
                    self.revert(&bulk).await;
                    return Err(e.into());
                }
            }
        }

        match self.push_files_bulk(&bulk).await {
            Ok(files) => Ok(files),
            Err(e) => {
                self.revert(&bulk).await;
                Err(e)
            }
        }
    }

    /// Write a single upload into a folder the actor may write
    pub async fn upload(
        &self,
        dir: &str,
        name: &str,
        content: Bytes,
        actor: &User,
    ) -> Result<File> {
        let mut files = self
            .upload_bulk(dir, vec![(name.to_string(), content)], actor)
            .await?;
        files
            .pop()
            .ok_or_else(|| Error::BadPath("empty upload".to_string()))
    }

    async fn revert(&self, bulk: &FilesBulk) {
        if bulk.is_empty() {
            return;
        }
        warn!(path = %bulk.path, count = bulk.len(), "reverting files bulk");
        if let Err(e) = bulk.revert(self.blobs.as_ref()).await {
            warn!(path = %bulk.path, error = %e, "files bulk revert incomplete");
        }
    }

    /* Rights */

    /// Change one entry of a resource's policy and push the change down to
    ///  everything beneath it. The actor needs `ChangeRights` on the
    ///  resource itself.
    pub async fn set_rights(
        &self,
        resource: &str,
        entity: &RightsEntity,
        level: Permission,
        actor: &User,
    ) -> Result<()> {
        let resource = path::format_dir(resource);

        if let Some(folder) = self.fetch_folder(&resource).await? {
            require(actor, folder.rights.as_ref(), Permission::ChangeRights, &resource)?;
            let result = self.propagate_rights(folder, entity, level).await;

            // Drop the whole subtree even when propagation stopped halfway
            self.folders.invalidate([resource.as_str()]);
            let prefix = path::descendants_prefix(&resource);
            self.folders.invalidate_prefix(&prefix);
            self.files.invalidate_prefix(&prefix);
            result?;

            info!(path = %resource, ?entity, %level, "folder rights set");
            return Ok(());
        }

        let (dir, name) = path::split_file(&resource);
        let file = self
            .fetch_file(&resource)
            .await?
            .ok_or_else(|| Error::NotFound(resource.clone()))?;
        require(actor, file.rights.as_ref(), Permission::ChangeRights, &resource)?;

        let rights = Rights::applied(file.rights.as_ref(), entity, level);
        self.store.set_file_rights(&dir, &name, Some(&rights)).await?;
        self.files.invalidate([resource.as_str()]);
        self.folders.invalidate([dir.as_str()]);

        info!(path = %resource, ?entity, %level, "file rights set");
        Ok(())
    }

    fn propagate_rights<'a>(
        &'a self,
        folder: Folder,
        entity: &'a RightsEntity,
        level: Permission,
    ) -> SubtreeWalk<'a> {
        Box::pin(async move {
            let rights = Rights::applied(folder.rights.as_ref(), entity, level);
            self.store
                .set_folder_rights(&folder.path, Some(&rights))
                .await?;

            for file in &folder.files {
                let rights = Rights::applied(file.rights.as_ref(), entity, level);
                self.store
                    .set_file_rights(&folder.path, &file.name, Some(&rights))
                    .await?;
            }

            for child in &folder.folders {
                if let Some(child) = self.fetch_folder(&child.path).await? {
                    self.propagate_rights(child, entity, level).await?;
                }
            }
            Ok(())
        })
    }
}

/// First name not in `taken`, inserting the copy marker before the
///  extension as many times as needed.
fn free_name(taken: &HashSet<String>, name: &str) -> String {
    let mut candidate = name.to_string();
    while taken.contains(&candidate) {
        candidate = match candidate.rfind('.') {
            Some(pos) if pos > 0 => format!(
                "{}{}{}",
                &candidate[..pos],
                COPY_MARKER,
                &candidate[pos..]
            ),
            _ => format!("{}{}", candidate, COPY_MARKER),
        };
    }
    candidate
}
