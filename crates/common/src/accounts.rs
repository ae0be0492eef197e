use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{CacheConfig, InvalidatingCache};
use crate::crypto::PasswordHasher;
use crate::error::{Error, Result};
use crate::store::DynAccountStore;

/// The stored half of a session: the digest of the client's secret and the
///  unix timestamp (seconds) after which it is no longer valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub hash: String,
    pub expiration: i64,
}

impl Session {
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expiration > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    /// PHC-formatted password hash
    #[serde(skip_serializing, default)]
    pub password: String,
    #[serde(default)]
    pub groups: Vec<String>,
    /// Marks the super-administrator
    #[serde(default)]
    pub admin: bool,
    #[serde(skip_serializing, default)]
    pub session: Option<Session>,
}

impl User {
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password_hash.into(),
            groups: Vec::new(),
            admin: false,
            session: None,
        }
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub admins: Vec<String>,
}

impl Group {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            admins: Vec::new(),
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admins.iter().any(|a| a == email)
    }
}

/// User and group records, read through their caches.
///
/// Every mutation writes the store first and then invalidates the cached
///  records it touched.
#[derive(Debug, Clone)]
pub struct Accounts {
    store: DynAccountStore,
    hasher: Arc<dyn PasswordHasher>,
    users: InvalidatingCache<User>,
    groups: InvalidatingCache<Group>,
}

impl Accounts {
    pub fn new(
        store: DynAccountStore,
        hasher: Arc<dyn PasswordHasher>,
        cache: CacheConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            users: InvalidatingCache::new(cache),
            groups: InvalidatingCache::new(cache),
        }
    }

    pub fn store(&self) -> &DynAccountStore {
        &self.store
    }

    pub fn hasher(&self) -> &Arc<dyn PasswordHasher> {
        &self.hasher
    }

    pub async fn fetch_user(&self, email: &str) -> Result<Option<User>> {
        if let Some(user) = self.users.get(email) {
            return Ok(Some(user));
        }
        let ticket = self.users.ticket();
        let Some(user) = self.store.user(email).await? else {
            return Ok(None);
        };
        if self.users.fill(ticket, email, user.clone()) {
            debug!(email, "user cache fill");
        }
        Ok(Some(user))
    }

    pub async fn fetch_group(&self, id: &str) -> Result<Option<Group>> {
        if let Some(group) = self.groups.get(id) {
            return Ok(Some(group));
        }
        let ticket = self.groups.ticket();
        let Some(group) = self.store.group(id).await? else {
            return Ok(None);
        };
        if self.groups.fill(ticket, id, group.clone()) {
            debug!(id, "group cache fill");
        }
        Ok(Some(group))
    }

    /// Drop a cached user record, e.g. after its session changed
    pub fn invalidate_user(&self, email: &str) {
        self.users.invalidate([email]);
    }

    pub async fn new_user(&self, actor: &User, email: &str, password: &str) -> Result<User> {
        require_super_admin(actor)?;
        let email = email.trim();
        if self.fetch_user(email).await?.is_some() {
            return Err(Error::AlreadyExists(format!("user {}", email)));
        }

        let user = User::new(email, self.hasher.hash(password)?);
        self.store
            .insert_user(&user)
            .await
            .map_err(Error::from_insert)?;
        self.users.invalidate([email]);

        info!(email, "user created");
        Ok(user)
    }

    pub async fn remove_user(&self, actor: &User, email: &str) -> Result<()> {
        require_super_admin(actor)?;
        let email = email.trim();
        if self.fetch_user(email).await?.is_none() {
            return Err(Error::NotFound(format!("user {}", email)));
        }

        self.store.delete_user(email).await?;
        self.users.invalidate([email]);
        // Admin lists of every group may have named this user
        self.groups.clear();

        info!(email, "user removed");
        Ok(())
    }

    pub async fn new_group(&self, actor: &User, id: &str) -> Result<Group> {
        require_super_admin(actor)?;
        let id = id.trim();
        if self.fetch_group(id).await?.is_some() {
            return Err(Error::AlreadyExists(format!("group {}", id)));
        }

        let group = Group::new(id);
        self.store
            .insert_group(&group)
            .await
            .map_err(Error::from_insert)?;
        self.groups.invalidate([id]);

        info!(id, "group created");
        Ok(group)
    }

    /// Remove a group and pull it from every member
    pub async fn remove_group(&self, actor: &User, id: &str) -> Result<()> {
        require_super_admin(actor)?;
        let id = id.trim();
        if self.fetch_group(id).await?.is_none() {
            return Err(Error::NotFound(format!("group {}", id)));
        }

        let members = self.store.users_in_group(id).await?;
        for email in &members {
            self.store.remove_user_from_group(email, id).await?;
        }
        self.users.invalidate(&members);

        self.store.delete_group(id).await?;
        self.groups.invalidate([id]);

        info!(id, members = members.len(), "group removed");
        Ok(())
    }

    pub async fn add_user_to_group(&self, actor: &User, email: &str, group: &str) -> Result<()> {
        let (email, group) = (email.trim(), group.trim());
        let group = self.managed_group(actor, group).await?;
        self.existing_user(email).await?;

        self.store.add_user_to_group(email, &group.id).await?;
        self.users.invalidate([email]);

        info!(email, group = %group.id, "user added to group");
        Ok(())
    }

    pub async fn remove_user_from_group(
        &self,
        actor: &User,
        email: &str,
        group: &str,
    ) -> Result<()> {
        let (email, group) = (email.trim(), group.trim());
        let group = self.managed_group(actor, group).await?;
        self.existing_user(email).await?;

        self.store.remove_user_from_group(email, &group.id).await?;
        self.users.invalidate([email]);

        info!(email, group = %group.id, "user removed from group");
        Ok(())
    }

    pub async fn set_group_admin(&self, actor: &User, group: &str, email: &str) -> Result<()> {
        let (email, group) = (email.trim(), group.trim());
        let group = self.managed_group(actor, group).await?;
        self.existing_user(email).await?;

        self.store.add_group_admin(&group.id, email).await?;
        self.groups.invalidate([group.id.as_str()]);

        info!(email, group = %group.id, "group admin granted");
        Ok(())
    }

    /// Create the super-administrator when the store has none.
    ///
    /// # Returns
    /// * `Ok(true)` - An administrator was created
    /// * `Ok(false)` - One already existed, nothing changed
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool> {
        if self.store.has_admin().await? {
            return Ok(false);
        }

        let mut admin = User::new(email.trim(), self.hasher.hash(password)?);
        admin.admin = true;
        self.store
            .insert_user(&admin)
            .await
            .map_err(Error::from_insert)?;
        self.users.invalidate([admin.email.as_str()]);

        info!(email = %admin.email, "bootstrapped administrator");
        Ok(true)
    }

    async fn existing_user(&self, email: &str) -> Result<User> {
        self.fetch_user(email)
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {}", email)))
    }

    /// Fetch a group the actor is allowed to manage
    async fn managed_group(&self, actor: &User, id: &str) -> Result<Group> {
        let group = self
            .fetch_group(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("group {}", id)))?;
        if !actor.admin && !group.is_admin(&actor.email) {
            return Err(Error::AccessDenied(format!("group {}", id)));
        }
        Ok(group)
    }
}

fn require_super_admin(actor: &User) -> Result<()> {
    if actor.admin {
        Ok(())
    } else {
        Err(Error::AccessDenied(
            "administrator privileges required".to_string(),
        ))
    }
}
