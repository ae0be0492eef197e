//! Session tokens
//!
//! A client logs in once and then presents its raw token with every request.
//! Tokens are resolved through a cache keyed by the raw token; a miss falls
//! back to the store by digest. Expiration slides forward on every
//! successful resolution, but the stored copy is only rewritten once it is
//! within a quarter of the session duration of running out.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::accounts::{Accounts, Session, User};
use crate::cache::{CacheConfig, InvalidatingCache};
use crate::crypto::SessionSecret;
use crate::error::{Error, Result};

/// Default validity of a session
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub duration: Duration,
    pub cache: CacheConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SESSION_DURATION,
            cache: CacheConfig::default(),
        }
    }
}

/// A resolved token as the sessions cache holds it
#[derive(Debug, Clone)]
struct SessionEntry {
    email: String,
    /// Digest and sliding expiration
    session: Session,
    /// Expiration last written to the store, unix seconds
    persisted: i64,
}

#[derive(Debug, Clone)]
pub struct SessionDirectory {
    accounts: Accounts,
    sessions: InvalidatingCache<SessionEntry>,
    duration: i64,
}

impl SessionDirectory {
    pub fn new(accounts: Accounts, config: SessionConfig) -> Self {
        Self {
            accounts,
            sessions: InvalidatingCache::new(config.cache),
            duration: config.duration.as_secs() as i64,
        }
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration as u64)
    }

    /// Verify credentials and mint a new session.
    ///
    /// # Returns
    /// * `Ok(token)` - The raw token to hand to the client
    /// * `Err(Error::InvalidCredentials)` - Unknown user or wrong password
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        let email = email.trim();
        let Some(user) = self.accounts.fetch_user(email).await? else {
            return Err(Error::InvalidCredentials);
        };
        if !self.accounts.hasher().verify(&user.password, password) {
            return Err(Error::InvalidCredentials);
        }

        let secret = SessionSecret::generate()?;
        let token = secret.to_hex();
        let session = Session {
            hash: secret.digest(),
            expiration: Utc::now().timestamp() + self.duration,
        };

        self.accounts
            .store()
            .set_session(email, Some(&session))
            .await?;
        self.accounts.invalidate_user(email);
        self.sessions.set(
            token.clone(),
            SessionEntry {
                email: email.to_string(),
                persisted: session.expiration,
                session,
            },
        );

        info!(email, "user logged in");
        Ok(token)
    }

    /// Resolve a raw token to the user it belongs to, sliding its expiration.
    ///
    /// Any token that does not resolve to a live session yields
    ///  `Err(Error::SessionExpired)`.
    pub async fn resolve(&self, token: &str) -> Result<User> {
        let ticket = self.sessions.ticket();
        let mut entry = match self.sessions.get(token) {
            Some(entry) => entry,
            None => self.load(token).await?,
        };

        let now = Utc::now().timestamp();
        if !entry.session.is_valid_at(now) {
            self.sessions.invalidate([token]);
            return Err(Error::SessionExpired);
        }

        // The user may have logged in again or been removed since
        let user = match self.accounts.fetch_user(&entry.email).await? {
            Some(user)
                if user
                    .session
                    .as_ref()
                    .is_some_and(|s| s.hash == entry.session.hash) =>
            {
                user
            }
            _ => {
                self.sessions.invalidate([token]);
                return Err(Error::SessionExpired);
            }
        };

        entry.session.expiration = now + self.duration;
        if entry.persisted - now < self.duration / 4 {
            self.accounts
                .store()
                .set_session(&entry.email, Some(&entry.session))
                .await?;
            self.accounts.invalidate_user(&entry.email);
            entry.persisted = entry.session.expiration;
            debug!(email = %entry.email, "session expiration persisted");
        }

        // A logout racing this call wins
        self.sessions.fill(ticket, token, entry);
        Ok(user)
    }

    /// End the actor's session. The token must be the actor's current one.
    pub async fn logout(&self, token: &str, actor: &User) -> Result<()> {
        let secret = SessionSecret::from_hex(token).map_err(|_| Error::SessionExpired)?;
        let current = actor.session.as_ref().map(|s| s.hash.as_str());
        if current != Some(secret.digest().as_str()) {
            return Err(Error::SessionExpired);
        }

        self.sessions.invalidate([token]);
        self.accounts
            .store()
            .set_session(&actor.email, None)
            .await?;
        self.accounts.invalidate_user(&actor.email);

        info!(email = %actor.email, "user logged out");
        Ok(())
    }

    async fn load(&self, token: &str) -> Result<SessionEntry> {
        let secret = SessionSecret::from_hex(token).map_err(|_| Error::SessionExpired)?;
        let hash = secret.digest();
        let user = self
            .accounts
            .store()
            .user_by_session(&hash)
            .await?
            .ok_or(Error::SessionExpired)?;
        let session = user.session.ok_or(Error::SessionExpired)?;

        debug!(email = %user.email, "session loaded from store");
        Ok(SessionEntry {
            email: user.email,
            persisted: session.expiration,
            session,
        })
    }
}
