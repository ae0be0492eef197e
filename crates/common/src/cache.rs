//! Invalidating cache for folders, files, accounts and sessions
//!
//! A string-keyed map behind a `parking_lot::RwLock`. Reads take the shared
//! lock; `set`, `invalidate` and `invalidate_prefix` take the exclusive lock
//! for their whole duration, so a concurrent `set` can never re-insert an
//! entry in the middle of a prefix scan.
//!
//! Presence in the cache is an optimization only. Every value must be
//! recoverable from the store, and every component that mutates the store
//! invalidates the keys it made stale before reporting success.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Configuration for a cache instance
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheConfig {
    /// Time-to-live for entries. `None` keeps entries until they are
    /// explicitly invalidated.
    pub ttl: Option<Duration>,
    /// Upper bound on the summed weight of weighted entries. Least recently
    ///  used entries are evicted once it is exceeded.
    pub max_weight: Option<usize>,
}

impl CacheConfig {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Self::default()
        }
    }

    pub fn with_max_weight(mut self, max_weight: usize) -> Self {
        self.max_weight = Some(max_weight);
        self
    }
}

/// Taken before reading the store for a cache fill. A fill carrying a
///  ticket older than the latest invalidation is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
    weight: usize,
    last_used: AtomicU64,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Bumped by every invalidation
    generation: u64,
    weight: usize,
}

impl<V> Inner<V> {
    fn remove_where(&mut self, mut doomed: impl FnMut(&str, &Entry<V>) -> bool) {
        let mut freed = 0;
        self.entries.retain(|key, entry| {
            let gone = doomed(key.as_str(), &*entry);
            if gone {
                freed += entry.weight;
            }
            !gone
        });
        self.weight -= freed;
    }

    /// Evict least recently used entries until the total fits `max`
    fn constrain(&mut self, max: usize) {
        if self.weight <= max {
            return;
        }
        let mut by_use: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.weight > 0)
            .map(|(k, e)| (e.last_used.load(Ordering::Relaxed), k.clone()))
            .collect();
        by_use.sort_unstable();
        for (_, key) in by_use {
            if self.weight <= max {
                break;
            }
            if let Some(entry) = self.entries.remove(&key) {
                self.weight -= entry.weight;
            }
        }
    }
}

/// Concurrent mapping from string keys to cloneable values.
///
/// Cloning the cache yields another handle onto the same map.
pub struct InvalidatingCache<V> {
    inner: Arc<RwLock<Inner<V>>>,
    clock: Arc<AtomicU64>,
    ttl: Option<Duration>,
    max_weight: Option<usize>,
}

impl<V> Clone for InvalidatingCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            clock: self.clock.clone(),
            ttl: self.ttl,
            max_weight: self.max_weight,
        }
    }
}

impl<V> fmt::Debug for InvalidatingCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("InvalidatingCache")
            .field("entries", &inner.entries.len())
            .field("weight", &inner.weight)
            .field("ttl", &self.ttl)
            .field("max_weight", &self.max_weight)
            .finish()
    }
}

impl<V: Clone> Default for InvalidatingCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl<V: Clone> InvalidatingCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                entries: HashMap::new(),
                generation: 0,
                weight: 0,
            })),
            clock: Arc::new(AtomicU64::new(0)),
            ttl: config.ttl,
            max_weight: config.max_weight,
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get a clone of the cached value, if present and not expired
    pub fn get(&self, key: &str) -> Option<V> {
        let inner = self.inner.read();
        let entry = inner
            .entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))?;
        entry.last_used.store(self.tick(), Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Ticket for a fill that is about to read the store
    pub fn ticket(&self) -> FillTicket {
        FillTicket(self.inner.read().generation)
    }

    /// Insert or overwrite an entry
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.insert(key.into(), value, 0, None);
    }

    /// Insert a value read from the store, unless an invalidation happened
    ///  since `ticket` was taken. Returns whether the value was kept.
    pub fn fill(&self, ticket: FillTicket, key: impl Into<String>, value: V) -> bool {
        self.insert(key.into(), value, 0, Some(ticket))
    }

    /// Like [`fill`](Self::fill), counting `weight` against the budget
    pub fn fill_weighted(
        &self,
        ticket: FillTicket,
        key: impl Into<String>,
        value: V,
        weight: usize,
    ) -> bool {
        self.insert(key.into(), value, weight, Some(ticket))
    }

    fn insert(&self, key: String, value: V, weight: usize, ticket: Option<FillTicket>) -> bool {
        if self.max_weight.is_some_and(|max| weight > max) {
            return false;
        }
        let now = Instant::now();
        let entry = Entry {
            value,
            expires_at: self.ttl.map(|ttl| now + ttl),
            weight,
            last_used: AtomicU64::new(self.tick()),
        };

        let mut inner = self.inner.write();
        if ticket.is_some_and(|t| t.0 != inner.generation) {
            return false;
        }
        if self.ttl.is_some() {
            inner.remove_where(|_, e| !e.is_live(now));
        }
        if let Some(old) = inner.entries.insert(key, entry) {
            inner.weight -= old.weight;
        }
        inner.weight += weight;
        if let Some(max) = self.max_weight {
            inner.constrain(max);
        }
        true
    }

    /// Remove zero or more keys. Missing keys are ignored.
    pub fn invalidate<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut inner = self.inner.write();
        inner.generation += 1;
        for key in keys {
            if let Some(entry) = inner.entries.remove(key.as_ref()) {
                inner.weight -= entry.weight;
            }
        }
    }

    /// Remove every key that starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.remove_where(|key, _| key.starts_with(prefix));
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        inner.entries.clear();
        inner.weight = 0;
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
