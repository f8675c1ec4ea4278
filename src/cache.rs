//! Key/value cache service and typed memoization on top of it.
//!
//! Callers inject an `Arc<dyn CacheService>`; `MemoryCache` is the
//! in-process implementation used by the binary and the tests.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::sync::Cache;

use crate::error::{GitError, Result};

pub const DEFAULT_CAPACITY: u64 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache rejected key {0:?}")]
    Rejected(String),
}

impl From<CacheError> for GitError {
    fn from(err: CacheError) -> Self {
        GitError::Cache(err.to_string())
    }
}

/// String-valued cache with per-entry expiry.
pub trait CacheService: Send + Sync + fmt::Debug {
    /// A zero `ttl` keeps the entry until evicted.
    fn put(&self, key: &str, value: String, ttl: Duration) -> std::result::Result<(), CacheError>;

    fn get(&self, key: &str) -> Option<String>;

    fn is_exist(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn delete(&self, key: &str) -> std::result::Result<(), CacheError>;
}

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

struct EntryTtl;

impl Expiry<String, Entry> for EntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

pub struct MemoryCache {
    inner: Cache<String, Entry>,
}

impl MemoryCache {
    pub fn new(capacity: u64) -> Self {
        MemoryCache {
            inner: Cache::builder()
                .max_capacity(capacity)
                .expire_after(EntryTtl)
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl CacheService for MemoryCache {
    fn put(&self, key: &str, value: String, ttl: Duration) -> std::result::Result<(), CacheError> {
        if key.is_empty() {
            return Err(CacheError::Rejected(key.to_string()));
        }
        let ttl = (!ttl.is_zero()).then_some(ttl);
        self.inner.insert(key.to_string(), Entry { value, ttl });
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).map(|entry| entry.value)
    }

    fn is_exist(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    fn delete(&self, key: &str) -> std::result::Result<(), CacheError> {
        self.inner.invalidate(key);
        Ok(())
    }
}

/// Returns the cached value for `key`, computing and storing it on a miss.
/// Without a cache, or with a zero `ttl`, `compute` runs every time. A
/// failed write is logged and the computed value returned.
pub fn get_or_compute<T, F>(cache: Option<&dyn CacheService>, key: &str, ttl: Duration, compute: F) -> Result<T>
where
    T: FromStr + ToString,
    F: FnOnce() -> Result<T>,
{
    let Some(cache) = cache.filter(|_| !ttl.is_zero()) else {
        return compute();
    };

    if let Some(raw) = cache.get(key) {
        match raw.parse() {
            Ok(value) => return Ok(value),
            Err(_) => tracing::warn!("dropping unparsable cached value for {}", key),
        }
    }

    let value = compute()?;
    if let Err(e) = cache.put(key, value.to_string(), ttl) {
        tracing::warn!("unable to cache {}: {}", key, e);
    }
    Ok(value)
}

/// Drops `key`, ignoring failures.
pub fn remove(cache: Option<&dyn CacheService>, key: &str) {
    if let Some(cache) = cache {
        let _ = cache.delete(key);
    }
}
