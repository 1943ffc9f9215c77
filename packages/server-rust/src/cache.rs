//! Key-value cache client with per-entry time-to-live.
//!
//! [`CacheClient`] is the seam handlers program against; [`MemoryCache`] is
//! the bounded in-process implementation. Values are JSON, so callers can
//! cache any serializable response.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common_core::{ClockSource, SystemClock};
use quick_cache::sync::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of cached entries.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Cache operations available to request handlers.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// The live value for `key`, if any.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    /// Stores `value` for `ttl` (default: the client's TTL).
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()>;

    /// Removes `key`, returning whether a live entry was removed.
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;

    /// True if a live entry exists for `key`.
    async fn exists(&self, key: &str) -> anyhow::Result<bool>;
}

impl dyn CacheClient {
    /// Reads and deserializes a cached value.
    ///
    /// An entry that no longer deserializes as `T` is treated as a miss.
    ///
    /// # Errors
    ///
    /// Propagates client failures.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let Some(value) = self.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(typed) => Ok(Some(typed)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Serializes and stores a value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not serialize or the client fails.
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> anyhow::Result<()> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl).await
    }
}

// ---------------------------------------------------------------------------
// CacheEpochs
// ---------------------------------------------------------------------------

const DEFAULT_EPOCH_STRIPES: usize = 64;

/// Invalidation counters guarding read-through fills.
///
/// A reader takes [`current`](Self::current) before loading from the store
/// and only fills the cache if the counter has not moved since. Writers
/// [`bump`](Self::bump) after the store write and before deleting the entry.
/// Keys hash onto a fixed set of stripes, so an unrelated write can at
/// worst cost a reader its fill.
pub struct CacheEpochs {
    stripes: Box<[AtomicU64]>,
}

impl CacheEpochs {
    /// Creates a guard with `stripes` counters (at least one).
    #[must_use]
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// The counter for `key`.
    #[must_use]
    pub fn current(&self, key: &str) -> u64 {
        self.stripe(key).load(Ordering::SeqCst)
    }

    /// Advances the counter for `key`.
    pub fn bump(&self, key: &str) {
        self.stripe(key).fetch_add(1, Ordering::SeqCst);
    }

    fn stripe(&self, key: &str) -> &AtomicU64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Truncation is fine: the value only picks a stripe.
        #[allow(clippy::cast_possible_truncation)]
        let index = hasher.finish() as usize % self.stripes.len();
        &self.stripes[index]
    }
}

impl Default for CacheEpochs {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH_STRIPES)
    }
}

// ---------------------------------------------------------------------------
// MemoryCache
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Entry {
    value: Value,
    /// Millis since epoch after which the entry reads as absent.
    expires_at: i64,
}

/// Bounded in-process cache. Expired entries are dropped lazily on access;
/// capacity pressure evicts through the underlying cache's policy.
pub struct MemoryCache {
    entries: Cache<String, Entry>,
    default_ttl: Duration,
    clock: Arc<dyn ClockSource>,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self::with_clock(capacity, default_ttl, Arc::new(SystemClock))
    }

    /// Creates a cache whose expiry follows `clock`.
    #[must_use]
    pub fn with_clock(capacity: usize, default_ttl: Duration, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            entries: Cache::new(capacity.max(1)),
            default_ttl,
            clock,
        }
    }

    /// Number of stored entries, including expired ones not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, key: &str) -> Option<Entry> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= self.clock.now_millis() {
            self.entries.remove(key);
            return None;
        }
        Some(entry)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.live(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> anyhow::Result<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = self.clock.now_millis().saturating_add(ttl_millis);
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let live = self.live(key).is_some();
        self.entries.remove(key);
        Ok(live)
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.live(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use common_core::ManualClock;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    fn cache_at(millis: i64) -> (MemoryCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(millis));
        let cache = MemoryCache::with_clock(16, DEFAULT_TTL, Arc::clone(&clock) as Arc<dyn ClockSource>);
        (cache, clock)
    }

    #[tokio::test]
    async fn set_get_delete_exists() {
        let (cache, _clock) = cache_at(0);
        cache.set("user:123", json!({"name": "John"}), None).await.unwrap();

        assert!(cache.exists("user:123").await.unwrap());
        assert_eq!(
            cache.get("user:123").await.unwrap(),
            Some(json!({"name": "John"}))
        );

        assert!(cache.delete("user:123").await.unwrap());
        assert!(!cache.delete("user:123").await.unwrap());
        assert_eq!(cache.get("user:123").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let (cache, clock) = cache_at(1_000);
        cache
            .set("k", json!(1), Some(Duration::from_secs(10)))
            .await
            .unwrap();

        clock.advance(9_999);
        assert!(cache.exists("k").await.unwrap());

        clock.advance(1);
        assert!(!cache.exists("k").await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn default_ttl_is_five_minutes() {
        let (cache, clock) = cache_at(0);
        cache.set("k", json!("v"), None).await.unwrap();

        clock.advance(299_999);
        assert!(cache.exists("k").await.unwrap());
        clock.advance(1);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[test]
    fn epochs_move_only_on_bump() {
        let epochs = CacheEpochs::default();
        let before = epochs.current("widgets:1");
        assert_eq!(epochs.current("widgets:1"), before);

        epochs.bump("widgets:1");
        assert_eq!(epochs.current("widgets:1"), before + 1);
    }

    #[test]
    fn single_stripe_epochs_are_shared_by_all_keys() {
        let epochs = CacheEpochs::new(0);
        epochs.bump("a");
        assert_eq!(epochs.current("b"), 1);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
    }

    #[tokio::test]
    async fn typed_helpers_round_trip_and_skip_mismatches() {
        let cache: Arc<dyn CacheClient> = Arc::new(MemoryCache::default());
        let user = User {
            name: "Ada".to_string(),
        };
        cache.set_json("user:1", &user, None).await.unwrap();
        assert_eq!(cache.get_json::<User>("user:1").await.unwrap(), Some(user));

        cache.set("user:2", json!(42), None).await.unwrap();
        assert_eq!(cache.get_json::<User>("user:2").await.unwrap(), None);
    }
}
