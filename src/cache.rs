//! TTL cache for read-heavy queries.
//!
//! Keys encode a resource name plus its parameters (for example
//! `tasks:list:pending`), so one cache holds many independently-expiring
//! variants of a query and a single prefix clear invalidates all of them
//! after a write.
//!
//! Expiry is enforced on two paths. The authoritative check is the expiry
//! recorded next to each value, consulted lazily on every read; when a tokio
//! runtime is present, `set` additionally arms a one-shot timer that evicts
//! the entry proactively. The timer only deletes if the recorded expiry
//! still matches the one it was armed with, so a later `set` on the same key
//! is never clobbered by a stale timer.
//!
//! Cache operations never fail the caller: a poisoned lock is absorbed and
//! the cache degrades to misses rather than surfacing an error.

use crate::clock::Clock;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Value and expiry bookkeeping, updated as one step under a single lock so
/// the two maps never disagree on which keys exist.
struct Inner<V> {
    values: HashMap<String, V>,
    expiries: HashMap<String, DateTime<Utc>>,
}

/// Key→value cache with per-entry time-to-live.
pub struct TtlCache<V> {
    inner: Arc<Mutex<Inner<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Create an empty cache judging freshness against the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                values: HashMap::new(),
                expiries: HashMap::new(),
            })),
            clock,
        }
    }

    /// Store a value. A positive `ttl_seconds` records an absolute expiry
    /// and arms a one-shot eviction timer; zero or negative means the entry
    /// never expires (it remains removable by delete/clear).
    pub fn set(&self, key: &str, value: V, ttl_seconds: i64) {
        let expires = if ttl_seconds > 0 {
            Some(self.clock.now() + Duration::seconds(ttl_seconds))
        } else {
            None
        };

        {
            let mut inner = self.lock();
            inner.values.insert(key.to_string(), value);
            match expires {
                Some(at) => {
                    inner.expiries.insert(key.to_string(), at);
                }
                // Overwriting a TTL'd entry with a non-expiring one must
                // drop the old expiry as well.
                None => {
                    inner.expiries.remove(key);
                }
            }
        }

        if let Some(at) = expires {
            log::debug!("cached {} for {}s", key, ttl_seconds);
            self.arm_timer(key.to_string(), at, ttl_seconds);
        }
    }

    /// Fetch a value if present and fresh. An entry whose expiry has passed
    /// is deleted here even if its eviction timer has not fired yet.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        if Self::expire_if_stale(&mut inner, key, self.clock.now()) {
            return None;
        }
        let hit = inner.values.get(key).cloned();
        if hit.is_some() {
            log::debug!("cache hit: {}", key);
        }
        hit
    }

    /// Freshness check without retrieving the value.
    pub fn has(&self, key: &str) -> bool {
        let mut inner = self.lock();
        if Self::expire_if_stale(&mut inner, key, self.clock.now()) {
            return false;
        }
        inner.values.contains_key(key)
    }

    /// Unconditional removal of the value and its expiry bookkeeping.
    pub fn delete(&self, key: &str) {
        let mut inner = self.lock();
        inner.values.remove(key);
        inner.expiries.remove(key);
    }

    /// Remove all entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.values.clear();
        inner.expiries.clear();
    }

    /// Remove every entry whose key starts with `prefix`. Write paths use
    /// this to invalidate all cached variants of a resource at once.
    pub fn clear_by_prefix(&self, prefix: &str) {
        let mut inner = self.lock();
        inner.values.retain(|key, _| !key.starts_with(prefix));
        inner.expiries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Number of stored entries, stale or not.
    pub fn len(&self) -> usize {
        self.lock().values.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove `key` if its recorded expiry has passed. Returns true when the
    /// entry was stale.
    fn expire_if_stale(inner: &mut Inner<V>, key: &str, now: DateTime<Utc>) -> bool {
        if let Some(expires) = inner.expiries.get(key) {
            if now > *expires {
                inner.values.remove(key);
                inner.expiries.remove(key);
                return true;
            }
        }
        false
    }

    /// Arm a one-shot eviction timer, if a tokio runtime is running. Without
    /// one (plain CLI calls, unit tests) the lazy check in `get`/`has` is
    /// the sole expiry path, which is sufficient for correctness.
    fn arm_timer(&self, key: String, armed_for: DateTime<Utc>, ttl_seconds: i64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        handle.spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(ttl_seconds as u64)).await;
            let mut inner = match inner.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // A later set() re-arms with a fresh expiry; this timer then no
            // longer owns the entry and must leave it alone.
            if inner.expiries.get(&key) == Some(&armed_for) {
                inner.values.remove(&key);
                inner.expiries.remove(&key);
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn manual_cache() -> (Arc<ManualClock>, TtlCache<i32>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = TtlCache::new(clock.clone() as Arc<dyn Clock>);
        (clock, cache)
    }

    #[test]
    fn test_set_get_roundtrip() {
        let (_clock, cache) = manual_cache();
        cache.set("tasks:list:all", 7, 300);
        assert_eq!(cache.get("tasks:list:all"), Some(7));
        assert!(cache.has("tasks:list:all"));
    }

    #[test]
    fn test_get_misses_after_ttl_elapses() {
        let (clock, cache) = manual_cache();
        cache.set("k", 1, 300);

        clock.advance(Duration::seconds(299));
        assert_eq!(cache.get("k"), Some(1));

        clock.advance(Duration::seconds(2));
        assert_eq!(cache.get("k"), None);
        // The lazy check removed the bookkeeping too
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_has_expires_lazily_like_get() {
        let (clock, cache) = manual_cache();
        cache.set("k", 1, 60);
        clock.advance(Duration::seconds(61));
        assert!(!cache.has("k"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let (clock, cache) = manual_cache();
        cache.set("k", 1, 0);
        clock.advance(Duration::days(365));
        assert_eq!(cache.get("k"), Some(1));
    }

    #[test]
    fn test_reset_to_zero_ttl_drops_old_expiry() {
        let (clock, cache) = manual_cache();
        cache.set("k", 1, 60);
        cache.set("k", 2, 0);
        clock.advance(Duration::seconds(120));
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_reset_refreshes_expiry() {
        let (clock, cache) = manual_cache();
        cache.set("k", 1, 60);
        clock.advance(Duration::seconds(30));
        cache.set("k", 2, 60);
        clock.advance(Duration::seconds(45));
        // 75s after the first set, 45s after the second: still fresh
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_delete_removes_value_and_expiry() {
        let (_clock, cache) = manual_cache();
        cache.set("k", 1, 300);
        cache.delete("k");
        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_clear_by_prefix_spares_other_prefixes() {
        let (_clock, cache) = manual_cache();
        cache.set("tasks:list:all", 1, 300);
        cache.set("tasks:list:pending", 2, 300);
        cache.set("stats:counts", 3, 300);

        cache.clear_by_prefix("tasks:");

        assert_eq!(cache.get("tasks:list:all"), None);
        assert_eq!(cache.get("tasks:list:pending"), None);
        assert_eq!(cache.get("stats:counts"), Some(3));
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_clock, cache) = manual_cache();
        cache.set("a", 1, 300);
        cache.set("b", 2, 0);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_evicts_proactively() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache: TtlCache<i32> = TtlCache::new(clock.clone() as Arc<dyn Clock>);
        cache.set("k", 1, 5);

        tokio::time::sleep(std::time::Duration::from_secs(6)).await;

        // Evicted by the timer without any get() touching the entry
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timer_never_clobbers_rearmed_entry() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache: TtlCache<i32> = TtlCache::new(clock.clone() as Arc<dyn Clock>);

        cache.set("k", 1, 5);
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;

        // Re-set with a later expiry before the first timer fires
        clock.advance(Duration::seconds(3));
        cache.set("k", 2, 5);

        // First timer fires now; its armed expiry no longer matches
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert_eq!(cache.get("k"), Some(2));

        // Second timer owns the entry and evicts on schedule
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert_eq!(cache.len(), 0);
    }
}
