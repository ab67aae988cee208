use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use lingo_core::model::{EngineSettings, ProgressMetrics, UserId};
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    metrics: Arc<ProgressMetrics>,
    computed_at: DateTime<Utc>,
}

/// Bounded, time-expiring map from user to their last computed metrics.
///
/// Reads younger than the freshness window hit. Every write purges entries
/// older than twice the window and, if the map is still over capacity,
/// evicts the oldest fraction of what remains.
#[derive(Debug)]
pub struct ProgressCache {
    freshness: Duration,
    max_entries: usize,
    evict_fraction: f64,
    entries: Mutex<HashMap<UserId, CacheEntry>>,
}

impl ProgressCache {
    #[must_use]
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            freshness: settings.cache_freshness(),
            max_entries: settings.cache_max_entries(),
            evict_fraction: settings.cache_evict_fraction(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<UserId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached metrics for `user` if they were computed less than the
    /// freshness window before `now`.
    #[must_use]
    pub fn get(&self, user: &UserId, now: DateTime<Utc>) -> Option<Arc<ProgressMetrics>> {
        let entries = self.entries();
        let entry = entries.get(user)?;
        if now - entry.computed_at < self.freshness {
            debug!(user = %user, "progress cache hit");
            Some(Arc::clone(&entry.metrics))
        } else {
            debug!(user = %user, "progress cache entry expired");
            None
        }
    }

    /// Stores `metrics` for `user`, replacing any previous entry, then prunes.
    pub fn insert(&self, user: UserId, metrics: Arc<ProgressMetrics>, now: DateTime<Utc>) {
        let mut entries = self.entries();
        entries.insert(
            user,
            CacheEntry {
                metrics,
                computed_at: now,
            },
        );

        let stale_after = self.freshness * 2;
        let before = entries.len();
        entries.retain(|_, entry| now - entry.computed_at <= stale_after);
        let purged = before - entries.len();

        let mut evicted = 0;
        if entries.len() > self.max_entries {
            evicted = self.eviction_count(entries.len());
            let mut by_age: Vec<(DateTime<Utc>, UserId)> = entries
                .iter()
                .map(|(user, entry)| (entry.computed_at, user.clone()))
                .collect();
            by_age.sort();
            for (_, user) in by_age.into_iter().take(evicted) {
                entries.remove(&user);
            }
        }

        if purged > 0 || evicted > 0 {
            debug!(purged, evicted, remaining = entries.len(), "progress cache pruned");
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    fn eviction_count(&self, len: usize) -> usize {
        let count = (len as f64 * self.evict_fraction).ceil() as usize;
        count.clamp(1, len)
    }

    /// Drops the entry for `user`; returns whether one existed.
    pub fn invalidate(&self, user: &UserId) -> bool {
        let removed = self.entries().remove(user).is_some();
        if removed {
            debug!(user = %user, "progress cache invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingo_core::time::fixed_now;

    fn user(n: usize) -> UserId {
        UserId::new(format!("user-{n}")).unwrap()
    }

    fn metrics(total_sessions: u32) -> Arc<ProgressMetrics> {
        Arc::new(ProgressMetrics {
            total_sessions,
            ..ProgressMetrics::empty()
        })
    }

    fn small_cache(max_entries: usize) -> ProgressCache {
        let settings = EngineSettings::new(Duration::minutes(5), max_entries, 0.2, 1).unwrap();
        ProgressCache::new(&settings)
    }

    #[test]
    fn hit_within_window_miss_after() {
        let cache = small_cache(10);
        let now = fixed_now();
        let stored = metrics(3);
        cache.insert(user(1), Arc::clone(&stored), now);

        let hit = cache.get(&user(1), now + Duration::minutes(4)).unwrap();
        assert!(Arc::ptr_eq(&hit, &stored));
        assert!(cache.get(&user(1), now + Duration::minutes(5)).is_none());
        assert!(cache.get(&user(2), now).is_none());
    }

    #[test]
    fn writes_purge_entries_older_than_twice_the_window() {
        let cache = small_cache(10);
        let now = fixed_now();
        cache.insert(user(1), metrics(1), now);
        cache.insert(user(2), metrics(2), now + Duration::minutes(8));
        assert_eq!(cache.len(), 2);

        cache.insert(user(3), metrics(3), now + Duration::minutes(11));
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&user(2), now + Duration::minutes(11)).is_some());
    }

    #[test]
    fn over_capacity_evicts_oldest_fifth() {
        let cache = small_cache(5);
        let now = fixed_now();
        for n in 0..6 {
            let at = now + Duration::seconds(i64::try_from(n).unwrap());
            cache.insert(user(n), metrics(1), at);
        }
        // six entries exceed the cap; ceil(6 * 0.2) = 2 oldest go
        assert_eq!(cache.len(), 4);
        let later = now + Duration::seconds(10);
        assert!(cache.get(&user(0), later).is_none());
        assert!(cache.get(&user(1), later).is_none());
        assert!(cache.get(&user(2), later).is_some());
        assert!(cache.get(&user(5), later).is_some());
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = small_cache(10);
        cache.insert(user(1), metrics(1), fixed_now());
        cache.insert(user(2), metrics(1), fixed_now());

        assert!(cache.invalidate(&user(1)));
        assert!(!cache.invalidate(&user(1)));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
