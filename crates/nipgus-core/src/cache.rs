// ── Time-to-live cache ──
//
// Entries older than the TTL read as absent and are evicted on access.

use std::hash::Hash;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug)]
pub struct TtlCache<K: Eq + Hash, V> {
    ttl: Duration,
    entries: DashMap<K, (Instant, V)>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let fresh = {
            let entry = self.entries.get(key)?;
            let (stored, value) = entry.value();
            (now.saturating_duration_since(*stored) < self.ttl).then(|| value.clone())
        };
        if fresh.is_none() {
            self.entries.remove(key);
        }
        fresh
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&self, key: K, value: V, now: Instant) {
        self.entries.insert(key, (now, value));
    }

    pub fn remove(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, fresh or not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entries_are_returned() {
        let cache = TtlCache::new(Duration::from_secs(120));
        let now = Instant::now();
        cache.insert_at("5260001246".to_owned(), 1, now);

        assert_eq!(
            cache.get_at(&"5260001246".to_owned(), now + Duration::from_secs(119)),
            Some(1)
        );
    }

    #[test]
    fn stale_entries_are_absent_and_evicted() {
        let cache = TtlCache::new(Duration::from_secs(120));
        let now = Instant::now();
        cache.insert_at("k", "v", now);

        assert_eq!(cache.get_at(&"k", now + Duration::from_secs(120)), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let cache = TtlCache::new(Duration::from_secs(1));
        cache.insert(1, 'a');
        cache.insert(2, 'b');
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert_eq!(cache.get(&1), None);
    }
}
